//! Peripheral event surface and listener registry
//!
//! The [`EventBus`] keeps an ordered list of listeners per [`EventKind`].
//! Persistent listeners stay registered until removed with [`EventBus::off`];
//! one-shot listeners are removed as soon as an event is dispatched to them.
//! Every emitted event is also forwarded to a tokio broadcast channel for
//! async subscribers.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::AdapterError;
use crate::protocol::PowerState;

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// Name of a published event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    StateChange,
    Accept,
    MtuChange,
    Disconnect,
    AdvertisingStart,
    AdvertisingStartError,
    AdvertisingStop,
    ServicesSet,
    ServicesSetError,
    RssiUpdate,
    AdvertisingChannelTxPowerUpdate,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::StateChange => "stateChange",
            EventKind::Accept => "accept",
            EventKind::MtuChange => "mtuChange",
            EventKind::Disconnect => "disconnect",
            EventKind::AdvertisingStart => "advertisingStart",
            EventKind::AdvertisingStartError => "advertisingStartError",
            EventKind::AdvertisingStop => "advertisingStop",
            EventKind::ServicesSet => "servicesSet",
            EventKind::ServicesSetError => "servicesSetError",
            EventKind::RssiUpdate => "rssiUpdate",
            EventKind::AdvertisingChannelTxPowerUpdate => "advertisingChannelTxPowerUpdate",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event republished by the controller to its subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum PeripheralEvent {
    StateChange(PowerState),
    Accept { client_address: String },
    MtuChange(u16),
    Disconnect { client_address: String },
    /// `Some` carries the adapter's error verbatim
    AdvertisingStart(Option<AdapterError>),
    AdvertisingStartError(AdapterError),
    AdvertisingStop,
    ServicesSet(Option<AdapterError>),
    ServicesSetError(AdapterError),
    RssiUpdate(i8),
    AdvertisingChannelTxPowerUpdate(i8),
}

impl PeripheralEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PeripheralEvent::StateChange(_) => EventKind::StateChange,
            PeripheralEvent::Accept { .. } => EventKind::Accept,
            PeripheralEvent::MtuChange(_) => EventKind::MtuChange,
            PeripheralEvent::Disconnect { .. } => EventKind::Disconnect,
            PeripheralEvent::AdvertisingStart(_) => EventKind::AdvertisingStart,
            PeripheralEvent::AdvertisingStartError(_) => EventKind::AdvertisingStartError,
            PeripheralEvent::AdvertisingStop => EventKind::AdvertisingStop,
            PeripheralEvent::ServicesSet(_) => EventKind::ServicesSet,
            PeripheralEvent::ServicesSetError(_) => EventKind::ServicesSetError,
            PeripheralEvent::RssiUpdate(_) => EventKind::RssiUpdate,
            PeripheralEvent::AdvertisingChannelTxPowerUpdate(_) => {
                EventKind::AdvertisingChannelTxPowerUpdate
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Listener Registry
// ----------------------------------------------------------------------------

/// Handle returned on registration, used to remove a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type PersistentListener = Arc<dyn Fn(&PeripheralEvent) + Send + Sync>;
type OneShotListener = Box<dyn FnOnce(&PeripheralEvent) + Send>;

enum Listener {
    Persistent(PersistentListener),
    OneShot(OneShotListener),
}

struct Entry {
    id: ListenerId,
    listener: Listener,
}

/// Multi-listener publish/subscribe registry
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<Entry>>>,
    next_id: AtomicU64,
    broadcast: broadcast::Sender<PeripheralEvent>,
}

impl EventBus {
    /// Create a bus whose async subscribers buffer up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (broadcast, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            broadcast,
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<Entry>>> {
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry()
            .entry(kind)
            .or_default()
            .push(Entry { id, listener });
        id
    }

    /// Register a listener invoked for every `kind` event
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&PeripheralEvent) + Send + Sync + 'static,
    {
        self.register(kind, Listener::Persistent(Arc::new(listener)))
    }

    /// Register a listener invoked for the next `kind` event only
    pub fn once<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnOnce(&PeripheralEvent) + Send + 'static,
    {
        self.register(kind, Listener::OneShot(Box::new(listener)))
    }

    /// Remove a listener; returns false if it already fired or was removed
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registry = self.registry();
        for entries in registry.values_mut() {
            if let Some(index) = entries.iter().position(|entry| entry.id == id) {
                entries.remove(index);
                return true;
            }
        }
        false
    }

    /// Number of listeners currently registered for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry().get(&kind).map_or(0, Vec::len)
    }

    /// Receiver of every event emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PeripheralEvent> {
        self.broadcast.subscribe()
    }

    /// Dispatch `event` to its listeners in registration order.
    ///
    /// One-shot entries are unregistered before any listener runs, and the
    /// registry lock is released during invocation, so listeners may register
    /// or remove listeners themselves. Returns the number of listeners invoked.
    pub fn emit(&self, event: PeripheralEvent) -> usize {
        let kind = event.kind();
        let dispatch: Vec<Listener> = {
            let mut registry = self.registry();
            match registry.get_mut(&kind) {
                Some(entries) => {
                    let mut dispatch = Vec::with_capacity(entries.len());
                    let mut kept = Vec::with_capacity(entries.len());
                    for entry in entries.drain(..) {
                        match entry.listener {
                            Listener::Persistent(listener) => {
                                dispatch.push(Listener::Persistent(Arc::clone(&listener)));
                                kept.push(Entry {
                                    id: entry.id,
                                    listener: Listener::Persistent(listener),
                                });
                            }
                            Listener::OneShot(listener) => {
                                dispatch.push(Listener::OneShot(listener))
                            }
                        }
                    }
                    *entries = kept;
                    dispatch
                }
                None => Vec::new(),
            }
        };

        trace!("Dispatching {} to {} listeners", kind, dispatch.len());
        let invoked = dispatch.len();
        for listener in dispatch {
            match listener {
                Listener::Persistent(listener) => listener(&event),
                Listener::OneShot(listener) => listener(&event),
            }
        }

        // No receivers is not an error: nobody asked for the async stream.
        let _ = self.broadcast.send(event);
        invoked
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry();
        let counts: HashMap<EventKind, usize> =
            registry.iter().map(|(kind, entries)| (*kind, entries.len())).collect();
        f.debug_struct("EventBus")
            .field("listeners", &counts)
            .field("subscribers", &self.broadcast.receiver_count())
            .finish()
    }
}
