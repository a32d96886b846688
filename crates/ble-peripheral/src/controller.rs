//! Peripheral control state machine
//!
//! [`PeripheralController`] owns the adapter's last reported power state,
//! identity and connection parameters. It checks power-state preconditions,
//! arms a one-shot completion listener, forwards the command to the adapter,
//! and republishes adapter events to its own subscribers.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::adapter::{AdapterBindings, AdapterEvent, AdapterEventReceiver};
use crate::completion::{self, Completion};
use crate::config::PeripheralConfig;
use crate::error::{AdapterResult, PeripheralError, Result};
use crate::events::{EventBus, EventKind, ListenerId, PeripheralEvent};
use crate::gatt::GattService;
use crate::payload::{encode_ibeacon, normalize_service_uuids};
use crate::protocol::{AdvertisingParams, ConnectionContext, PeripheralIdentity, PowerState};

// ----------------------------------------------------------------------------
// State
// ----------------------------------------------------------------------------

/// Copy of everything the controller knows about the adapter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PeripheralSnapshot {
    pub power_state: PowerState,
    pub identity: PeripheralIdentity,
    pub connection: ConnectionContext,
}

/// What to advertise
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertisingRequest {
    pub local_name: String,
    pub service_uuids: Vec<String>,
    /// Raw advertising data; when set it replaces name and service UUIDs
    pub eir_data: Option<Vec<u8>>,
    pub scan_response_data: Option<Vec<u8>>,
}

impl AdvertisingRequest {
    pub fn new(local_name: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            ..Self::default()
        }
    }

    pub fn with_service_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.service_uuids.push(uuid.into());
        self
    }

    pub fn with_eir_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.eir_data = Some(data.into());
        self
    }

    pub fn with_scan_response_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.scan_response_data = Some(data.into());
        self
    }
}

// ----------------------------------------------------------------------------
// Peripheral Controller
// ----------------------------------------------------------------------------

/// Control facade for the peripheral role of one adapter
pub struct PeripheralController<B: AdapterBindings> {
    config: PeripheralConfig,
    bindings: Mutex<B>,
    state: Mutex<PeripheralSnapshot>,
    events: Arc<EventBus>,
}

impl<B: AdapterBindings> PeripheralController<B> {
    /// Create a controller with its own event bus
    pub fn new(bindings: B, config: PeripheralConfig) -> Self {
        let events = Arc::new(EventBus::new(config.event_buffer_size));
        Self::with_event_bus(bindings, config, events)
    }

    /// Create a controller publishing on an existing event bus
    pub fn with_event_bus(bindings: B, config: PeripheralConfig, events: Arc<EventBus>) -> Self {
        let state = PeripheralSnapshot {
            connection: ConnectionContext {
                mtu: config.initial_mtu,
                ..ConnectionContext::default()
            },
            ..PeripheralSnapshot::default()
        };
        Self {
            config,
            bindings: Mutex::new(bindings),
            state: Mutex::new(state),
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, PeripheralSnapshot> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn bindings(&self) -> MutexGuard<'_, B> {
        self.bindings.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ------------------------------------------------------------------------
    // Observable state
    // ------------------------------------------------------------------------

    pub fn power_state(&self) -> PowerState {
        self.state().power_state
    }

    pub fn address(&self) -> String {
        self.state().identity.address.clone()
    }

    pub fn platform(&self) -> String {
        self.state().identity.platform.clone()
    }

    pub fn mtu(&self) -> u16 {
        self.state().connection.mtu
    }

    pub fn rssi(&self) -> i8 {
        self.state().connection.rssi
    }

    pub fn snapshot(&self) -> PeripheralSnapshot {
        self.state().clone()
    }

    pub fn config(&self) -> &PeripheralConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&PeripheralEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, listener)
    }

    pub fn once<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnOnce(&PeripheralEvent) + Send + 'static,
    {
        self.events.once(kind, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PeripheralEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------------
    // Command plumbing
    // ------------------------------------------------------------------------

    fn require_powered_on(&self, operation: &'static str) -> Result<()> {
        let state = self.power_state();
        if state.is_powered_on() {
            Ok(())
        } else {
            warn!("Refusing to {} while adapter is {}", operation, state);
            Err(PeripheralError::InvalidState { operation, state })
        }
    }

    /// Arm a one-shot listener for `kind`, then forward `command`.
    ///
    /// The listener is registered before the adapter sees the command so an
    /// immediate answer cannot be missed. If the adapter refuses the command
    /// synchronously the listener is removed again and nothing is pending.
    fn issue<T, E, C>(&self, kind: EventKind, extract: E, command: C) -> Result<Completion<T>>
    where
        T: Send + 'static,
        E: FnOnce(&PeripheralEvent) -> Result<T> + Send + 'static,
        C: FnOnce(&mut B) -> AdapterResult<()>,
    {
        let (tx, pending) = completion::channel(kind);
        let id = self.events.once(kind, move |event| {
            // Err only means the Completion was dropped.
            let _ = tx.send(extract(event));
        });

        let outcome = {
            let mut bindings = self.bindings();
            command(&mut *bindings)
        };
        if let Err(err) = outcome {
            self.events.off(id);
            warn!("Adapter refused command awaiting {}: {}", kind, err);
            return Err(err.into());
        }
        Ok(pending)
    }

    fn forward<C>(&self, command: C) -> Result<()>
    where
        C: FnOnce(&mut B) -> AdapterResult<()>,
    {
        let mut bindings = self.bindings();
        command(&mut *bindings).map_err(PeripheralError::from)
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Initialize the adapter, then apply configured address and parameters
    pub fn init(&self) -> Result<()> {
        info!("Initializing peripheral adapter");
        self.forward(|bindings| bindings.init())?;

        if let Some(address) = &self.config.random_address {
            self.set_random_address(address)?;
        }
        if let Some(params) = &self.config.advertising_params {
            self.set_advertising_params(params)?;
        }
        Ok(())
    }

    pub fn set_random_address(&self, address: &str) -> Result<()> {
        debug!("Setting random address {}", address);
        self.forward(|bindings| bindings.set_random_address(address))
    }

    pub fn set_advertising_params(&self, params: &AdvertisingParams) -> Result<()> {
        params.validate()?;
        debug!("Setting advertising parameters {:?}", params);
        self.forward(|bindings| bindings.set_advertising_params(params))
    }

    /// Advertise a local name and service UUIDs; requires `poweredOn`
    pub fn start_advertising<S: AsRef<str>>(
        &self,
        name: &str,
        service_uuids: &[S],
    ) -> Result<Completion<()>> {
        self.require_powered_on("start advertising")?;
        let service_uuids = normalize_service_uuids(service_uuids);

        info!("Starting advertising as {:?}", name);
        self.issue(EventKind::AdvertisingStart, advertising_outcome, |bindings| {
            bindings.start_advertising(name, &service_uuids)
        })
    }

    /// Advertise an iBeacon frame; requires `poweredOn`
    pub fn start_advertising_ibeacon(
        &self,
        uuid: &str,
        major: u16,
        minor: u16,
        measured_power: i8,
    ) -> Result<Completion<()>> {
        self.require_powered_on("start advertising")?;
        let frame = encode_ibeacon(uuid, major, minor, measured_power)?;

        info!("Starting iBeacon advertising major={} minor={}", major, minor);
        debug!("iBeacon data = {}", hex::encode(frame.as_bytes()));
        self.issue(EventKind::AdvertisingStart, advertising_outcome, |bindings| {
            bindings.start_advertising_ibeacon(&frame)
        })
    }

    /// Advertise raw EIR data, optionally with a scan response; requires `poweredOn`
    pub fn start_advertising_with_eir_data(
        &self,
        advertisement_data: &[u8],
        scan_data: Option<&[u8]>,
    ) -> Result<Completion<()>> {
        self.require_powered_on("start advertising")?;

        info!(
            "Starting advertising with {} bytes of EIR data",
            advertisement_data.len()
        );
        self.issue(EventKind::AdvertisingStart, advertising_outcome, |bindings| {
            bindings.start_advertising_with_eir_data(advertisement_data, scan_data)
        })
    }

    /// Start whichever advertising variant `request` describes
    pub fn advertise(&self, request: &AdvertisingRequest) -> Result<Completion<()>> {
        match &request.eir_data {
            Some(eir_data) => self.start_advertising_with_eir_data(
                eir_data,
                request.scan_response_data.as_deref(),
            ),
            None => self.start_advertising(&request.local_name, &request.service_uuids),
        }
    }

    pub fn stop_advertising(&self) -> Result<Completion<()>> {
        info!("Stopping advertising");
        self.issue(
            EventKind::AdvertisingStop,
            |event| match event {
                PeripheralEvent::AdvertisingStop => Ok(()),
                other => Err(unexpected(EventKind::AdvertisingStop, other)),
            },
            |bindings| bindings.stop_advertising(),
        )
    }

    pub fn set_services(&self, services: Vec<GattService>) -> Result<Completion<()>> {
        info!("Setting {} GATT services", services.len());
        self.issue(
            EventKind::ServicesSet,
            |event| match event {
                PeripheralEvent::ServicesSet(None) => Ok(()),
                PeripheralEvent::ServicesSet(Some(error)) => Err(error.clone().into()),
                other => Err(unexpected(EventKind::ServicesSet, other)),
            },
            |bindings| bindings.set_services(&services),
        )
    }

    /// Drop the current connection; resolves with the client's address
    pub fn disconnect(&self) -> Result<Completion<String>> {
        debug!("Disconnecting current client");
        self.issue(
            EventKind::Disconnect,
            |event| match event {
                PeripheralEvent::Disconnect { client_address } => Ok(client_address.clone()),
                other => Err(unexpected(EventKind::Disconnect, other)),
            },
            |bindings| bindings.disconnect(),
        )
    }

    /// Request a fresh RSSI reading for the current connection
    pub fn update_rssi(&self) -> Result<Completion<i8>> {
        self.issue(
            EventKind::RssiUpdate,
            |event| match event {
                PeripheralEvent::RssiUpdate(rssi) => Ok(*rssi),
                other => Err(unexpected(EventKind::RssiUpdate, other)),
            },
            |bindings| bindings.update_rssi(),
        )
    }

    pub fn read_advertising_channel_tx_power_level(&self) -> Result<Completion<i8>> {
        self.issue(
            EventKind::AdvertisingChannelTxPowerUpdate,
            |event| match event {
                PeripheralEvent::AdvertisingChannelTxPowerUpdate(level) => Ok(*level),
                other => Err(unexpected(EventKind::AdvertisingChannelTxPowerUpdate, other)),
            },
            |bindings| bindings.read_advertising_channel_tx_power_level(),
        )
    }

    // ------------------------------------------------------------------------
    // Adapter events
    // ------------------------------------------------------------------------

    /// Apply one adapter event to local state and republish it
    pub fn handle_adapter_event(&self, event: AdapterEvent) {
        debug!("Adapter event: {:?}", event);
        match event {
            AdapterEvent::StateChange(power_state) => {
                self.state().power_state = power_state;
                info!("Adapter state is now {}", power_state);
                self.events.emit(PeripheralEvent::StateChange(power_state));
            }
            AdapterEvent::Platform(platform) => {
                self.state().identity.platform = platform;
            }
            AdapterEvent::AddressChange(address) => {
                self.state().identity.address = address;
            }
            AdapterEvent::Accept { client_address } => {
                info!("Accepted connection from {}", client_address);
                self.events.emit(PeripheralEvent::Accept { client_address });
            }
            AdapterEvent::MtuChange(mtu) => {
                self.state().connection.mtu = mtu;
                self.events.emit(PeripheralEvent::MtuChange(mtu));
            }
            AdapterEvent::Disconnect { client_address } => {
                info!("Client {} disconnected", client_address);
                self.events.emit(PeripheralEvent::Disconnect { client_address });
            }
            AdapterEvent::AdvertisingStart(error) => {
                if let Some(error) = &error {
                    warn!("Advertising failed to start: {}", error);
                    self.events
                        .emit(PeripheralEvent::AdvertisingStartError(error.clone()));
                }
                self.events.emit(PeripheralEvent::AdvertisingStart(error));
            }
            AdapterEvent::AdvertisingStop => {
                self.events.emit(PeripheralEvent::AdvertisingStop);
            }
            AdapterEvent::ServicesSet(error) => {
                if let Some(error) = &error {
                    warn!("Setting services failed: {}", error);
                    self.events.emit(PeripheralEvent::ServicesSetError(error.clone()));
                }
                self.events.emit(PeripheralEvent::ServicesSet(error));
            }
            AdapterEvent::RssiUpdate(rssi) => {
                self.state().connection.rssi = rssi;
                self.events.emit(PeripheralEvent::RssiUpdate(rssi));
            }
            AdapterEvent::AdvertisingChannelTxPowerUpdate(level) => {
                self.events
                    .emit(PeripheralEvent::AdvertisingChannelTxPowerUpdate(level));
            }
        }
    }

    /// Handle adapter events until every sender is dropped
    pub async fn run(&self, mut adapter_events: AdapterEventReceiver) {
        info!("Peripheral event loop starting");
        while let Some(event) = adapter_events.recv().await {
            self.handle_adapter_event(event);
        }
        info!("Adapter event channel closed, peripheral event loop stopped");
    }
}

fn advertising_outcome(event: &PeripheralEvent) -> Result<()> {
    match event {
        PeripheralEvent::AdvertisingStart(None) => Ok(()),
        PeripheralEvent::AdvertisingStart(Some(error)) => Err(error.clone().into()),
        other => Err(unexpected(EventKind::AdvertisingStart, other)),
    }
}

fn unexpected(expected: EventKind, actual: &PeripheralEvent) -> PeripheralError {
    PeripheralError::UnexpectedEvent {
        expected,
        actual: actual.kind(),
    }
}
