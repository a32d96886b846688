//! In-process adapter
//!
//! Answers every command with the event a real transport would send, without
//! touching a radio. A [`SimulatedLink`] plays the remote side: it injects
//! peer connections, MTU negotiation and power changes.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AdapterError, AdapterResult};
use crate::gatt::GattService;
use crate::payload::IBeaconFrame;
use crate::protocol::{AdvertisingParams, PowerState, MAX_ADVERTISING_DATA_LEN};

use super::{AdapterBindings, AdapterEvent, AdapterEventSender};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// What the simulated adapter reports about itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedAdapterConfig {
    pub platform: String,
    pub address: String,
    /// Power state reported on `init`
    pub power_state: PowerState,
    pub rssi: i8,
    pub tx_power_level: i8,
    /// Longest advertising or scan response block accepted
    pub max_advertising_data_len: usize,
}

impl Default for SimulatedAdapterConfig {
    fn default() -> Self {
        Self {
            platform: "simulated".to_string(),
            address: "00:1a:7d:da:71:13".to_string(),
            power_state: PowerState::PoweredOn,
            rssi: -55,
            tx_power_level: 10,
            max_advertising_data_len: MAX_ADVERTISING_DATA_LEN,
        }
    }
}

// ----------------------------------------------------------------------------
// Shared Link State
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LinkState {
    power_state: PowerState,
    client: Option<String>,
    advertising: bool,
    advertising_params: Option<AdvertisingParams>,
    services: Vec<GattService>,
}

fn lock(state: &Mutex<LinkState>) -> MutexGuard<'_, LinkState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn send(events: &AdapterEventSender, event: AdapterEvent) -> AdapterResult<()> {
    events
        .send(event)
        .map_err(|_| AdapterError::new("adapter event channel closed"))
}

// ----------------------------------------------------------------------------
// Simulated Adapter
// ----------------------------------------------------------------------------

pub struct SimulatedAdapter {
    config: SimulatedAdapterConfig,
    events: AdapterEventSender,
    state: Arc<Mutex<LinkState>>,
}

impl SimulatedAdapter {
    pub fn new(config: SimulatedAdapterConfig, events: AdapterEventSender) -> Self {
        Self {
            config,
            events,
            state: Arc::new(Mutex::new(LinkState::default())),
        }
    }

    /// Handle for driving the remote side of this adapter
    pub fn link(&self) -> SimulatedLink {
        SimulatedLink {
            events: self.events.clone(),
            state: Arc::clone(&self.state),
        }
    }

    fn emit(&self, event: AdapterEvent) -> AdapterResult<()> {
        send(&self.events, event)
    }

    fn check_data_len(&self, what: &str, data: &[u8]) -> Option<AdapterError> {
        (data.len() > self.config.max_advertising_data_len).then(|| {
            AdapterError::new(format!(
                "{} is {} bytes, limit is {}",
                what,
                data.len(),
                self.config.max_advertising_data_len
            ))
        })
    }

    fn begin_advertising(&self, error: Option<AdapterError>) -> AdapterResult<()> {
        if error.is_none() {
            lock(&self.state).advertising = true;
        }
        self.emit(AdapterEvent::AdvertisingStart(error))
    }
}

impl AdapterBindings for SimulatedAdapter {
    fn init(&mut self) -> AdapterResult<()> {
        lock(&self.state).power_state = self.config.power_state;
        self.emit(AdapterEvent::Platform(self.config.platform.clone()))?;
        self.emit(AdapterEvent::AddressChange(self.config.address.clone()))?;
        self.emit(AdapterEvent::StateChange(self.config.power_state))
    }

    fn set_random_address(&mut self, address: &str) -> AdapterResult<()> {
        self.config.address = address.to_string();
        self.emit(AdapterEvent::AddressChange(address.to_string()))
    }

    fn set_advertising_params(&mut self, params: &AdvertisingParams) -> AdapterResult<()> {
        lock(&self.state).advertising_params = Some(params.clone());
        Ok(())
    }

    fn start_advertising(&mut self, name: &str, service_uuids: &[String]) -> AdapterResult<()> {
        debug!("Simulated advertising of {:?} with {} service UUIDs", name, service_uuids.len());
        self.begin_advertising(None)
    }

    fn start_advertising_ibeacon(&mut self, frame: &IBeaconFrame) -> AdapterResult<()> {
        debug!("Simulated iBeacon advertising: {:?}", frame);
        self.begin_advertising(None)
    }

    fn start_advertising_with_eir_data(
        &mut self,
        advertisement_data: &[u8],
        scan_data: Option<&[u8]>,
    ) -> AdapterResult<()> {
        let error = self
            .check_data_len("advertising data", advertisement_data)
            .or_else(|| scan_data.and_then(|data| self.check_data_len("scan response data", data)));
        self.begin_advertising(error)
    }

    fn stop_advertising(&mut self) -> AdapterResult<()> {
        lock(&self.state).advertising = false;
        self.emit(AdapterEvent::AdvertisingStop)
    }

    fn set_services(&mut self, services: &[GattService]) -> AdapterResult<()> {
        lock(&self.state).services = services.to_vec();
        self.emit(AdapterEvent::ServicesSet(None))
    }

    fn disconnect(&mut self) -> AdapterResult<()> {
        let client = lock(&self.state).client.take();
        match client {
            Some(client_address) => self.emit(AdapterEvent::Disconnect { client_address }),
            None => {
                debug!("Disconnect requested with no connected client");
                Ok(())
            }
        }
    }

    fn update_rssi(&mut self) -> AdapterResult<()> {
        self.emit(AdapterEvent::RssiUpdate(self.config.rssi))
    }

    fn read_advertising_channel_tx_power_level(&mut self) -> AdapterResult<()> {
        self.emit(AdapterEvent::AdvertisingChannelTxPowerUpdate(self.config.tx_power_level))
    }
}

// ----------------------------------------------------------------------------
// Simulated Link
// ----------------------------------------------------------------------------

/// Remote side of a [`SimulatedAdapter`]
#[derive(Clone)]
pub struct SimulatedLink {
    events: AdapterEventSender,
    state: Arc<Mutex<LinkState>>,
}

impl SimulatedLink {
    /// A central connects and negotiates `mtu`
    pub fn connect(&self, client_address: &str, mtu: u16) -> AdapterResult<()> {
        lock(&self.state).client = Some(client_address.to_string());
        send(
            &self.events,
            AdapterEvent::Accept {
                client_address: client_address.to_string(),
            },
        )?;
        send(&self.events, AdapterEvent::MtuChange(mtu))
    }

    /// The connected central goes away
    pub fn drop_connection(&self) -> AdapterResult<()> {
        let client = lock(&self.state).client.take();
        match client {
            Some(client_address) => send(&self.events, AdapterEvent::Disconnect { client_address }),
            None => Ok(()),
        }
    }

    /// The radio changes power state; advertising stops unless powered on
    pub fn set_power_state(&self, power_state: PowerState) -> AdapterResult<()> {
        {
            let mut state = lock(&self.state);
            state.power_state = power_state;
            if !power_state.is_powered_on() {
                state.advertising = false;
                state.client = None;
            }
        }
        send(&self.events, AdapterEvent::StateChange(power_state))
    }

    pub fn power_state(&self) -> PowerState {
        lock(&self.state).power_state
    }

    pub fn is_advertising(&self) -> bool {
        lock(&self.state).advertising
    }

    pub fn connected_client(&self) -> Option<String> {
        lock(&self.state).client.clone()
    }

    pub fn services(&self) -> Vec<GattService> {
        lock(&self.state).services.clone()
    }

    pub fn advertising_params(&self) -> Option<AdvertisingParams> {
        lock(&self.state).advertising_params.clone()
    }
}
