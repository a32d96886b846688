//! Adapter capability interface
//!
//! An adapter performs the actual radio I/O. The controller talks to it in two
//! directions only: imperative commands through [`AdapterBindings`], and
//! asynchronous [`AdapterEvent`]s sent back over the channel created by
//! [`event_channel`]. That channel is the only point where adapter threads
//! meet the controller.
//!
//! Commands are fire-and-forget. An `Err` return means the adapter refused the
//! command outright; the outcome of an accepted command always arrives later
//! as an event.

pub mod simulated;

pub use simulated::{SimulatedAdapter, SimulatedAdapterConfig, SimulatedLink};

use tokio::sync::mpsc;

use crate::error::{AdapterError, AdapterResult};
use crate::gatt::GattService;
use crate::payload::IBeaconFrame;
use crate::protocol::{AdvertisingParams, PowerState};

// ----------------------------------------------------------------------------
// Adapter Events
// ----------------------------------------------------------------------------

/// Event emitted by the adapter
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    StateChange(PowerState),
    Platform(String),
    AddressChange(String),
    Accept { client_address: String },
    MtuChange(u16),
    Disconnect { client_address: String },
    AdvertisingStart(Option<AdapterError>),
    AdvertisingStop,
    ServicesSet(Option<AdapterError>),
    RssiUpdate(i8),
    AdvertisingChannelTxPowerUpdate(i8),
}

pub type AdapterEventSender = mpsc::UnboundedSender<AdapterEvent>;
pub type AdapterEventReceiver = mpsc::UnboundedReceiver<AdapterEvent>;

/// Create the channel adapters use to deliver events to the controller
pub fn event_channel() -> (AdapterEventSender, AdapterEventReceiver) {
    mpsc::unbounded_channel()
}

// ----------------------------------------------------------------------------
// Adapter Commands
// ----------------------------------------------------------------------------

/// Commands the controller issues to the platform transport
pub trait AdapterBindings: Send {
    /// Open the transport and start reporting state
    fn init(&mut self) -> AdapterResult<()>;

    fn set_random_address(&mut self, address: &str) -> AdapterResult<()>;

    fn set_advertising_params(&mut self, params: &AdvertisingParams) -> AdapterResult<()>;

    /// Advertise `name` and dash-stripped `service_uuids`; answered by `AdvertisingStart`
    fn start_advertising(&mut self, name: &str, service_uuids: &[String]) -> AdapterResult<()>;

    /// Advertise a pre-encoded iBeacon frame; answered by `AdvertisingStart`
    fn start_advertising_ibeacon(&mut self, frame: &IBeaconFrame) -> AdapterResult<()>;

    /// Advertise raw EIR blocks; answered by `AdvertisingStart`
    fn start_advertising_with_eir_data(
        &mut self,
        advertisement_data: &[u8],
        scan_data: Option<&[u8]>,
    ) -> AdapterResult<()>;

    /// Answered by `AdvertisingStop`
    fn stop_advertising(&mut self) -> AdapterResult<()>;

    /// Answered by `ServicesSet`
    fn set_services(&mut self, services: &[GattService]) -> AdapterResult<()>;

    /// Answered by `Disconnect`
    fn disconnect(&mut self) -> AdapterResult<()>;

    /// Answered by `RssiUpdate`
    fn update_rssi(&mut self) -> AdapterResult<()>;

    /// Answered by `AdvertisingChannelTxPowerUpdate`
    fn read_advertising_channel_tx_power_level(&mut self) -> AdapterResult<()>;
}

impl<A: AdapterBindings + ?Sized> AdapterBindings for Box<A> {
    fn init(&mut self) -> AdapterResult<()> {
        (**self).init()
    }

    fn set_random_address(&mut self, address: &str) -> AdapterResult<()> {
        (**self).set_random_address(address)
    }

    fn set_advertising_params(&mut self, params: &AdvertisingParams) -> AdapterResult<()> {
        (**self).set_advertising_params(params)
    }

    fn start_advertising(&mut self, name: &str, service_uuids: &[String]) -> AdapterResult<()> {
        (**self).start_advertising(name, service_uuids)
    }

    fn start_advertising_ibeacon(&mut self, frame: &IBeaconFrame) -> AdapterResult<()> {
        (**self).start_advertising_ibeacon(frame)
    }

    fn start_advertising_with_eir_data(
        &mut self,
        advertisement_data: &[u8],
        scan_data: Option<&[u8]>,
    ) -> AdapterResult<()> {
        (**self).start_advertising_with_eir_data(advertisement_data, scan_data)
    }

    fn stop_advertising(&mut self) -> AdapterResult<()> {
        (**self).stop_advertising()
    }

    fn set_services(&mut self, services: &[GattService]) -> AdapterResult<()> {
        (**self).set_services(services)
    }

    fn disconnect(&mut self) -> AdapterResult<()> {
        (**self).disconnect()
    }

    fn update_rssi(&mut self) -> AdapterResult<()> {
        (**self).update_rssi()
    }

    fn read_advertising_channel_tx_power_level(&mut self) -> AdapterResult<()> {
        (**self).read_advertising_channel_tx_power_level()
    }
}
