//! Bluetooth Low Energy peripheral control
//!
//! This crate is the control layer of a BLE peripheral. It does not talk to a
//! radio itself: an adapter implementing [`AdapterBindings`] does the I/O and
//! reports back through [`AdapterEvent`]s.
//!
//! ## Architecture
//!
//! - [`config`] - Controller configuration
//! - [`error`] - Error types
//! - [`protocol`] - Power state, identity, connection and advertising parameters
//! - [`payload`] - iBeacon encoding and service UUID normalization
//! - [`gatt`] - Service descriptions handed to the adapter
//! - [`events`] - Published events and the listener registry
//! - [`completion`] - Completion handles for adapter round-trips
//! - [`adapter`] - Adapter capability trait, event channel and a simulated adapter
//! - [`controller`] - The peripheral control state machine
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ble_peripheral::adapter::{event_channel, SimulatedAdapter, SimulatedAdapterConfig};
//! use ble_peripheral::{PeripheralConfig, PeripheralController};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (events_tx, events_rx) = event_channel();
//! let adapter = SimulatedAdapter::new(SimulatedAdapterConfig::default(), events_tx);
//! let controller = Arc::new(PeripheralController::new(adapter, PeripheralConfig::default()));
//!
//! let runner = Arc::clone(&controller);
//! tokio::spawn(async move { runner.run(events_rx).await });
//!
//! controller.init()?;
//! // ... wait for a `stateChange` to poweredOn, then:
//! controller
//!     .start_advertising_ibeacon("74278BDA-B644-4520-8F0C-720EAF059935", 1, 2, -59)?
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Operations that need the radio fail immediately with
//! [`PeripheralError::InvalidState`] unless the adapter last reported
//! `poweredOn`. Accepted operations return a [`Completion`] that resolves when
//! the adapter emits the matching event.

pub mod adapter;
pub mod completion;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod gatt;
pub mod payload;
pub mod protocol;

// Public API exports
pub use adapter::{AdapterBindings, AdapterEvent};
pub use completion::Completion;
pub use config::PeripheralConfig;
pub use controller::{AdvertisingRequest, PeripheralController, PeripheralSnapshot};
pub use error::{AdapterError, AdapterResult, PeripheralError, Result};
pub use events::{EventBus, EventKind, ListenerId, PeripheralEvent};
pub use gatt::{Characteristic, CharacteristicProperty, Descriptor, GattService};
pub use payload::{encode_ibeacon, normalize_service_uuids, remove_dashes, IBeaconFrame};
pub use protocol::{
    AddressType, AdvertisingParams, AdvertisingType, ConnectionContext, PeripheralIdentity,
    PowerState,
};
