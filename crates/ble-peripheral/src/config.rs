//! Peripheral controller configuration

use serde::{Deserialize, Serialize};

use crate::error::{PeripheralError, Result};
use crate::protocol::{AdvertisingParams, DEFAULT_MTU};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for a [`PeripheralController`](crate::PeripheralController)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeripheralConfig {
    /// Capacity of the broadcast channel behind `subscribe()`
    pub event_buffer_size: usize,
    /// MTU reported until the adapter announces a negotiated one
    pub initial_mtu: u16,
    /// Random static address applied during `init()`
    pub random_address: Option<String>,
    /// Advertising parameters applied during `init()`
    pub advertising_params: Option<AdvertisingParams>,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 256,
            initial_mtu: DEFAULT_MTU,
            random_address: None,
            advertising_params: None,
        }
    }
}

impl PeripheralConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the subscriber broadcast capacity
    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    /// Set the MTU assumed before negotiation
    pub fn with_initial_mtu(mut self, mtu: u16) -> Self {
        self.initial_mtu = mtu;
        self
    }

    /// Use a random static address after init
    pub fn with_random_address(mut self, address: impl Into<String>) -> Self {
        self.random_address = Some(address.into());
        self
    }

    /// Apply advertising parameters after init
    pub fn with_advertising_params(mut self, params: AdvertisingParams) -> Self {
        self.advertising_params = Some(params);
        self
    }

    /// Reject settings the controller cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(PeripheralError::InvalidConfiguration(
                "event_buffer_size must be greater than zero".to_string(),
            ));
        }
        if let Some(params) = &self.advertising_params {
            params.validate()?;
        }
        Ok(())
    }
}
