//! Peripheral state types and HCI advertising constants

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PeripheralError, Result};

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// ATT payload size assumed until the peer negotiates a larger MTU
pub const DEFAULT_MTU: u16 = 20;

/// Length of an encoded iBeacon frame: UUID + major + minor + measured power
pub const IBEACON_FRAME_LEN: usize = 21;

/// Maximum legacy advertising (and scan response) data length
pub const MAX_ADVERTISING_DATA_LEN: usize = 31;

/// Advertising interval bounds in 0.625 ms units
pub const MIN_ADVERTISING_INTERVAL: u16 = 0x0020;
pub const MAX_ADVERTISING_INTERVAL: u16 = 0x4000;

/// All three primary advertising channels (37, 38, 39)
pub const ALL_ADVERTISING_CHANNELS: u8 = 0x07;

// ----------------------------------------------------------------------------
// Power State
// ----------------------------------------------------------------------------

/// Radio availability as reported by the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerState {
    #[default]
    Unknown,
    PoweredOn,
    PoweredOff,
    Resetting,
    Unauthorized,
    Unsupported,
}

impl PowerState {
    pub const ALL: [PowerState; 6] = [
        PowerState::Unknown,
        PowerState::PoweredOn,
        PowerState::PoweredOff,
        PowerState::Resetting,
        PowerState::Unauthorized,
        PowerState::Unsupported,
    ];

    /// The adapter's wire name for this state
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::Unknown => "unknown",
            PowerState::PoweredOn => "poweredOn",
            PowerState::PoweredOff => "poweredOff",
            PowerState::Resetting => "resetting",
            PowerState::Unauthorized => "unauthorized",
            PowerState::Unsupported => "unsupported",
        }
    }

    pub fn is_powered_on(&self) -> bool {
        *self == PowerState::PoweredOn
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PowerState {
    type Err = PeripheralError;

    fn from_str(s: &str) -> Result<Self> {
        PowerState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| PeripheralError::InvalidPowerState(s.to_string()))
    }
}

// ----------------------------------------------------------------------------
// Identity and Connection Context
// ----------------------------------------------------------------------------

/// Local adapter identity, learned from adapter events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralIdentity {
    pub address: String,
    pub platform: String,
}

impl Default for PeripheralIdentity {
    fn default() -> Self {
        Self {
            address: "unknown".to_string(),
            platform: "unknown".to_string(),
        }
    }
}

/// Link parameters of the current connection.
///
/// A single value is tracked, not one per peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionContext {
    pub mtu: u16,
    pub rssi: i8,
}

impl Default for ConnectionContext {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            rssi: 0,
        }
    }
}

// ----------------------------------------------------------------------------
// Advertising Parameters
// ----------------------------------------------------------------------------

/// HCI advertising PDU type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AdvertisingType {
    ConnectableUndirected = 0x00,
    ConnectableDirectedHighDuty = 0x01,
    ScannableUndirected = 0x02,
    NonConnectableUndirected = 0x03,
    ConnectableDirectedLowDuty = 0x04,
}

/// HCI device address type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AddressType {
    Public = 0x00,
    Random = 0x01,
}

/// Parameters of the HCI LE Set Advertising Parameters command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisingParams {
    /// Minimum interval in 0.625 ms units
    pub min_interval: u16,
    /// Maximum interval in 0.625 ms units
    pub max_interval: u16,
    pub advertising_type: AdvertisingType,
    pub own_address_type: AddressType,
    pub direct_address_type: AddressType,
    pub direct_address: String,
    pub channel_map: u8,
    pub filter_policy: u8,
}

impl Default for AdvertisingParams {
    fn default() -> Self {
        Self {
            // 100 ms
            min_interval: 0x00a0,
            max_interval: 0x00a0,
            advertising_type: AdvertisingType::ConnectableUndirected,
            own_address_type: AddressType::Public,
            direct_address_type: AddressType::Public,
            direct_address: "00:00:00:00:00:00".to_string(),
            channel_map: ALL_ADVERTISING_CHANNELS,
            filter_policy: 0x00,
        }
    }
}

impl AdvertisingParams {
    /// Check the ranges the controller would otherwise reject
    pub fn validate(&self) -> Result<()> {
        let interval_range = MIN_ADVERTISING_INTERVAL..=MAX_ADVERTISING_INTERVAL;
        if !interval_range.contains(&self.min_interval)
            || !interval_range.contains(&self.max_interval)
        {
            return Err(PeripheralError::InvalidAdvertisingParams(format!(
                "interval {:#06x}..{:#06x} outside {:#06x}..={:#06x}",
                self.min_interval,
                self.max_interval,
                MIN_ADVERTISING_INTERVAL,
                MAX_ADVERTISING_INTERVAL
            )));
        }
        if self.min_interval > self.max_interval {
            return Err(PeripheralError::InvalidAdvertisingParams(format!(
                "min interval {:#06x} exceeds max interval {:#06x}",
                self.min_interval, self.max_interval
            )));
        }
        if self.channel_map == 0 || self.channel_map & !ALL_ADVERTISING_CHANNELS != 0 {
            return Err(PeripheralError::InvalidAdvertisingParams(format!(
                "channel map {:#04x} must be a non-empty subset of {:#04x}",
                self.channel_map, ALL_ADVERTISING_CHANNELS
            )));
        }
        if self.filter_policy > 0x03 {
            return Err(PeripheralError::InvalidAdvertisingParams(format!(
                "filter policy {:#04x} out of range",
                self.filter_policy
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_state_round_trips_wire_names() {
        for state in PowerState::ALL {
            assert_eq!(state.as_str().parse::<PowerState>().unwrap(), state);
        }
        assert_eq!(
            "poweredUp".parse::<PowerState>(),
            Err(PeripheralError::InvalidPowerState("poweredUp".to_string()))
        );
    }

    #[test]
    fn test_power_state_serde_uses_camel_case() {
        let json = serde_json::to_string(&PowerState::PoweredOff).unwrap();
        assert_eq!(json, "\"poweredOff\"");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(PowerState::default(), PowerState::Unknown);
        assert_eq!(PeripheralIdentity::default().address, "unknown");
        assert_eq!(ConnectionContext::default(), ConnectionContext { mtu: 20, rssi: 0 });
    }

    #[test]
    fn test_advertising_params_validation() {
        assert!(AdvertisingParams::default().validate().is_ok());

        let params = AdvertisingParams {
            min_interval: 0x0010,
            ..AdvertisingParams::default()
        };
        assert!(params.validate().is_err());

        let params = AdvertisingParams {
            min_interval: 0x0100,
            max_interval: 0x00a0,
            ..AdvertisingParams::default()
        };
        assert!(params.validate().is_err());

        let params = AdvertisingParams {
            channel_map: 0x08,
            ..AdvertisingParams::default()
        };
        assert!(params.validate().is_err());

        let params = AdvertisingParams {
            channel_map: 0x01,
            ..AdvertisingParams::default()
        };
        assert!(params.validate().is_ok());
    }
}
