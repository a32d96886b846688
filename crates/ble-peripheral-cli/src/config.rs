//! blepctl configuration
//!
//! Loaded from an optional TOML file. Both tables are optional and any key
//! left out keeps its default:
//!
//! ```toml
//! [peripheral]
//! initial_mtu = 23
//! random_address = "C0:FF:EE:00:00:01"
//!
//! [simulator]
//! power_state = "poweredOn"
//! rssi = -48
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use ble_peripheral::adapter::SimulatedAdapterConfig;
use ble_peripheral::PeripheralConfig;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliAppConfig {
    /// Controller configuration
    pub peripheral: PeripheralConfig,

    /// What the simulated adapter reports
    pub simulator: SimulatedAdapterConfig,
}

impl CliAppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.peripheral.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ble_peripheral::PowerState;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(CliAppConfig::from_toml("").unwrap(), CliAppConfig::default());
    }

    #[test]
    fn test_partial_tables() {
        let config = CliAppConfig::from_toml(
            r#"
            [peripheral]
            initial_mtu = 23
            random_address = "C0:FF:EE:00:00:01"

            [simulator]
            power_state = "poweredOff"
            "#,
        )
        .unwrap();

        assert_eq!(config.peripheral.initial_mtu, 23);
        assert_eq!(config.peripheral.event_buffer_size, 256);
        assert_eq!(
            config.peripheral.random_address.as_deref(),
            Some("C0:FF:EE:00:00:01")
        );
        assert_eq!(config.simulator.power_state, PowerState::PoweredOff);
        assert_eq!(config.simulator.platform, "simulated");
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let config = CliAppConfig::from_toml("[peripheral]\nevent_buffer_size = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_power_state_is_parse_error() {
        assert!(CliAppConfig::from_toml("[simulator]\npower_state = \"sleeping\"\n").is_err());
    }
}
