//! GATT service descriptions handed to the adapter
//!
//! These are plain values. Building the attribute table, assigning handles
//! and serving reads and writes all happen in the adapter.

use serde::{Deserialize, Serialize};

use crate::payload::remove_dashes;

/// Operations a characteristic supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CharacteristicProperty {
    Read,
    Write,
    WriteWithoutResponse,
    Notify,
    Indicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub uuid: String,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristic {
    pub uuid: String,
    pub properties: Vec<CharacteristicProperty>,
    /// Static value; `None` leaves reads to the adapter's handler
    pub value: Option<Vec<u8>>,
    pub descriptors: Vec<Descriptor>,
}

impl Characteristic {
    pub fn new(uuid: impl AsRef<str>) -> Self {
        Self {
            uuid: remove_dashes(uuid.as_ref()),
            properties: Vec::new(),
            value: None,
            descriptors: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: CharacteristicProperty) -> Self {
        if !self.properties.contains(&property) {
            self.properties.push(property);
        }
        self
    }

    pub fn with_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_descriptor(mut self, uuid: impl AsRef<str>, value: impl Into<Vec<u8>>) -> Self {
        self.descriptors.push(Descriptor {
            uuid: remove_dashes(uuid.as_ref()),
            value: value.into(),
        });
        self
    }

    pub fn supports(&self, property: CharacteristicProperty) -> bool {
        self.properties.contains(&property)
    }
}

/// A primary service and its characteristics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GattService {
    pub uuid: String,
    pub characteristics: Vec<Characteristic>,
}

impl GattService {
    pub fn new(uuid: impl AsRef<str>) -> Self {
        Self {
            uuid: remove_dashes(uuid.as_ref()),
            characteristics: Vec::new(),
        }
    }

    pub fn with_characteristic(mut self, characteristic: Characteristic) -> Self {
        self.characteristics.push(characteristic);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_builder_normalizes_uuids() {
        let service = GattService::new("6E400001-B5A3-F393-E0A9-E50E24DCCA9E").with_characteristic(
            Characteristic::new("6E400003-B5A3-F393-E0A9-E50E24DCCA9E")
                .with_property(CharacteristicProperty::Read)
                .with_property(CharacteristicProperty::Notify)
                .with_property(CharacteristicProperty::Read)
                .with_descriptor("2901", b"RX".to_vec()),
        );

        assert_eq!(service.uuid, "6E400001B5A3F393E0A9E50E24DCCA9E");
        let characteristic = &service.characteristics[0];
        assert_eq!(characteristic.uuid, "6E400003B5A3F393E0A9E50E24DCCA9E");
        assert_eq!(characteristic.properties.len(), 2);
        assert!(characteristic.supports(CharacteristicProperty::Notify));
        assert!(!characteristic.supports(CharacteristicProperty::Write));
        assert_eq!(characteristic.descriptors[0].value, b"RX");
    }
}
