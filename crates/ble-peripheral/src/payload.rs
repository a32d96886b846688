//! Advertising payload encoding
//!
//! Pure helpers that turn caller-facing values into the byte layouts the
//! adapter expects. EIR and scan response blocks are not built here; callers
//! hand those over as raw bytes and the adapter validates them.

use std::fmt;

use uuid::Uuid;

use crate::error::{PeripheralError, Result};
use crate::protocol::IBEACON_FRAME_LEN;

const UUID_LEN: usize = 16;
const MAJOR_OFFSET: usize = UUID_LEN;
const MINOR_OFFSET: usize = UUID_LEN + 2;
const MEASURED_POWER_OFFSET: usize = UUID_LEN + 4;

// ----------------------------------------------------------------------------
// UUID Normalization
// ----------------------------------------------------------------------------

/// Strip dash separators from a textual UUID
pub fn remove_dashes(uuid: &str) -> String {
    uuid.replace('-', "")
}

/// Dash-stripped copies of `uuids`.
///
/// Order is kept and duplicates are left in place; both matter to the
/// adapter's advertising data encoding.
pub fn normalize_service_uuids<S: AsRef<str>>(uuids: &[S]) -> Vec<String> {
    uuids.iter().map(|uuid| remove_dashes(uuid.as_ref())).collect()
}

// ----------------------------------------------------------------------------
// iBeacon
// ----------------------------------------------------------------------------

/// Encoded iBeacon advertising payload.
///
/// Layout: `[uuid: 16][major: u16 BE][minor: u16 BE][measured power: i8]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IBeaconFrame([u8; IBEACON_FRAME_LEN]);

impl IBeaconFrame {
    /// Build a frame from an already parsed UUID
    pub fn new(uuid: Uuid, major: u16, minor: u16, measured_power: i8) -> Self {
        let mut frame = [0u8; IBEACON_FRAME_LEN];
        frame[..UUID_LEN].copy_from_slice(uuid.as_bytes());
        frame[MAJOR_OFFSET..MINOR_OFFSET].copy_from_slice(&major.to_be_bytes());
        frame[MINOR_OFFSET..MEASURED_POWER_OFFSET].copy_from_slice(&minor.to_be_bytes());
        frame[MEASURED_POWER_OFFSET] = measured_power.to_be_bytes()[0];
        Self(frame)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn uuid(&self) -> Uuid {
        let mut bytes = [0u8; UUID_LEN];
        bytes.copy_from_slice(&self.0[..UUID_LEN]);
        Uuid::from_bytes(bytes)
    }

    pub fn major(&self) -> u16 {
        u16::from_be_bytes([self.0[MAJOR_OFFSET], self.0[MAJOR_OFFSET + 1]])
    }

    pub fn minor(&self) -> u16 {
        u16::from_be_bytes([self.0[MINOR_OFFSET], self.0[MINOR_OFFSET + 1]])
    }

    pub fn measured_power(&self) -> i8 {
        i8::from_be_bytes([self.0[MEASURED_POWER_OFFSET]])
    }
}

impl AsRef<[u8]> for IBeaconFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for IBeaconFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IBeaconFrame({})", hex::encode(self.0))
    }
}

/// Encode an iBeacon payload from a textual UUID.
///
/// Dashes are ignored. The remaining hex must decode to exactly 16 bytes,
/// otherwise `MalformedUuid` is returned and nothing is built.
pub fn encode_ibeacon(
    uuid: &str,
    major: u16,
    minor: u16,
    measured_power: i8,
) -> Result<IBeaconFrame> {
    let undashed = remove_dashes(uuid);
    let decoded = hex::decode(&undashed).map_err(|e| PeripheralError::MalformedUuid {
        uuid: uuid.to_string(),
        reason: e.to_string(),
    })?;

    let bytes: [u8; UUID_LEN] = decoded.as_slice().try_into().map_err(|_| {
        PeripheralError::MalformedUuid {
            uuid: uuid.to_string(),
            reason: format!("decoded to {} bytes, expected {}", decoded.len(), UUID_LEN),
        }
    })?;

    Ok(IBeaconFrame::new(
        Uuid::from_bytes(bytes),
        major,
        minor,
        measured_power,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BEACON_UUID: &str = "74278BDA-B644-4520-8F0C-720EAF059935";

    #[test]
    fn test_encode_ibeacon_layout() {
        let frame = encode_ibeacon(BEACON_UUID, 1, 2, -59).unwrap();
        let bytes = frame.as_bytes();

        assert_eq!(bytes.len(), 21);
        assert_eq!(
            &bytes[..16],
            hex::decode("74278BDAB64445208F0C720EAF059935").unwrap().as_slice()
        );
        assert_eq!(&bytes[16..18], &[0x00, 0x01]);
        assert_eq!(&bytes[18..20], &[0x00, 0x02]);
        assert_eq!(bytes[20], 0xC5);
    }

    #[test]
    fn test_encode_ibeacon_accepts_undashed_and_lowercase() {
        let dashed = encode_ibeacon(BEACON_UUID, 10, 20, -70).unwrap();
        let plain = encode_ibeacon("74278bdab64445208f0c720eaf059935", 10, 20, -70).unwrap();
        assert_eq!(dashed, plain);
    }

    #[test]
    fn test_encode_ibeacon_rejects_wrong_length() {
        let short = encode_ibeacon("74278BDA-B644-4520-8F0C", 1, 2, -59);
        assert!(matches!(short, Err(PeripheralError::MalformedUuid { .. })));

        let long = encode_ibeacon("74278BDA-B644-4520-8F0C-720EAF05993500", 1, 2, -59);
        assert!(matches!(long, Err(PeripheralError::MalformedUuid { .. })));

        // 16-bit service UUIDs are not valid beacon identifiers
        let sixteen_bit = encode_ibeacon("180D", 1, 2, -59);
        assert!(matches!(sixteen_bit, Err(PeripheralError::MalformedUuid { .. })));
    }

    #[test]
    fn test_encode_ibeacon_rejects_non_hex() {
        let result = encode_ibeacon("ZZ278BDA-B644-4520-8F0C-720EAF059935", 1, 2, -59);
        match result {
            Err(PeripheralError::MalformedUuid { uuid, .. }) => assert!(uuid.starts_with("ZZ")),
            other => panic!("expected MalformedUuid, got {:?}", other),
        }
    }

    #[test]
    fn test_frame_from_typed_uuid_matches_text() {
        let uuid = Uuid::parse_str(BEACON_UUID).unwrap();
        let frame = IBeaconFrame::new(uuid, 7, 8, -12);
        assert_eq!(frame, encode_ibeacon(BEACON_UUID, 7, 8, -12).unwrap());
        assert_eq!(frame.uuid(), uuid);
    }

    #[test]
    fn test_normalize_service_uuids_keeps_order_and_duplicates() {
        let uuids = ["180D", "6E400001-B5A3-F393-E0A9-E50E24DCCA9E", "180D"];
        assert_eq!(
            normalize_service_uuids(&uuids),
            vec!["180D", "6E400001B5A3F393E0A9E50E24DCCA9E", "180D"]
        );
        assert!(normalize_service_uuids::<&str>(&[]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_frame_fields_land_at_fixed_offsets(
            uuid_bytes in any::<[u8; 16]>(),
            major in any::<u16>(),
            minor in any::<u16>(),
            power in any::<i8>(),
        ) {
            let text = Uuid::from_bytes(uuid_bytes).hyphenated().to_string();
            let frame = encode_ibeacon(&text, major, minor, power).unwrap();
            let bytes = frame.as_bytes();

            prop_assert_eq!(&bytes[..16], &uuid_bytes[..]);
            prop_assert_eq!(u16::from_be_bytes([bytes[16], bytes[17]]), major);
            prop_assert_eq!(u16::from_be_bytes([bytes[18], bytes[19]]), minor);
            prop_assert_eq!(bytes[20] as i8, power);
            prop_assert_eq!(frame.major(), major);
            prop_assert_eq!(frame.minor(), minor);
            prop_assert_eq!(frame.measured_power(), power);
        }
    }
}
