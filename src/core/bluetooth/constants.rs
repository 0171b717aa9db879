//! Constants used throughout the application
//! UUIDs of the boiler controller service and characteristics, and default
//! link settings.

use uuid::Uuid;

/// Bluetooth base UUID, onto which 16-bit identifiers are expanded
pub const BLUETOOTH_BASE_UUID: Uuid = Uuid::from_u128(BASE_UUID_BITS);

const BASE_UUID_BITS: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Expands a 16-bit identifier onto the Bluetooth base UUID.
pub const fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(BASE_UUID_BITS | ((short as u128) << 96))
}

/// The short identifier advertised by the controller: the first two bytes of
/// the service UUID.
pub fn advertised_uuid_for(service: Uuid) -> Uuid {
    let bytes = service.as_bytes();
    uuid_from_u16(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// The UUID of the boiler controller service
pub const UUID_BOILER_CONTROLLER_SERVICE: Uuid =
    Uuid::from_u128(0x4a310c58_77b9_4a2d_8f63_8ab102d45e90);

// Status
pub const UUID_STATE: Uuid = uuid_from_u16(0x0001);
pub const UUID_TIME_IN_STATE: Uuid = uuid_from_u16(0x0002);
pub const UUID_TIME_HEATED: Uuid = uuid_from_u16(0x0003);
pub const UUID_ACCEPTED_USER_COMMANDS: Uuid = uuid_from_u16(0x0004);
pub const UUID_USER_REQUEST: Uuid = uuid_from_u16(0x0005);
pub const UUID_WATER_SENSOR: Uuid = uuid_from_u16(0x0006);
pub const UUID_AMBIENT_SENSOR: Uuid = uuid_from_u16(0x0007);
pub const UUID_TIME_TO_GO: Uuid = uuid_from_u16(0x0008);

// Configuration
pub const UUID_TARGET_TEMPERATURE: Uuid = uuid_from_u16(0x1000);

// Log
pub const UUID_LOG_ENTRY: Uuid = uuid_from_u16(0x2000);

/// Interval of the link-loss poll on a connected device, in milliseconds
pub const DEFAULT_LINK_POLL_INTERVAL_MS: u64 = 1000;

/// Default path of the configuration file
pub const DEFAULT_CONFIG_FILE: &str = "boiler_config.json";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_uuids_expand_onto_base() {
        assert_eq!(
            UUID_TARGET_TEMPERATURE.to_string(),
            "00001000-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(UUID_STATE.to_string(), "00000001-0000-1000-8000-00805f9b34fb");
    }

    #[test]
    fn advertised_uuid_uses_first_two_bytes() {
        assert_eq!(
            advertised_uuid_for(UUID_BOILER_CONTROLLER_SERVICE),
            uuid_from_u16(0x4a31)
        );
    }
}
