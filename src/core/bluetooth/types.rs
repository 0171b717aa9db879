//! Defines shared data structures for the Bluetooth module.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::core::gatt::WriteMode;

/// Platform identifier of a peripheral, used to match callbacks to the handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PeripheralId(pub String);

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeripheralId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The remote device. Owned by exactly one component at a time, so it is
/// deliberately not `Clone`.
#[derive(Debug, Serialize)]
pub struct PeripheralHandle {
    pub id: PeripheralId,
    /// The advertised name
    pub name: String,
    /// MAC address, when the platform exposes it in the identifier
    pub address: Option<String>,
    /// The signal strength (RSSI) at discovery time
    pub rssi: Option<i16>,
}

impl PeripheralHandle {
    pub fn new(id: PeripheralId, name: String) -> Self {
        Self {
            id,
            name,
            address: None,
            rssi: None,
        }
    }
}

/// Power state of the local adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdapterState {
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

/// Capabilities a characteristic reports after discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CharacteristicProperties {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
    pub notify: bool,
    pub indicate: bool,
}

impl CharacteristicProperties {
    pub fn supports(&self, mode: WriteMode) -> bool {
        match mode {
            WriteMode::WithResponse => self.write,
            WriteMode::WithoutResponse => self.write_without_response,
        }
    }

    /// Notifications or indications can be enabled.
    pub fn can_notify(&self) -> bool {
        self.notify || self.indicate
    }
}

/// A characteristic as reported by discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CharacteristicInfo {
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
}
