//! Typed GATT attributes
//! An attribute is the host-side model of one characteristic's value. It is
//! either read-only or modifiable; both report every assignment of their
//! value to the observers of the owning service.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::gatt::codec::{Decode, Encode};
use crate::core::gatt::error::{GattError, Result};
use crate::core::gatt::service::{GattService, WriteRequest};

/// Acknowledgement mode of an outbound write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WriteMode {
    #[default]
    WithResponse,
    WithoutResponse,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::WithResponse => f.write_str("with-response"),
            WriteMode::WithoutResponse => f.write_str("without-response"),
        }
    }
}

/// Type-erased view of an attribute, as held by its service's registry.
pub trait GattAttribute: Send + Sync {
    fn characteristic_uuid(&self) -> Uuid;

    fn service_uuid(&self) -> Uuid;

    /// Write mode the characteristic must support, `None` for read-only attributes.
    fn write_mode(&self) -> Option<WriteMode>;

    /// Decodes an inbound payload. Undecodable payloads leave the current value untouched.
    fn extract_value(&self, bytes: &[u8]);

    fn clear_value(&self);

    fn has_value(&self) -> bool;

    /// Debug rendering of the current value, for logs and generic observers.
    fn describe_value(&self) -> Option<String>;

    /// Reports a failed read or write of this attribute to the service observers.
    fn requested_value_did_fail(&self, error: &str);
}

/// Attribute whose value is only ever set by the device.
pub struct ReadAttribute<C: Decode> {
    characteristic: Uuid,
    service_uuid: Uuid,
    container: Weak<GattService>,
    codec: C,
    value: Mutex<Option<C::Value>>,
}

impl<C: Decode> ReadAttribute<C> {
    pub(crate) fn new(characteristic: Uuid, container: &Arc<GattService>, codec: C) -> Self {
        Self {
            characteristic,
            service_uuid: container.uuid(),
            container: Arc::downgrade(container),
            codec,
            value: Mutex::new(None),
        }
    }

    /// Latest decoded value, `None` until the first successful read.
    pub fn value(&self) -> Option<C::Value> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // Every assignment is reported, identical values included.
    fn set_value(&self, value: Option<C::Value>) {
        {
            let mut current = self.value.lock().unwrap_or_else(PoisonError::into_inner);
            *current = value;
        }
        if let Some(service) = self.container.upgrade() {
            service.attribute_value_did_change(self.characteristic);
        }
    }
}

impl<C: Decode> GattAttribute for ReadAttribute<C> {
    fn characteristic_uuid(&self) -> Uuid {
        self.characteristic
    }

    fn service_uuid(&self) -> Uuid {
        self.service_uuid
    }

    fn write_mode(&self) -> Option<WriteMode> {
        None
    }

    fn extract_value(&self, bytes: &[u8]) {
        match self.codec.decode(bytes) {
            Some(value) => self.set_value(Some(value)),
            None => debug!(
                "Ignoring undecodable payload {:?} for characteristic {}",
                bytes, self.characteristic
            ),
        }
    }

    fn clear_value(&self) {
        self.set_value(None);
    }

    fn has_value(&self) -> bool {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn describe_value(&self) -> Option<String> {
        self.value().map(|value| format!("{:?}", value))
    }

    fn requested_value_did_fail(&self, error: &str) {
        trace!(
            "Read-only characteristic {} reported a failure: {}",
            self.characteristic, error
        );
    }
}

/// Attribute that can also be written from the host.
///
/// Setting a requested value immediately encodes it and hands it to the
/// owning service's value manager. The authoritative [`value`](Self::value)
/// only changes once the device reports the new state back.
pub struct ModifiableAttribute<C: Encode> {
    read: ReadAttribute<C>,
    write_mode: WriteMode,
    requested: Mutex<Option<C::Value>>,
}

impl<C: Encode> ModifiableAttribute<C> {
    pub(crate) fn new(
        characteristic: Uuid,
        container: &Arc<GattService>,
        codec: C,
        write_mode: WriteMode,
    ) -> Self {
        Self {
            read: ReadAttribute::new(characteristic, container, codec),
            write_mode,
            requested: Mutex::new(None),
        }
    }

    pub fn value(&self) -> Option<C::Value> {
        self.read.value()
    }

    /// Last value requested by the host. Not rolled back when a write fails.
    pub fn requested_value(&self) -> Option<C::Value> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stages `value` and, if present, requests the write.
    ///
    /// Fails with [`GattError::NoValueManager`] when the owning service has no
    /// value manager bound.
    pub fn set_requested_value(&self, value: Option<C::Value>) -> Result<()> {
        {
            let mut requested = self.requested.lock().unwrap_or_else(PoisonError::into_inner);
            *requested = value.clone();
        }
        let Some(value) = value else {
            return Ok(());
        };

        let service = self
            .read
            .container
            .upgrade()
            .ok_or(GattError::ServiceDropped(self.read.service_uuid))?;
        let manager = service
            .value_manager()
            .ok_or(GattError::NoValueManager(service.uuid()))?;

        let bytes = self.read.codec.encode(&value);
        debug!(
            "Requesting {:?} for characteristic {}: {:?}",
            value, self.read.characteristic, bytes
        );
        manager.update_value(WriteRequest {
            service: service.uuid(),
            characteristic: self.read.characteristic,
            bytes,
            mode: self.write_mode,
        })
    }
}

impl<C: Encode> GattAttribute for ModifiableAttribute<C> {
    fn characteristic_uuid(&self) -> Uuid {
        self.read.characteristic
    }

    fn service_uuid(&self) -> Uuid {
        self.read.service_uuid
    }

    fn write_mode(&self) -> Option<WriteMode> {
        Some(self.write_mode)
    }

    fn extract_value(&self, bytes: &[u8]) {
        self.read.extract_value(bytes);
    }

    fn clear_value(&self) {
        self.read.clear_value();
    }

    fn has_value(&self) -> bool {
        self.read.has_value()
    }

    fn describe_value(&self) -> Option<String> {
        self.read.describe_value()
    }

    fn requested_value_did_fail(&self, error: &str) {
        if let Some(service) = self.read.container.upgrade() {
            service.requested_value_did_fail(self.read.characteristic, error);
        }
    }
}
