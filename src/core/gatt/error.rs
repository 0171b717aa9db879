//! Configuration errors of the GATT model
//! These mean the compiled model does not match the device firmware contract
//! and cannot be recovered from at runtime.

use thiserror::Error;
use uuid::Uuid;

use crate::core::gatt::attribute::WriteMode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GattError {
    #[error("expected at least one GATT service")]
    EmptyServiceRegistry,

    #[error("service {0} is registered more than once")]
    DuplicateService(Uuid),

    #[error("characteristic {characteristic} is registered twice in service {service}")]
    DuplicateAttribute { service: Uuid, characteristic: Uuid },

    #[error("service {0} no longer accepts attributes, discovery has begun")]
    RegistrySealed(Uuid),

    #[error("characteristic {characteristic} of service {service} unknown or unavailable")]
    UnknownCharacteristic { service: Uuid, characteristic: Uuid },

    #[error("attribute asks for {mode} writes but characteristic {characteristic} does not support them")]
    WriteModeMismatch { characteristic: Uuid, mode: WriteMode },

    #[error("no value manager bound to service {0}")]
    NoValueManager(Uuid),

    #[error("attribute for characteristic {0} is read-only")]
    ReadOnlyAttribute(Uuid),

    #[error("service {0} owning the attribute was dropped")]
    ServiceDropped(Uuid),

    #[error("the link event loop is no longer running")]
    LinkClosed,
}

pub type Result<T> = std::result::Result<T, GattError>;
