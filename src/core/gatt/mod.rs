//! Generic GATT model
//! Typed attributes grouped into services, with availability tracking and
//! observer fan-out on a single UI-safe dispatcher.

mod attribute;
pub mod codec;
mod dispatch;
mod error;
mod service;

pub use attribute::{GattAttribute, ModifiableAttribute, ReadAttribute, WriteMode};
pub use codec::{Decode, Encode, FixedWidth, RawBytes, Scalar};
pub use dispatch::{ObserverList, UiDispatcher, UiQueue};
pub use error::{GattError, Result};
pub use service::{
    GattService, GattServiceObserver, LinkAvailability, ServiceAvailability, ValueManager,
    WriteRequest,
};
