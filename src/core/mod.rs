//! Core functionality for the boiler controller
//! The generic GATT model, the device model built on it and the Bluetooth
//! link that feeds both.

pub mod bluetooth;
pub mod controller;
pub mod gatt;

// Re-export commonly used types
pub use bluetooth::{BluestCentral, DiscoveryState, Link, LinkHandle};
pub use controller::BoilerControllerService;
