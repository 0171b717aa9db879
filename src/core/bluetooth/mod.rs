//! Bluetooth functionality for the boiler controller
//! This module handles scanning, connecting, service discovery and value
//! traffic for the single controller peripheral.

mod central;
mod commands;
mod connection;
pub mod constants;
mod discovery;
pub mod link;
mod manager;
mod notification;
mod scanner;
mod types;

// Re-export types that should be publicly accessible
pub use central::{Central, CentralEvent};
pub use commands::{CentralEventSender, LinkCommand, LinkHandle, LinkMessage};
pub use connection::ServiceConnectionManager;
pub use constants::*;
pub use discovery::{
    DiscoveryObserver, DiscoveryObservers, DiscoveryState, PeripheralDiscoveryController,
};
pub use link::{Link, LinkReceiver};
pub use manager::BluestCentral;
pub use notification::NotificationHandler;
pub use scanner::{extract_mac_address, BluetoothScanner};
pub use types::{
    AdapterState, CharacteristicInfo, CharacteristicProperties, PeripheralHandle, PeripheralId,
};
