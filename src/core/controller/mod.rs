//! Boiler controller device model
//! Firmware types, their characteristic codecs and the typed service built
//! on the generic GATT layer.

pub mod codecs;
mod model;
mod types;

pub use model::BoilerControllerService;
pub use types::{ControllerState, SensorStatus, TemperatureSensor, UserCommand, UserCommands};
