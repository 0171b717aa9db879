//! Codecs for the boiler controller characteristics

use crate::core::controller::types::{
    ControllerState, SensorStatus, TemperatureSensor, UserCommand, UserCommands,
};
use crate::core::gatt::codec::{self, Decode, Encode};

/// `i8` state code
#[derive(Debug, Default, Clone, Copy)]
pub struct ControllerStateCodec;

impl Decode for ControllerStateCodec {
    type Value = ControllerState;

    fn decode(&self, bytes: &[u8]) -> Option<ControllerState> {
        ControllerState::try_from(codec::extract::<i8>(bytes, 0)?).ok()
    }
}

/// Packed `i32` sensor word: temperature in hundredths of a degree in the
/// upper 24 bits, status code in the low byte.
#[derive(Debug, Default, Clone, Copy)]
pub struct SensorCodec;

impl SensorCodec {
    pub fn pack(temperature: f64, status: SensorStatus) -> i32 {
        let hundredths = (temperature * 100.0).round() as i32;
        (hundredths << 8) | i32::from(status.code())
    }
}

impl Decode for SensorCodec {
    type Value = TemperatureSensor;

    fn decode(&self, bytes: &[u8]) -> Option<TemperatureSensor> {
        let word = codec::extract::<i32>(bytes, 0)?;
        let status = SensorStatus::try_from((word & 0xFF) as u8).ok()?;
        Some(TemperatureSensor {
            temperature: f64::from(word >> 8) / 100.0,
            status,
        })
    }
}

impl Encode for SensorCodec {
    fn encode(&self, value: &TemperatureSensor) -> Vec<u8> {
        codec::encode(Self::pack(value.temperature, value.status))
    }
}

/// `i16` hundredths of a degree, degrees Celsius on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemperatureCodec;

impl TemperatureCodec {
    pub const MIN: f64 = i16::MIN as f64 / 100.0;
    pub const MAX: f64 = i16::MAX as f64 / 100.0;

    /// Whether `celsius` encodes without saturating.
    pub fn can_encode(celsius: f64) -> bool {
        (Self::MIN..=Self::MAX).contains(&celsius)
    }
}

impl Decode for TemperatureCodec {
    type Value = f64;

    fn decode(&self, bytes: &[u8]) -> Option<f64> {
        codec::extract::<i16>(bytes, 0).map(|raw| f64::from(raw) / 100.0)
    }
}

impl Encode for TemperatureCodec {
    fn encode(&self, value: &f64) -> Vec<u8> {
        codec::encode((value * 100.0).round() as i16)
    }
}

/// `u16` bitmask of accepted commands
#[derive(Debug, Default, Clone, Copy)]
pub struct UserCommandsCodec;

impl Decode for UserCommandsCodec {
    type Value = UserCommands;

    fn decode(&self, bytes: &[u8]) -> Option<UserCommands> {
        codec::extract::<u16>(bytes, 0).map(UserCommands)
    }
}

/// A single `u16` command bit
#[derive(Debug, Default, Clone, Copy)]
pub struct UserCommandCodec;

impl Decode for UserCommandCodec {
    type Value = UserCommand;

    fn decode(&self, bytes: &[u8]) -> Option<UserCommand> {
        UserCommand::try_from(codec::extract::<u16>(bytes, 0)?).ok()
    }
}

impl Encode for UserCommandCodec {
    fn encode(&self, value: &UserCommand) -> Vec<u8> {
        codec::encode(value.bits())
    }
}
