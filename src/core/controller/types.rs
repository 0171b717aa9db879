//! Domain types of the boiler controller firmware

use std::fmt;

use serde::{Deserialize, Serialize};

/// Controller state, an `i8` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum ControllerState {
    Undefined = -2,
    Init = 0,
    SensorsNok = 1,
    Ready = 2,
    Idle = 3,
    Recording = 4,
    Standby = 5,
    Heating = 6,
    Overheated = 7,
}

impl TryFrom<i8> for ControllerState {
    type Error = i8;

    fn try_from(raw: i8) -> Result<Self, Self::Error> {
        match raw {
            -2 => Ok(Self::Undefined),
            0 => Ok(Self::Init),
            1 => Ok(Self::SensorsNok),
            2 => Ok(Self::Ready),
            3 => Ok(Self::Idle),
            4 => Ok(Self::Recording),
            5 => Ok(Self::Standby),
            6 => Ok(Self::Heating),
            7 => Ok(Self::Overheated),
            other => Err(other),
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undefined => "Undefined",
            Self::Init => "Init",
            Self::SensorsNok => "Sensors NOK",
            Self::Ready => "Ready",
            Self::Idle => "Idle",
            Self::Recording => "Recording",
            Self::Standby => "Standby",
            Self::Heating => "Heating",
            Self::Overheated => "Overheated",
        };
        f.write_str(name)
    }
}

/// Status reported alongside a sensor temperature. Only one flag is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SensorStatus {
    Initialising = 0x1,
    IdAutoAssigned = 0x2,
    IdUndefined = 0x4,
    Ok = 0x8,
    Nok = 0x10,
}

impl SensorStatus {
    pub const ALL: [SensorStatus; 5] = [
        Self::Initialising,
        Self::IdAutoAssigned,
        Self::IdUndefined,
        Self::Ok,
        Self::Nok,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for SensorStatus {
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|status| status.code() == raw)
            .ok_or(raw)
    }
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialising => "initialising",
            Self::IdAutoAssigned => "id auto-assigned",
            Self::IdUndefined => "id undefined",
            Self::Ok => "OK",
            Self::Nok => "NOK",
        };
        f.write_str(name)
    }
}

/// One decoded sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSensor {
    /// Degrees Celsius
    pub temperature: f64,
    pub status: SensorStatus,
}

/// A single user request. Each command is a distinct bit of the `u16` mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum UserCommand {
    None = 0,
    InfoLog = 0x8,
    ConfigSetValue = 0x10,
    ConfigSwapIds = 0x20,
    ConfigClearIds = 0x40,
    ConfigAckIds = 0x80,
    ConfigResetAll = 0x100,
    RecOn = 0x200,
    RecOff = 0x400,
    HeatOn = 0x800,
    HeatOff = 0x1000,
    HeatReset = 0x2000,
}

impl UserCommand {
    pub const ALL: [UserCommand; 12] = [
        Self::None,
        Self::InfoLog,
        Self::ConfigSetValue,
        Self::ConfigSwapIds,
        Self::ConfigClearIds,
        Self::ConfigAckIds,
        Self::ConfigResetAll,
        Self::RecOn,
        Self::RecOff,
        Self::HeatOn,
        Self::HeatOff,
        Self::HeatReset,
    ];

    pub fn bits(self) -> u16 {
        self as u16
    }

    /// Name used on the command line, e.g. `heat-on`.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::InfoLog => "info-log",
            Self::ConfigSetValue => "config-set-value",
            Self::ConfigSwapIds => "config-swap-ids",
            Self::ConfigClearIds => "config-clear-ids",
            Self::ConfigAckIds => "config-ack-ids",
            Self::ConfigResetAll => "config-reset-all",
            Self::RecOn => "rec-on",
            Self::RecOff => "rec-off",
            Self::HeatOn => "heat-on",
            Self::HeatOff => "heat-off",
            Self::HeatReset => "heat-reset",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|command| command.name() == name)
    }
}

impl TryFrom<u16> for UserCommand {
    type Error = u16;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|command| command.bits() == raw)
            .ok_or(raw)
    }
}

impl fmt::Display for UserCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitmask of the commands the controller currently accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UserCommands(pub u16);

impl UserCommands {
    const CONFIGURATION_MASK: u16 = UserCommand::ConfigSetValue as u16
        | UserCommand::ConfigSwapIds as u16
        | UserCommand::ConfigClearIds as u16
        | UserCommand::ConfigAckIds as u16
        | UserCommand::ConfigResetAll as u16;

    pub fn bits(self) -> u16 {
        self.0
    }

    /// `None` is contained in every mask.
    pub fn contains(self, command: UserCommand) -> bool {
        self.0 & command.bits() == command.bits()
    }

    pub fn contains_configuration_command(self) -> bool {
        self.0 & Self::CONFIGURATION_MASK != 0
    }

    /// Commands set in the mask, lowest bit first.
    pub fn commands(self) -> Vec<UserCommand> {
        UserCommand::ALL
            .into_iter()
            .filter(|command| *command != UserCommand::None && self.contains(*command))
            .collect()
    }
}

impl fmt::Display for UserCommands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let commands = self.commands();
        if commands.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = commands.into_iter().map(UserCommand::name).collect();
        f.write_str(&names.join(", "))
    }
}
