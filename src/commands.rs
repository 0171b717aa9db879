//! Console commands
//! This module parses the lines typed on stdin and applies them to the
//! application state.

use log::{info, warn};
use thiserror::Error;

use crate::core::controller::codecs::TemperatureCodec;
use crate::core::controller::UserCommand;
use crate::core::gatt::GattError;
use crate::state::AppState;

pub const HELP: &str = "\
commands:
  scan                 start scanning for the controller
  stop                 stop scanning
  connect              connect to the discovered controller
  disconnect           disconnect from the controller
  target <degrees>     request a target temperature
  target + | target -  step the target temperature
  cmd <name>           send a user request, e.g. `cmd heat-on`
  status               print every value
  save                 write the current configuration file
  help                 show this text
  quit                 exit";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetChange {
    Set(f64),
    Increase,
    Decrease,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    Scan,
    Stop,
    Connect,
    Disconnect,
    Target(TargetChange),
    Request(UserCommand),
    Status,
    Save,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command `{0}`, type `help` for a list")]
    Unknown(String),

    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),

    #[error("`{0}` is not a temperature")]
    InvalidTemperature(String),

    #[error("`{0}` is not a user command")]
    UnknownUserCommand(String),

    #[error("target temperature is not known yet")]
    TargetUnknown,

    #[error("`{0}` is not accepted by the controller right now")]
    NotAccepted(UserCommand),

    #[error(transparent)]
    Gatt(#[from] GattError),

    #[error("failed to save the configuration: {0}")]
    Save(String),
}

/// Whether the console loop should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Parses one input line. Blank lines give `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let argument = words.next();

    let command = match verb.to_ascii_lowercase().as_str() {
        "scan" => ConsoleCommand::Scan,
        "stop" => ConsoleCommand::Stop,
        "connect" => ConsoleCommand::Connect,
        "disconnect" => ConsoleCommand::Disconnect,
        "status" => ConsoleCommand::Status,
        "save" => ConsoleCommand::Save,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        "target" => {
            let change = match argument.ok_or(CommandError::MissingArgument("target"))? {
                "+" => TargetChange::Increase,
                "-" => TargetChange::Decrease,
                value => value
                    .parse::<f64>()
                    .ok()
                    .filter(|degrees| TemperatureCodec::can_encode(*degrees))
                    .map(TargetChange::Set)
                    .ok_or_else(|| CommandError::InvalidTemperature(value.to_string()))?,
            };
            ConsoleCommand::Target(change)
        }
        "cmd" => {
            let name = argument.ok_or(CommandError::MissingArgument("cmd"))?;
            let command = UserCommand::from_name(name)
                .ok_or_else(|| CommandError::UnknownUserCommand(name.to_string()))?;
            ConsoleCommand::Request(command)
        }
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// Applies a parsed command.
pub async fn execute(command: ConsoleCommand, app_state: &AppState) -> Result<Flow, CommandError> {
    match command {
        ConsoleCommand::Scan => app_state.link.start_scan(),
        ConsoleCommand::Stop => app_state.link.stop_scan(),
        ConsoleCommand::Connect => app_state.link.connect(),
        ConsoleCommand::Disconnect => app_state.link.disconnect(),
        ConsoleCommand::Target(change) => set_target(change, app_state).await?,
        ConsoleCommand::Request(command) => send_request(command, app_state)?,
        ConsoleCommand::Status => app_state.presenter.print_status(),
        ConsoleCommand::Save => {
            let config = app_state.config.lock().await;
            config
                .save_config(&app_state.config_path)
                .await
                .map_err(|e| CommandError::Save(e.to_string()))?;
        }
        ConsoleCommand::Help => app_state.presenter.print(HELP),
        ConsoleCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

async fn set_target(change: TargetChange, app_state: &AppState) -> Result<(), CommandError> {
    let attribute = &app_state.model.target_temperature;
    let target = match change {
        TargetChange::Set(degrees) => degrees,
        TargetChange::Increase | TargetChange::Decrease => {
            let step = app_state.config.lock().await.target_step;
            let current = attribute
                .requested_value()
                .or_else(|| attribute.value())
                .ok_or(CommandError::TargetUnknown)?;
            if change == TargetChange::Increase {
                current + step
            } else {
                current - step
            }
        }
    };

    if !TemperatureCodec::can_encode(target) {
        return Err(CommandError::InvalidTemperature(target.to_string()));
    }

    info!("Requesting target temperature {:.1}", target);
    attribute.set_requested_value(Some(target))?;
    Ok(())
}

fn send_request(command: UserCommand, app_state: &AppState) -> Result<(), CommandError> {
    let accepted = app_state
        .model
        .accepted_user_commands
        .value()
        .unwrap_or_default();
    if !accepted.contains(command) {
        warn!("User command {} not in accepted set ({})", command, accepted);
        return Err(CommandError::NotAccepted(command));
    }

    info!("Requesting user command {}", command);
    app_state.model.user_request.set_requested_value(Some(command))?;
    Ok(())
}
