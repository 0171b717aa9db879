//! Console presenter
//! Renders the controller model as text and applies the scan/connect policy
//! when the adapter powers on and when a peripheral is discovered.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, warn};
use uuid::Uuid;

use crate::config::LinkConfig;
use crate::core::bluetooth::constants::{
    UUID_ACCEPTED_USER_COMMANDS, UUID_AMBIENT_SENSOR, UUID_LOG_ENTRY, UUID_STATE,
    UUID_TARGET_TEMPERATURE, UUID_TIME_HEATED, UUID_TIME_IN_STATE, UUID_TIME_TO_GO,
    UUID_USER_REQUEST, UUID_WATER_SENSOR,
};
use crate::core::bluetooth::{DiscoveryObserver, DiscoveryObservers, DiscoveryState, LinkHandle};
use crate::core::controller::{BoilerControllerService, SensorStatus, TemperatureSensor};
use crate::core::gatt::{GattAttribute, GattService, GattServiceObserver, ServiceAvailability};
use crate::utils::{format_millis, format_temperature};

/// Shown for values the device has not reported yet.
pub const PLACEHOLDER: &str = "--";

/// Fields in display order.
const FIELDS: [Uuid; 10] = [
    UUID_STATE,
    UUID_TIME_IN_STATE,
    UUID_TIME_HEATED,
    UUID_TIME_TO_GO,
    UUID_WATER_SENSOR,
    UUID_AMBIENT_SENSOR,
    UUID_TARGET_TEMPERATURE,
    UUID_ACCEPTED_USER_COMMANDS,
    UUID_USER_REQUEST,
    UUID_LOG_ENTRY,
];

fn or_placeholder(value: Option<String>) -> String {
    value.unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn format_sensor(sensor: TemperatureSensor) -> String {
    match sensor.status {
        SensorStatus::Ok => format!("{} °C", format_temperature(sensor.temperature)),
        status => format!("{} ({})", PLACEHOLDER, status),
    }
}

/// Label and rendered value of one controller characteristic.
pub fn field(model: &BoilerControllerService, characteristic: Uuid) -> Option<(&'static str, String)> {
    let (label, value) = match characteristic {
        UUID_STATE => ("state", model.state.value().map(|state| state.to_string())),
        UUID_TIME_IN_STATE => ("time in state", model.time_in_state.value().map(format_millis)),
        UUID_TIME_HEATED => ("time heated", model.time_heated.value().map(format_millis)),
        UUID_TIME_TO_GO => ("time to go", model.time_to_go.value().map(format_millis)),
        UUID_WATER_SENSOR => ("water", model.water_sensor.value().map(format_sensor)),
        UUID_AMBIENT_SENSOR => ("ambient", model.ambient_sensor.value().map(format_sensor)),
        UUID_TARGET_TEMPERATURE => (
            "target",
            model
                .target_temperature
                .value()
                .map(|target| format!("{} °C", target.trunc() as i64)),
        ),
        UUID_ACCEPTED_USER_COMMANDS => (
            "accepted commands",
            model
                .accepted_user_commands
                .value()
                .map(|commands| commands.to_string()),
        ),
        UUID_USER_REQUEST => (
            "user request",
            model.user_request.value().map(|command| command.to_string()),
        ),
        UUID_LOG_ENTRY => (
            "log entry",
            model.log_entry.value().map(|bytes| {
                bytes
                    .iter()
                    .map(|byte| format!("{:02x}", byte))
                    .collect::<Vec<_>>()
                    .join(" ")
            }),
        ),
        _ => return None,
    };
    Some((label, or_placeholder(value)))
}

/// Full status block for the `status` command and availability changes.
pub fn status_lines(model: &BoilerControllerService) -> Vec<String> {
    let availability = match model.service().availability() {
        ServiceAvailability::Available => "available",
        ServiceAvailability::Unavailable => "unavailable",
    };
    let mut lines = vec![format!("controller: {}", availability)];
    lines.extend(
        FIELDS
            .iter()
            .filter_map(|characteristic| field(model, *characteristic))
            .map(|(label, value)| format!("  {:<18}{}", label, value)),
    );
    lines
}

pub struct ConsolePresenter {
    model: BoilerControllerService,
    link: LinkHandle,
    auto_scan: bool,
    auto_connect: bool,
    /// Last discovery state seen, to recognise the power-on transition
    last_state: Mutex<DiscoveryState>,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsolePresenter {
    pub fn new(model: BoilerControllerService, link: LinkHandle, config: &LinkConfig) -> Arc<Self> {
        Self::with_output(model, link, config, Box::new(io::stdout()))
    }

    pub fn with_output(
        model: BoilerControllerService,
        link: LinkHandle,
        config: &LinkConfig,
        out: Box<dyn Write + Send>,
    ) -> Arc<Self> {
        Arc::new(Self {
            model,
            link,
            auto_scan: config.auto_scan,
            auto_connect: config.auto_connect,
            last_state: Mutex::new(DiscoveryState::Disabled),
            out: Mutex::new(out),
        })
    }

    /// Registers the presenter with the model and with discovery.
    pub fn attach(self: &Arc<Self>, discovery: &DiscoveryObservers) {
        self.model
            .service()
            .add_service_observer(self.clone() as Arc<dyn GattServiceObserver>);
        discovery.add(self.clone() as Arc<dyn DiscoveryObserver>);
    }

    pub fn print_status(&self) {
        self.print_lines(&status_lines(&self.model));
    }

    pub fn print(&self, line: &str) {
        self.print_lines(&[line]);
    }

    fn print_lines<S: AsRef<str>>(&self, lines: &[S]) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        for line in lines {
            if let Err(e) = writeln!(out, "{}", line.as_ref()) {
                warn!("Failed to write to the console: {}", e);
                return;
            }
        }
        let _ = out.flush();
    }
}

impl DiscoveryObserver for ConsolePresenter {
    fn discovery_state_did_change(&self, state: DiscoveryState) {
        self.print(&format!("discovery: {}", state));
        let previous = std::mem::replace(
            &mut *self.last_state.lock().unwrap_or_else(PoisonError::into_inner),
            state,
        );
        // Only power-on starts a scan; after `stop` discovery stays idle.
        match state {
            DiscoveryState::Idle if self.auto_scan && previous == DiscoveryState::Disabled => {
                debug!("Adapter powered on with auto-scan enabled, scanning.");
                self.link.start_scan();
            }
            DiscoveryState::DiscoveredPeripherals if self.auto_connect => {
                debug!("Peripheral discovered with auto-connect enabled, connecting.");
                self.link.connect();
            }
            _ => {}
        }
    }
}

impl GattServiceObserver for ConsolePresenter {
    fn availability_did_change(&self, _service: &Arc<GattService>, availability: ServiceAvailability) {
        match availability {
            ServiceAvailability::Available => self.print_status(),
            ServiceAvailability::Unavailable => self.print("controller: unavailable"),
        }
    }

    fn value_did_change(&self, _service: &Arc<GattService>, attribute: &Arc<dyn GattAttribute>) {
        if let Some((label, value)) = field(&self.model, attribute.characteristic_uuid()) {
            self.print(&format!("{}: {}", label, value));
        }
    }

    fn requested_value_did_fail(
        &self,
        _service: &Arc<GattService>,
        attribute: &Arc<dyn GattAttribute>,
        error: &str,
    ) {
        let label = field(&self.model, attribute.characteristic_uuid())
            .map(|(label, _)| label)
            .unwrap_or("value");
        self.print(&format!("failed to update {}: {}", label, error));
    }
}
