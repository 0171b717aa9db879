//! Platform BLE central port
//! Every request is fire-and-forget: its outcome comes back later as a
//! [`CentralEvent`] on the link queue.

use uuid::Uuid;

use crate::core::bluetooth::types::{AdapterState, CharacteristicInfo, PeripheralHandle, PeripheralId};
use crate::core::gatt::WriteMode;

pub trait Central: Send + Sync {
    /// Starts scanning for peripherals advertising `advertised`.
    fn start_scan(&self, advertised: Uuid);

    fn stop_scan(&self);

    fn connect(&self, peripheral: &PeripheralId);

    fn disconnect(&self, peripheral: &PeripheralId);

    /// Drops local state kept for `peripheral` (link monitor, subscriptions,
    /// discovered GATT objects) without talking to the device.
    fn release(&self, peripheral: &PeripheralId);

    /// Discovers exactly the given services.
    fn discover_services(&self, peripheral: &PeripheralId, services: &[Uuid]);

    fn discover_characteristics(&self, peripheral: &PeripheralId, service: Uuid);

    fn read_value(&self, peripheral: &PeripheralId, service: Uuid, characteristic: Uuid);

    fn set_notify_value(
        &self,
        peripheral: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
        enabled: bool,
    );

    fn write_value(
        &self,
        peripheral: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
        bytes: Vec<u8>,
        mode: WriteMode,
    );
}

/// Outcome of a central request, or an unsolicited platform event
#[derive(Debug)]
pub enum CentralEvent {
    AdapterStateChanged(AdapterState),
    PeripheralDiscovered(PeripheralHandle),
    Connected(PeripheralId),
    ConnectFailed {
        peripheral: PeripheralId,
        error: String,
    },
    /// `error` is `None` for a requested disconnect.
    Disconnected {
        peripheral: PeripheralId,
        error: Option<String>,
    },
    ServicesDiscovered {
        peripheral: PeripheralId,
        result: Result<Vec<Uuid>, String>,
    },
    CharacteristicsDiscovered {
        peripheral: PeripheralId,
        service: Uuid,
        result: Result<Vec<CharacteristicInfo>, String>,
    },
    /// A read completion or a notification.
    ValueUpdated {
        peripheral: PeripheralId,
        service: Uuid,
        characteristic: Uuid,
        result: Result<Vec<u8>, String>,
    },
    /// Only emitted for acknowledged writes, and for failures.
    WriteCompleted {
        peripheral: PeripheralId,
        service: Uuid,
        characteristic: Uuid,
        result: Result<(), String>,
    },
}
