//! Bluetooth manager for the boiler controller
//! The production [`Central`], backed by bluest. Every request runs in its own
//! tokio task and reports back through the link's event sender.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, Result};
use bluest::{Adapter, AdapterEvent, Characteristic, Device, Service};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::central::{Central, CentralEvent};
use crate::core::bluetooth::commands::CentralEventSender;
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::scanner::{BluetoothScanner, DeviceMap};
use crate::core::bluetooth::types::{
    AdapterState, CharacteristicInfo, CharacteristicProperties, PeripheralId,
};
use crate::core::gatt::WriteMode;

/// Discovered GATT objects of connected peripherals
#[derive(Default)]
struct GattTable {
    services: HashMap<(PeripheralId, Uuid), Service>,
    characteristics: HashMap<(PeripheralId, Uuid, Uuid), Characteristic>,
}

impl GattTable {
    fn forget(&mut self, peripheral: &PeripheralId) {
        self.services.retain(|(owner, _), _| owner != peripheral);
        self.characteristics
            .retain(|(owner, _, _), _| owner != peripheral);
    }
}

/// Manages Bluetooth operations
pub struct BluestCentral {
    adapter: Adapter,
    events: CentralEventSender,
    /// Devices seen while scanning, by peripheral id
    devices: DeviceMap,
    gatt: Arc<Mutex<GattTable>>,
    scanner: Mutex<BluetoothScanner>,
    notification_handler: NotificationHandler,
    /// Link-loss monitors of connected devices
    monitors: Mutex<HashMap<PeripheralId, CancellationToken>>,
    link_poll_interval: Duration,
    shutdown: CancellationToken,
}

impl BluestCentral {
    /// Opens the default adapter and starts reporting its power state.
    pub async fn new(events: CentralEventSender, link_poll_interval: Duration) -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;
        let devices: DeviceMap = Arc::new(Mutex::new(HashMap::new()));
        let scanner = BluetoothScanner::new(adapter.clone(), devices.clone());
        let shutdown = CancellationToken::new();

        tokio::spawn(Self::monitor_adapter(
            adapter.clone(),
            events.clone(),
            shutdown.clone(),
        ));

        Ok(Self {
            adapter,
            events,
            devices,
            gatt: Arc::new(Mutex::new(GattTable::default())),
            scanner: Mutex::new(scanner),
            notification_handler: NotificationHandler::new(),
            monitors: Mutex::new(HashMap::new()),
            link_poll_interval,
            shutdown,
        })
    }

    /// Stops the adapter monitor and every per-device task.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.scanner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop_scan();
        for (_, token) in self
            .monitors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
        {
            token.cancel();
        }
    }

    async fn monitor_adapter(
        adapter: Adapter,
        events: CentralEventSender,
        shutdown: CancellationToken,
    ) {
        tokio::select! {
            result = adapter.wait_available() => {
                if let Err(e) = result {
                    error!("Bluetooth adapter never became available: {}", e);
                    events.send(CentralEvent::AdapterStateChanged(AdapterState::Unsupported));
                    return;
                }
            }
            _ = shutdown.cancelled() => return,
        }
        info!("Bluetooth adapter is available.");
        if !events.send(CentralEvent::AdapterStateChanged(AdapterState::PoweredOn)) {
            return;
        }

        let mut adapter_events = match adapter.events().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Adapter events unavailable, power changes go unnoticed: {}", e);
                return;
            }
        };
        loop {
            tokio::select! {
                event = adapter_events.next() => {
                    let state = match event {
                        Some(Ok(AdapterEvent::Available)) => AdapterState::PoweredOn,
                        Some(Ok(AdapterEvent::Unavailable)) => AdapterState::PoweredOff,
                        Some(Err(e)) => {
                            warn!("Adapter event error: {}", e);
                            AdapterState::Unknown
                        }
                        None => break,
                    };
                    if !events.send(CentralEvent::AdapterStateChanged(state)) {
                        break;
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
        debug!("Adapter monitor stopped.");
    }

    async fn monitor_link(
        device: Device,
        peripheral: PeripheralId,
        events: CentralEventSender,
        interval: Duration,
        cancel_token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if !device.is_connected().await {
                        events.send(CentralEvent::Disconnected {
                            peripheral,
                            error: Some("connection lost".to_string()),
                        });
                        return;
                    }
                }
                _ = cancel_token.cancelled() => return,
            }
        }
    }

    fn device(&self, peripheral: &PeripheralId) -> Option<Device> {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(peripheral)
            .cloned()
    }

    fn characteristic(
        &self,
        peripheral: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Option<Characteristic> {
        self.gatt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .characteristics
            .get(&(peripheral.clone(), service, characteristic))
            .cloned()
    }

    fn stop_monitor(&self, peripheral: &PeripheralId) {
        if let Some(token) = self
            .monitors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(peripheral)
        {
            token.cancel();
        }
    }
}

impl Central for BluestCentral {
    fn start_scan(&self, advertised: Uuid) {
        self.scanner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .start_scan(advertised, self.events.clone());
    }

    fn stop_scan(&self) {
        self.scanner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop_scan();
    }

    fn connect(&self, peripheral: &PeripheralId) {
        let Some(device) = self.device(peripheral) else {
            self.events.send(CentralEvent::ConnectFailed {
                peripheral: peripheral.clone(),
                error: format!("Device not found with ID: {}", peripheral),
            });
            return;
        };

        self.stop_monitor(peripheral);
        let cancel_token = CancellationToken::new();
        self.monitors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peripheral.clone(), cancel_token.clone());

        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let peripheral = peripheral.clone();
        let interval = self.link_poll_interval;
        tokio::spawn(async move {
            info!("Initiating connection to {}...", peripheral);
            if !device.is_connected().await {
                if let Err(e) = adapter.connect_device(&device).await {
                    events.send(CentralEvent::ConnectFailed {
                        peripheral,
                        error: e.to_string(),
                    });
                    return;
                }
            }
            info!("Connection to {} established", peripheral);
            if events.send(CentralEvent::Connected(peripheral.clone())) {
                Self::monitor_link(device, peripheral, events, interval, cancel_token).await;
            }
        });
    }

    fn disconnect(&self, peripheral: &PeripheralId) {
        self.release(peripheral);
        let Some(device) = self.device(peripheral) else {
            self.events.send(CentralEvent::Disconnected {
                peripheral: peripheral.clone(),
                error: None,
            });
            return;
        };

        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let peripheral = peripheral.clone();
        tokio::spawn(async move {
            info!("Disconnecting from device {}", peripheral);
            let error = match adapter.disconnect_device(&device).await {
                Ok(()) => None,
                Err(e) => {
                    warn!("Disconnecting from {} failed: {}", peripheral, e);
                    Some(e.to_string())
                }
            };
            events.send(CentralEvent::Disconnected { peripheral, error });
        });
    }

    fn release(&self, peripheral: &PeripheralId) {
        debug!("Releasing local state of {}", peripheral);
        self.stop_monitor(peripheral);
        self.notification_handler.stop_notifications(peripheral);
        self.gatt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .forget(peripheral);
    }

    fn discover_services(&self, peripheral: &PeripheralId, services: &[Uuid]) {
        let Some(device) = self.device(peripheral) else {
            self.events.send(CentralEvent::ServicesDiscovered {
                peripheral: peripheral.clone(),
                result: Err(format!("Device not found with ID: {}", peripheral)),
            });
            return;
        };

        let gatt = self.gatt.clone();
        let events = self.events.clone();
        let peripheral = peripheral.clone();
        let wanted = services.to_vec();
        tokio::spawn(async move {
            let mut found = Vec::new();
            let mut failure = None;
            for uuid in wanted {
                match device.discover_services_with_uuid(uuid).await {
                    Ok(services) => {
                        let mut gatt = gatt.lock().unwrap_or_else(PoisonError::into_inner);
                        for service in services {
                            info!("Found service {}", service.uuid());
                            found.push(service.uuid());
                            gatt.services
                                .insert((peripheral.clone(), service.uuid()), service);
                        }
                    }
                    Err(e) => {
                        failure = Some(e.to_string());
                        break;
                    }
                }
            }
            let result = match failure {
                Some(e) => Err(e),
                None => Ok(found),
            };
            events.send(CentralEvent::ServicesDiscovered { peripheral, result });
        });
    }

    fn discover_characteristics(&self, peripheral: &PeripheralId, service: Uuid) {
        let found = self
            .gatt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .services
            .get(&(peripheral.clone(), service))
            .cloned();
        let Some(bluest_service) = found else {
            self.events.send(CentralEvent::CharacteristicsDiscovered {
                peripheral: peripheral.clone(),
                service,
                result: Err(format!("Service not discovered: {}", service)),
            });
            return;
        };

        let gatt = self.gatt.clone();
        let events = self.events.clone();
        let peripheral = peripheral.clone();
        tokio::spawn(async move {
            let result = match bluest_service.discover_characteristics().await {
                Ok(characteristics) => {
                    let mut infos = Vec::with_capacity(characteristics.len());
                    for characteristic in characteristics {
                        let properties = match characteristic.properties().await {
                            Ok(p) => CharacteristicProperties {
                                read: p.read,
                                write: p.write,
                                write_without_response: p.write_without_response,
                                notify: p.notify,
                                indicate: p.indicate,
                            },
                            Err(e) => {
                                warn!(
                                    "Properties of {} unavailable: {}",
                                    characteristic.uuid(),
                                    e
                                );
                                CharacteristicProperties::default()
                            }
                        };
                        debug!("Characteristic {}: {:?}", characteristic.uuid(), properties);
                        infos.push(CharacteristicInfo {
                            uuid: characteristic.uuid(),
                            properties,
                        });
                        gatt.lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .characteristics
                            .insert(
                                (peripheral.clone(), service, characteristic.uuid()),
                                characteristic,
                            );
                    }
                    Ok(infos)
                }
                Err(e) => Err(e.to_string()),
            };
            events.send(CentralEvent::CharacteristicsDiscovered {
                peripheral,
                service,
                result,
            });
        });
    }

    fn read_value(&self, peripheral: &PeripheralId, service: Uuid, characteristic: Uuid) {
        let Some(handle) = self.characteristic(peripheral, service, characteristic) else {
            self.events.send(CentralEvent::ValueUpdated {
                peripheral: peripheral.clone(),
                service,
                characteristic,
                result: Err(format!("Characteristic not discovered: {}", characteristic)),
            });
            return;
        };

        let events = self.events.clone();
        let peripheral = peripheral.clone();
        tokio::spawn(async move {
            let result = handle.read().await.map_err(|e| e.to_string());
            events.send(CentralEvent::ValueUpdated {
                peripheral,
                service,
                characteristic,
                result,
            });
        });
    }

    fn set_notify_value(
        &self,
        peripheral: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
        enabled: bool,
    ) {
        if !enabled {
            self.notification_handler
                .unsubscribe(peripheral, service, characteristic);
            return;
        }
        match self.characteristic(peripheral, service, characteristic) {
            Some(handle) => self.notification_handler.subscribe(
                peripheral.clone(),
                service,
                handle,
                self.events.clone(),
            ),
            None => warn!(
                "Cannot subscribe to undiscovered characteristic {}",
                characteristic
            ),
        }
    }

    fn write_value(
        &self,
        peripheral: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
        bytes: Vec<u8>,
        mode: WriteMode,
    ) {
        let Some(handle) = self.characteristic(peripheral, service, characteristic) else {
            self.events.send(CentralEvent::WriteCompleted {
                peripheral: peripheral.clone(),
                service,
                characteristic,
                result: Err(format!("Characteristic not discovered: {}", characteristic)),
            });
            return;
        };

        let events = self.events.clone();
        let peripheral = peripheral.clone();
        tokio::spawn(async move {
            let result = match mode {
                WriteMode::WithResponse => handle.write(&bytes).await,
                WriteMode::WithoutResponse => handle.write_without_response(&bytes).await,
            };
            // Unacknowledged writes only report failures.
            if mode == WriteMode::WithResponse || result.is_err() {
                events.send(CentralEvent::WriteCompleted {
                    peripheral,
                    service,
                    characteristic,
                    result: result.map_err(|e| e.to_string()),
                });
            }
        });
    }
}

impl Drop for BluestCentral {
    fn drop(&mut self) {
        self.shutdown();
    }
}
