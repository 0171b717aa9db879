use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use bluest::{Adapter, AdvertisingDevice, Device};
use futures_util::StreamExt;
use log::{debug, error, info};
use regex::Regex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::central::CentralEvent;
use crate::core::bluetooth::commands::CentralEventSender;
use crate::core::bluetooth::types::{PeripheralHandle, PeripheralId};

pub type DeviceMap = Arc<Mutex<HashMap<PeripheralId, Device>>>;

pub struct BluetoothScanner {
    adapter: Adapter,
    devices: DeviceMap,
    cancel_token: CancellationToken,
    scan_task_handle: Option<JoinHandle<()>>,
}

impl BluetoothScanner {
    pub fn new(adapter: Adapter, devices: DeviceMap) -> Self {
        Self {
            adapter,
            devices,
            cancel_token: CancellationToken::new(),
            scan_task_handle: None,
        }
    }

    /// Starts a scan task reporting every advertisement of `advertised` as a
    /// discovered peripheral. A running scan is cancelled first.
    pub fn start_scan(&mut self, advertised: Uuid, events: CentralEventSender) {
        if self.scan_task_handle.is_some() {
            self.stop_scan();
        }

        self.cancel_token = CancellationToken::new();
        let cancel_token_for_task = self.cancel_token.clone();
        let adapter_for_task = self.adapter.clone();
        let devices_for_task = self.devices.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = Self::internal_scan_task(
                adapter_for_task,
                devices_for_task,
                events,
                advertised,
                cancel_token_for_task,
            )
            .await
            {
                error!("Bluetooth scan failed: {}", e);
            }
        });

        self.scan_task_handle = Some(handle);
        info!("Device scan task started.");
    }

    pub fn stop_scan(&mut self) {
        info!("Stopping Bluetooth scan.");
        self.cancel_token.cancel();
        if self.scan_task_handle.take().is_none() {
            debug!("No active scan task to stop.");
        }
    }

    async fn internal_scan_task(
        adapter: Adapter,
        devices: DeviceMap,
        events: CentralEventSender,
        advertised: Uuid,
        cancel_token: CancellationToken,
    ) -> Result<(), bluest::Error> {
        info!("Starting bluetooth scan for {}", advertised);
        let filter = [advertised];
        let mut scan_stream = adapter.scan(&filter).await?;

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    let Some(discovered) = result else {
                        info!("Bluetooth scan stream has ended.");
                        break;
                    };
                    let handle = Self::register_device(&devices, discovered);
                    debug!("Found device {:?}", handle);
                    if !events.send(CentralEvent::PeripheralDiscovered(handle)) {
                        break;
                    }
                }
                _ = cancel_token.cancelled() => {
                    debug!("Scan task cancelled.");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Remembers the device for later connection and builds its handle.
    fn register_device(devices: &DeviceMap, discovered: AdvertisingDevice) -> PeripheralHandle {
        let device = discovered.device;
        let id = PeripheralId(device.id().to_string());
        let name = discovered
            .adv_data
            .local_name
            .or_else(|| device.name().ok())
            .unwrap_or_default();

        devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), device);

        PeripheralHandle {
            address: extract_mac_address(&id.0),
            rssi: discovered.rssi,
            id,
            name,
        }
    }
}

impl Drop for BluetoothScanner {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Pulls a MAC address out of a platform device identifier, if it has one.
pub fn extract_mac_address(device_id: &str) -> Option<String> {
    let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok()?;
    re.find_iter(device_id)
        .last()
        .map(|m| m.as_str().to_uppercase())
}
