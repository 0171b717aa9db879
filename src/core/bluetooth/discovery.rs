//! Peripheral discovery for the boiler controller
//! Scan, discover and connect lifecycle of the single peripheral advertising
//! the controller's identifier. On connect the peripheral is handed over to
//! the [`ServiceConnectionManager`].

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::core::bluetooth::central::{Central, CentralEvent};
use crate::core::bluetooth::connection::ServiceConnectionManager;
use crate::core::bluetooth::types::{AdapterState, PeripheralHandle, PeripheralId};
use crate::core::gatt::{ObserverList, Result, UiDispatcher, WriteRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiscoveryState {
    Disabled,
    Idle,
    Scanning,
    DiscoveredPeripherals,
    Connected,
}

impl fmt::Display for DiscoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disabled => "disabled",
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::DiscoveredPeripherals => "peripheral discovered",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Receives discovery state changes, always on the UI dispatcher.
pub trait DiscoveryObserver: Send + Sync {
    fn discovery_state_did_change(&self, state: DiscoveryState);
}

pub type DiscoveryObservers = Arc<ObserverList<dyn DiscoveryObserver>>;

/// How a reset treats the peripheral it forgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    /// The link is already gone or was never up.
    Release,
    /// The link may still be up and must be closed.
    Disconnect,
}

pub struct PeripheralDiscoveryController {
    advertised_uuid: Uuid,
    central: Arc<dyn Central>,
    services: ServiceConnectionManager,
    /// Discovered but not yet connected
    pending: Option<PeripheralHandle>,
    /// Identity of the pending or connected peripheral
    current: Option<PeripheralId>,
    state: DiscoveryState,
    observers: DiscoveryObservers,
    dispatcher: UiDispatcher,
}

impl PeripheralDiscoveryController {
    pub fn new(
        advertised_uuid: Uuid,
        central: Arc<dyn Central>,
        services: ServiceConnectionManager,
        dispatcher: UiDispatcher,
    ) -> Self {
        Self {
            advertised_uuid,
            central,
            services,
            pending: None,
            current: None,
            state: DiscoveryState::Disabled,
            observers: Arc::new(ObserverList::new()),
            dispatcher,
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    pub fn advertised_uuid(&self) -> Uuid {
        self.advertised_uuid
    }

    /// The discovered or connected peripheral, if any.
    pub fn peripheral(&self) -> Option<&PeripheralHandle> {
        self.pending.as_ref().or_else(|| self.services.peripheral())
    }

    pub fn services(&self) -> &ServiceConnectionManager {
        &self.services
    }

    /// Shared observer registry, usable after the controller moved into the link task.
    pub fn observers(&self) -> DiscoveryObservers {
        self.observers.clone()
    }

    pub fn add_availability_observer(&self, observer: Arc<dyn DiscoveryObserver>) {
        self.observers.add(observer);
    }

    pub fn remove_availability_observer(&self, observer: &Arc<dyn DiscoveryObserver>) {
        self.observers.remove(observer);
    }

    pub fn start_scan(&mut self) {
        if !matches!(
            self.state,
            DiscoveryState::Idle | DiscoveryState::DiscoveredPeripherals
        ) {
            debug!("Ignoring start scan while {}", self.state);
            return;
        }
        self.reset(DiscoveryState::Scanning, Teardown::Release);
        self.central.start_scan(self.advertised_uuid);
        info!("Started scan for advertised UUID {}", self.advertised_uuid);
    }

    pub fn stop_scan(&mut self) {
        if self.state != DiscoveryState::Scanning {
            debug!("Ignoring stop scan while {}", self.state);
            return;
        }
        self.central.stop_scan();
        info!("Stopped scan");
        let next = if self.pending.is_some() {
            DiscoveryState::DiscoveredPeripherals
        } else {
            DiscoveryState::Idle
        };
        self.set_state(next);
    }

    pub fn connect_to_peripheral(&mut self) {
        if self.state != DiscoveryState::DiscoveredPeripherals {
            debug!("Ignoring connect while {}", self.state);
            return;
        }
        if let Some(peripheral) = &self.pending {
            info!("Connecting to {} ({})", peripheral.name, peripheral.id);
            self.central.connect(&peripheral.id);
        }
    }

    pub fn disconnect_from_peripheral(&mut self) {
        if self.state != DiscoveryState::Connected {
            debug!("Ignoring disconnect while {}", self.state);
            return;
        }
        if let Some(id) = &self.current {
            info!("Disconnecting from {}", id);
            self.central.disconnect(id);
        }
    }

    /// Forwards a write from a modifiable attribute to the connection manager.
    pub fn update_value(&mut self, request: WriteRequest) -> Result<()> {
        self.services.update_value(request)
    }

    /// Routes a central event. Only configuration errors are returned.
    pub fn handle_event(&mut self, event: CentralEvent) -> Result<()> {
        match event {
            CentralEvent::AdapterStateChanged(adapter) => {
                self.adapter_state_changed(adapter);
                Ok(())
            }
            CentralEvent::PeripheralDiscovered(peripheral) => {
                self.peripheral_discovered(peripheral);
                Ok(())
            }
            CentralEvent::Connected(id) => {
                self.connected(id);
                Ok(())
            }
            CentralEvent::ConnectFailed { peripheral, error } => {
                if self.is_current(&peripheral) {
                    warn!("Failed to connect to {}: {}", peripheral, error);
                    self.reset(DiscoveryState::Idle, Teardown::Release);
                    self.start_scan();
                }
                Ok(())
            }
            CentralEvent::Disconnected { peripheral, error } => {
                if self.is_current(&peripheral) {
                    match error {
                        Some(e) => warn!("Lost connection to {}: {}", peripheral, e),
                        None => info!("Disconnected from {}", peripheral),
                    }
                    self.reset(DiscoveryState::Idle, Teardown::Release);
                    self.start_scan();
                }
                Ok(())
            }
            other => self.services.handle_event(other),
        }
    }

    fn adapter_state_changed(&mut self, adapter: AdapterState) {
        info!("Adapter state: {:?}", adapter);
        match adapter {
            AdapterState::PoweredOn => {
                if self.state == DiscoveryState::Disabled {
                    self.set_state(DiscoveryState::Idle);
                }
            }
            AdapterState::PoweredOff
            | AdapterState::Resetting
            | AdapterState::Unauthorized
            | AdapterState::Unsupported
            | AdapterState::Unknown => self.reset(DiscoveryState::Disabled, Teardown::Disconnect),
        }
    }

    fn peripheral_discovered(&mut self, peripheral: PeripheralHandle) {
        if peripheral.name.trim().is_empty() {
            debug!("Ignoring unnamed peripheral {}", peripheral.id);
            return;
        }
        // Only the first match of a scan is kept.
        if self.state != DiscoveryState::Scanning || self.current.is_some() {
            debug!("Ignoring peripheral {} while {}", peripheral.id, self.state);
            return;
        }
        info!(
            "Discovered peripheral {} ({}), RSSI {:?}",
            peripheral.name, peripheral.id, peripheral.rssi
        );
        self.current = Some(peripheral.id.clone());
        self.pending = Some(peripheral);
        self.stop_scan();
    }

    fn connected(&mut self, id: PeripheralId) {
        if self.state != DiscoveryState::DiscoveredPeripherals || !self.is_current(&id) {
            debug!("Ignoring connection of {} while {}", id, self.state);
            return;
        }
        let Some(peripheral) = self.pending.take() else {
            return;
        };
        info!("Connected to {} ({})", peripheral.name, peripheral.id);
        self.set_state(DiscoveryState::Connected);
        self.services.start_discovering_services(peripheral);
    }

    fn is_current(&self, id: &PeripheralId) -> bool {
        self.current.as_ref() == Some(id)
    }

    /// Stops a running scan, forgets the peripheral, releases the services
    /// and enters `state`. A bound peripheral is disconnected only for
    /// [`Teardown::Disconnect`]; otherwise the central just drops its state.
    fn reset(&mut self, state: DiscoveryState, teardown: Teardown) {
        if self.state == DiscoveryState::Scanning {
            self.central.stop_scan();
        }
        self.pending = None;
        let bound = self.services.reset().is_some();
        if let Some(id) = self.current.take() {
            if bound && teardown == Teardown::Disconnect {
                info!("Disconnecting from {}", id);
                self.central.disconnect(&id);
            } else {
                self.central.release(&id);
            }
        }
        self.set_state(state);
    }

    // Observers hear about every assignment, including re-entering a state.
    fn set_state(&mut self, state: DiscoveryState) {
        self.state = state;
        info!("Discovery is {}", state);
        let observers = self.observers.snapshot();
        self.dispatcher.dispatch(move || {
            for observer in observers {
                observer.discovery_state_did_change(state);
            }
        });
    }
}
