//! Service connection handling for the boiler controller
//! Binds one connected peripheral to the registered GATT services: drives
//! service and characteristic discovery, subscribes to values, and routes
//! reads, notifications and write acknowledgements to the attributes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::core::bluetooth::central::{Central, CentralEvent};
use crate::core::bluetooth::types::{
    CharacteristicInfo, CharacteristicProperties, PeripheralHandle, PeripheralId,
};
use crate::core::gatt::{
    GattError, GattService, LinkAvailability, Result, ServiceAvailability,
    ValueManager, WriteRequest,
};

/// Result of a platform operation as reported by the central
type Outcome<T> = std::result::Result<T, String>;

pub struct ServiceConnectionManager {
    services: BTreeMap<Uuid, Arc<GattService>>,
    central: Arc<dyn Central>,
    peripheral: Option<PeripheralHandle>,
    /// Discovered characteristics of the bound peripheral, by (service, characteristic)
    characteristics: HashMap<(Uuid, Uuid), CharacteristicProperties>,
}

impl ServiceConnectionManager {
    /// Takes over a fixed, non-empty set of services. Their attribute
    /// registries are sealed and `value_manager` is bound to each of them.
    pub fn new(
        services: Vec<Arc<GattService>>,
        central: Arc<dyn Central>,
        value_manager: Arc<dyn ValueManager>,
    ) -> Result<Self> {
        if services.is_empty() {
            return Err(GattError::EmptyServiceRegistry);
        }

        let mut registry = BTreeMap::new();
        for service in services {
            let uuid = service.uuid();
            if registry.insert(uuid, service).is_some() {
                return Err(GattError::DuplicateService(uuid));
            }
        }

        for service in registry.values() {
            service.seal();
            service.bind_value_manager(value_manager.clone());
            service.availability_did_change(LinkAvailability::Uninitialized);
        }

        Ok(Self {
            services: registry,
            central,
            peripheral: None,
            characteristics: HashMap::new(),
        })
    }

    pub fn peripheral(&self) -> Option<&PeripheralHandle> {
        self.peripheral.as_ref()
    }

    pub fn service(&self, uuid: Uuid) -> Option<&Arc<GattService>> {
        self.services.get(&uuid)
    }

    pub fn service_uuids(&self) -> Vec<Uuid> {
        self.services.keys().copied().collect()
    }

    /// Binds `peripheral` and asks for exactly the registered services.
    pub fn start_discovering_services(&mut self, peripheral: PeripheralHandle) {
        info!(
            "Discovering services on {} ({})",
            peripheral.name, peripheral.id
        );
        self.characteristics.clear();
        self.central
            .discover_services(&peripheral.id, &self.service_uuids());
        self.peripheral = Some(peripheral);
    }

    /// Drops the bound peripheral. Every service loses its connection, which
    /// clears all attribute values.
    pub fn reset(&mut self) -> Option<PeripheralHandle> {
        let peripheral = self.peripheral.take()?;
        info!("Releasing peripheral {}", peripheral.id);
        for service in self.services.values() {
            service.availability_did_change(LinkAvailability::ConnectionLost);
        }
        self.characteristics.clear();
        Some(peripheral)
    }

    /// Handles a central event. Events for other peripherals are ignored.
    pub fn handle_event(&mut self, event: CentralEvent) -> Result<()> {
        match event {
            CentralEvent::ServicesDiscovered { peripheral, result } => {
                if self.is_bound_to(&peripheral) {
                    self.services_discovered(&peripheral, result);
                }
                Ok(())
            }
            CentralEvent::CharacteristicsDiscovered {
                peripheral,
                service,
                result,
            } => {
                if !self.is_bound_to(&peripheral) {
                    return Ok(());
                }
                self.characteristics_discovered(&peripheral, service, result)
            }
            CentralEvent::ValueUpdated {
                peripheral,
                service,
                characteristic,
                result,
            } => {
                if self.is_bound_to(&peripheral) {
                    self.value_updated(service, characteristic, result);
                }
                Ok(())
            }
            CentralEvent::WriteCompleted {
                peripheral,
                service,
                characteristic,
                result,
            } => {
                if !self.is_bound_to(&peripheral) {
                    return Ok(());
                }
                self.write_completed(&peripheral, service, characteristic, result)
            }
            other => {
                debug!("Connection manager ignoring {:?}", other);
                Ok(())
            }
        }
    }

    /// Writes an encoded value. Without a bound peripheral the owning service
    /// is signalled uninitialized and nothing is sent.
    pub fn update_value(&mut self, request: WriteRequest) -> Result<()> {
        let unknown = GattError::UnknownCharacteristic {
            service: request.service,
            characteristic: request.characteristic,
        };
        let service = self.services.get(&request.service).ok_or(unknown.clone())?;
        let attribute = service.attribute(request.characteristic).ok_or(unknown.clone())?;
        if attribute.write_mode().is_none() {
            return Err(GattError::ReadOnlyAttribute(request.characteristic));
        }

        let Some(peripheral) = &self.peripheral else {
            warn!(
                "No peripheral bound, dropping write to {}",
                request.characteristic
            );
            service.availability_did_change(LinkAvailability::Uninitialized);
            return Ok(());
        };

        if service.availability() != ServiceAvailability::Available {
            // Still discovering: transient, not a model mismatch.
            attribute.requested_value_did_fail("service is not available yet");
            return Ok(());
        }

        if !self
            .characteristics
            .contains_key(&(request.service, request.characteristic))
        {
            return Err(unknown);
        }

        debug!(
            "Writing {:?} to {} ({})",
            request.bytes, request.characteristic, request.mode
        );
        self.central.write_value(
            &peripheral.id,
            request.service,
            request.characteristic,
            request.bytes,
            request.mode,
        );
        Ok(())
    }

    fn is_bound_to(&self, id: &PeripheralId) -> bool {
        self.peripheral.as_ref().is_some_and(|p| &p.id == id)
    }

    fn services_discovered(&mut self, peripheral: &PeripheralId, result: Outcome<Vec<Uuid>>) {
        match result {
            Ok(discovered) => {
                for uuid in discovered {
                    if self.services.contains_key(&uuid) {
                        info!("Found service {}, discovering characteristics", uuid);
                        self.central.discover_characteristics(peripheral, uuid);
                    } else {
                        debug!("Ignoring unregistered service {}", uuid);
                    }
                }
            }
            Err(e) => {
                warn!("Service discovery on {} failed: {}", peripheral, e);
                for service in self.services.values() {
                    service.availability_did_change(LinkAvailability::Uninitialized);
                }
            }
        }
    }

    fn characteristics_discovered(
        &mut self,
        peripheral: &PeripheralId,
        service_uuid: Uuid,
        result: Outcome<Vec<CharacteristicInfo>>,
    ) -> Result<()> {
        let Some(service) = self.services.get(&service_uuid).cloned() else {
            debug!("Characteristics for unregistered service {}", service_uuid);
            return Ok(());
        };
        let characteristics = match result {
            Ok(characteristics) => characteristics,
            Err(e) => {
                warn!(
                    "Characteristic discovery for service {} failed: {}",
                    service_uuid, e
                );
                return Ok(());
            }
        };

        for info in characteristics {
            let Some(attribute) = service.attribute(info.uuid) else {
                debug!("Characteristic {} is not modelled", info.uuid);
                continue;
            };
            if let Some(mode) = attribute.write_mode() {
                if !info.properties.supports(mode) {
                    return Err(GattError::WriteModeMismatch {
                        characteristic: info.uuid,
                        mode,
                    });
                }
            }
            self.characteristics
                .insert((service_uuid, info.uuid), info.properties);

            if info.properties.read {
                self.central.read_value(peripheral, service_uuid, info.uuid);
            }
            if info.properties.can_notify() {
                self.central
                    .set_notify_value(peripheral, service_uuid, info.uuid, true);
            }
        }

        service.availability_did_change(LinkAvailability::Available);
        Ok(())
    }

    fn value_updated(
        &self,
        service_uuid: Uuid,
        characteristic: Uuid,
        result: Outcome<Vec<u8>>,
    ) {
        let Some(service) = self.services.get(&service_uuid) else {
            debug!("Value for unregistered service {}", service_uuid);
            return;
        };
        match result {
            Ok(bytes) => {
                debug!("Value of {}: {:?}", characteristic, bytes);
                service.characteristic_value_updated(characteristic, &bytes);
            }
            Err(e) => {
                warn!("Reading {} failed: {}", characteristic, e);
                if let Some(attribute) = service.attribute(characteristic) {
                    attribute.requested_value_did_fail(&e);
                }
            }
        }
    }

    fn write_completed(
        &self,
        peripheral: &PeripheralId,
        service_uuid: Uuid,
        characteristic: Uuid,
        result: Outcome<()>,
    ) -> Result<()> {
        match result {
            Ok(()) => {
                // The platform does not reflect written values locally.
                let readable = self
                    .characteristics
                    .get(&(service_uuid, characteristic))
                    .is_some_and(|properties| properties.read);
                if readable {
                    self.central
                        .read_value(peripheral, service_uuid, characteristic);
                }
                Ok(())
            }
            Err(e) => {
                let attribute = self
                    .services
                    .get(&service_uuid)
                    .and_then(|service| service.attribute(characteristic))
                    .ok_or(GattError::UnknownCharacteristic {
                        service: service_uuid,
                        characteristic,
                    })?;
                attribute.requested_value_did_fail(&e);
                Ok(())
            }
        }
    }
}
