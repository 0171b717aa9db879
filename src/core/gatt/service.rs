//! GATT services
//! A service owns the registry of its attributes, tracks whether the device
//! currently exposes it and fans value and availability changes out to its
//! observers on the UI dispatcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use log::{debug, info, warn};
use uuid::Uuid;

use crate::core::gatt::attribute::{GattAttribute, ModifiableAttribute, ReadAttribute, WriteMode};
use crate::core::gatt::codec::{Decode, Encode};
use crate::core::gatt::dispatch::{ObserverList, UiDispatcher};
use crate::core::gatt::error::{GattError, Result};

/// Availability of a service as seen by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAvailability {
    Unavailable,
    Available,
}

/// Availability signal from the connection layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAvailability {
    Uninitialized,
    Available,
    ConnectionLost,
}

/// An encoded write for one characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub service: Uuid,
    pub characteristic: Uuid,
    pub bytes: Vec<u8>,
    pub mode: WriteMode,
}

/// Carries writes from modifiable attributes to the live connection.
pub trait ValueManager: Send + Sync {
    fn update_value(&self, request: WriteRequest) -> Result<()>;
}

/// Receives service-level notifications, always on the UI dispatcher.
pub trait GattServiceObserver: Send + Sync {
    fn availability_did_change(&self, service: &Arc<GattService>, availability: ServiceAvailability);

    fn value_did_change(&self, service: &Arc<GattService>, attribute: &Arc<dyn GattAttribute>);

    fn requested_value_did_fail(
        &self,
        service: &Arc<GattService>,
        attribute: &Arc<dyn GattAttribute>,
        error: &str,
    ) {
        let _ = (service, attribute, error);
    }
}

pub struct GattService {
    uuid: Uuid,
    me: Weak<GattService>,
    attributes: RwLock<HashMap<Uuid, Arc<dyn GattAttribute>>>,
    sealed: AtomicBool,
    availability: Mutex<ServiceAvailability>,
    value_manager: RwLock<Option<Arc<dyn ValueManager>>>,
    observers: ObserverList<dyn GattServiceObserver>,
    dispatcher: UiDispatcher,
}

impl GattService {
    pub fn new(uuid: Uuid, dispatcher: UiDispatcher) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            uuid,
            me: me.clone(),
            attributes: RwLock::new(HashMap::new()),
            sealed: AtomicBool::new(false),
            availability: Mutex::new(ServiceAvailability::Unavailable),
            value_manager: RwLock::new(None),
            observers: ObserverList::new(),
            dispatcher,
        })
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Creates and registers a read-only attribute.
    pub fn add_read_attribute<C: Decode>(
        self: &Arc<Self>,
        characteristic: Uuid,
        codec: C,
    ) -> Result<Arc<ReadAttribute<C>>> {
        let attribute = Arc::new(ReadAttribute::new(characteristic, self, codec));
        self.add_attribute(attribute.clone())?;
        Ok(attribute)
    }

    /// Creates and registers a modifiable attribute.
    pub fn add_modifiable_attribute<C: Encode>(
        self: &Arc<Self>,
        characteristic: Uuid,
        codec: C,
        write_mode: WriteMode,
    ) -> Result<Arc<ModifiableAttribute<C>>> {
        let attribute = Arc::new(ModifiableAttribute::new(
            characteristic,
            self,
            codec,
            write_mode,
        ));
        self.add_attribute(attribute.clone())?;
        Ok(attribute)
    }

    /// Registers an attribute. Characteristic UUIDs are unique per service and
    /// the registry is closed once discovery has begun.
    pub fn add_attribute(&self, attribute: Arc<dyn GattAttribute>) -> Result<()> {
        if self.sealed.load(Ordering::SeqCst) {
            return Err(GattError::RegistrySealed(self.uuid));
        }
        let characteristic = attribute.characteristic_uuid();
        let mut attributes = self
            .attributes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if attributes.contains_key(&characteristic) {
            return Err(GattError::DuplicateAttribute {
                service: self.uuid,
                characteristic,
            });
        }
        attributes.insert(characteristic, attribute);
        Ok(())
    }

    /// Closes the attribute registry.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    pub fn attribute(&self, characteristic: Uuid) -> Option<Arc<dyn GattAttribute>> {
        self.attributes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&characteristic)
            .cloned()
    }

    pub fn attributes(&self) -> Vec<Arc<dyn GattAttribute>> {
        self.attributes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn availability(&self) -> ServiceAvailability {
        *self
            .availability
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn bind_value_manager(&self, manager: Arc<dyn ValueManager>) {
        *self
            .value_manager
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(manager);
    }

    pub fn value_manager(&self) -> Option<Arc<dyn ValueManager>> {
        self.value_manager
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn add_service_observer(&self, observer: Arc<dyn GattServiceObserver>) {
        self.observers.add(observer);
    }

    pub fn remove_service_observer(&self, observer: &Arc<dyn GattServiceObserver>) {
        self.observers.remove(observer);
    }

    /// Applies a connection-layer availability signal. Becoming unavailable
    /// clears every attribute value.
    pub fn availability_did_change(&self, link: LinkAvailability) {
        match link {
            LinkAvailability::Uninitialized | LinkAvailability::ConnectionLost => {
                self.set_availability(ServiceAvailability::Unavailable);
                for attribute in self.attributes() {
                    attribute.clear_value();
                }
            }
            LinkAvailability::Available => self.set_availability(ServiceAvailability::Available),
        }
    }

    /// Routes an inbound payload to the attribute registered for `characteristic`.
    /// Characteristics the model does not know about are ignored.
    pub fn characteristic_value_updated(&self, characteristic: Uuid, bytes: &[u8]) {
        match self.attribute(characteristic) {
            Some(attribute) => attribute.extract_value(bytes),
            None => debug!(
                "Service {}: ignoring value for unmodelled characteristic {}",
                self.uuid, characteristic
            ),
        }
    }

    fn set_availability(&self, availability: ServiceAvailability) {
        {
            let mut current = self
                .availability
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *current == availability {
                return;
            }
            *current = availability;
        }
        info!("Service {} is {:?}", self.uuid, availability);

        let Some(service) = self.me.upgrade() else {
            return;
        };
        let observers = self.observers.snapshot();
        self.dispatcher.dispatch(move || {
            for observer in observers {
                observer.availability_did_change(&service, availability);
            }
        });
    }

    pub(crate) fn attribute_value_did_change(&self, characteristic: Uuid) {
        let (Some(service), Some(attribute)) = (self.me.upgrade(), self.attribute(characteristic))
        else {
            return;
        };
        let observers = self.observers.snapshot();
        self.dispatcher.dispatch(move || {
            for observer in observers {
                observer.value_did_change(&service, &attribute);
            }
        });
    }

    pub(crate) fn requested_value_did_fail(&self, characteristic: Uuid, error: &str) {
        warn!(
            "Service {}: update of characteristic {} failed: {}",
            self.uuid, characteristic, error
        );
        let (Some(service), Some(attribute)) = (self.me.upgrade(), self.attribute(characteristic))
        else {
            return;
        };
        let observers = self.observers.snapshot();
        let error = error.to_string();
        self.dispatcher.dispatch(move || {
            for observer in observers {
                observer.requested_value_did_fail(&service, &attribute, &error);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gatt::codec::Scalar;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    impl GattServiceObserver for Recorder {
        fn availability_did_change(&self, _: &Arc<GattService>, availability: ServiceAvailability) {
            self.events
                .lock()
                .unwrap()
                .push(format!("availability {:?}", availability));
        }

        fn value_did_change(&self, _: &Arc<GattService>, attribute: &Arc<dyn GattAttribute>) {
            self.events
                .lock()
                .unwrap()
                .push(format!("value {:?}", attribute.describe_value()));
        }

        fn requested_value_did_fail(
            &self,
            _: &Arc<GattService>,
            attribute: &Arc<dyn GattAttribute>,
            error: &str,
        ) {
            self.events.lock().unwrap().push(format!(
                "failed {} {}",
                attribute.characteristic_uuid(),
                error
            ));
        }
    }

    #[derive(Default)]
    struct Requests(Mutex<Vec<WriteRequest>>);

    impl ValueManager for Requests {
        fn update_value(&self, request: WriteRequest) -> Result<()> {
            self.0.lock().unwrap().push(request);
            Ok(())
        }
    }

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn service_with_recorder() -> (Arc<GattService>, Arc<Recorder>) {
        let service = GattService::new(uuid(0xA), UiDispatcher::inline());
        let recorder = Arc::new(Recorder::default());
        service.add_service_observer(recorder.clone());
        (service, recorder)
    }

    #[test]
    fn unavailable_transition_clears_values_and_notifies_once() {
        let (service, recorder) = service_with_recorder();
        let attribute = service.add_read_attribute(uuid(1), Scalar::<u16>::new()).unwrap();

        service.availability_did_change(LinkAvailability::Available);
        service.characteristic_value_updated(uuid(1), &[0x20, 0x02]);
        assert_eq!(attribute.value(), Some(0x220));

        service.availability_did_change(LinkAvailability::ConnectionLost);
        assert_eq!(attribute.value(), None);
        assert_eq!(service.availability(), ServiceAvailability::Unavailable);
        assert_eq!(
            recorder.take(),
            vec![
                "availability Available",
                "value Some(\"544\")",
                "availability Unavailable",
                "value None",
            ]
        );

        // Already unavailable: no second availability notification.
        service.availability_did_change(LinkAvailability::Uninitialized);
        assert_eq!(recorder.take(), vec!["value None"]);
    }

    #[test]
    fn identical_values_are_reported_every_time() {
        let (service, recorder) = service_with_recorder();
        service.add_read_attribute(uuid(1), Scalar::<u8>::new()).unwrap();

        service.characteristic_value_updated(uuid(1), &[7]);
        service.characteristic_value_updated(uuid(1), &[7]);
        assert_eq!(recorder.take(), vec!["value Some(\"7\")", "value Some(\"7\")"]);
    }

    #[test]
    fn undecodable_payload_keeps_previous_value() {
        let (service, recorder) = service_with_recorder();
        let attribute = service.add_read_attribute(uuid(1), Scalar::<u32>::new()).unwrap();

        service.characteristic_value_updated(uuid(1), &[1, 0, 0, 0]);
        service.characteristic_value_updated(uuid(1), &[1, 0]);
        assert_eq!(attribute.value(), Some(1));
        assert_eq!(recorder.take(), vec!["value Some(\"1\")"]);
    }

    #[test]
    fn unknown_characteristics_are_ignored() {
        let (service, recorder) = service_with_recorder();
        service.add_read_attribute(uuid(1), Scalar::<u8>::new()).unwrap();
        service.characteristic_value_updated(uuid(99), &[1]);
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn registry_rejects_duplicates_and_late_additions() {
        let service = GattService::new(uuid(0xA), UiDispatcher::inline());
        service.add_read_attribute(uuid(1), Scalar::<u8>::new()).unwrap();
        assert_eq!(
            service.add_read_attribute(uuid(1), Scalar::<u8>::new()).err(),
            Some(GattError::DuplicateAttribute {
                service: uuid(0xA),
                characteristic: uuid(1)
            })
        );

        service.seal();
        assert_eq!(
            service.add_read_attribute(uuid(2), Scalar::<u8>::new()).err(),
            Some(GattError::RegistrySealed(uuid(0xA)))
        );
    }

    #[test]
    fn requested_value_without_value_manager_fails_fast() {
        let service = GattService::new(uuid(0xA), UiDispatcher::inline());
        let attribute = service
            .add_modifiable_attribute(uuid(1), Scalar::<i16>::new(), WriteMode::default())
            .unwrap();

        assert_eq!(
            attribute.set_requested_value(Some(4500)),
            Err(GattError::NoValueManager(uuid(0xA)))
        );
        // Clearing the staged value never needs a manager.
        assert_eq!(attribute.set_requested_value(None), Ok(()));
    }

    #[test]
    fn requested_value_is_encoded_and_forwarded() {
        let service = GattService::new(uuid(0xA), UiDispatcher::inline());
        let requests = Arc::new(Requests::default());
        service.bind_value_manager(requests.clone());
        let attribute = service
            .add_modifiable_attribute(uuid(1), Scalar::<i16>::new(), WriteMode::WithoutResponse)
            .unwrap();

        attribute.set_requested_value(Some(4500)).unwrap();

        assert_eq!(attribute.requested_value(), Some(4500));
        assert_eq!(attribute.value(), None);
        assert_eq!(
            *requests.0.lock().unwrap(),
            vec![WriteRequest {
                service: uuid(0xA),
                characteristic: uuid(1),
                bytes: vec![0x94, 0x11],
                mode: WriteMode::WithoutResponse,
            }]
        );
    }

    #[test]
    fn write_failures_reach_observers_only_for_modifiable_attributes() {
        let (service, recorder) = service_with_recorder();
        let read_only = service.add_read_attribute(uuid(1), Scalar::<u8>::new()).unwrap();
        let modifiable = service
            .add_modifiable_attribute(uuid(2), Scalar::<u8>::new(), WriteMode::WithResponse)
            .unwrap();

        read_only.requested_value_did_fail("boom");
        modifiable.requested_value_did_fail("boom");

        assert_eq!(recorder.take(), vec![format!("failed {} boom", uuid(2))]);
    }
}
