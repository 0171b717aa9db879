#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use boiler_controller_lib::config::LinkConfig;
use boiler_controller_lib::core::bluetooth::constants::*;
use boiler_controller_lib::core::bluetooth::{
    link, AdapterState, Central, CentralEvent, CentralEventSender, CharacteristicInfo,
    CharacteristicProperties, DiscoveryState, Link, LinkHandle, PeripheralDiscoveryController,
    PeripheralHandle, PeripheralId, ServiceConnectionManager,
};
use boiler_controller_lib::core::controller::BoilerControllerService;
use boiler_controller_lib::core::gatt::{Result, UiDispatcher, WriteMode};
use boiler_controller_lib::presenter::ConsolePresenter;

pub const PERIPHERAL: &str = "C0:FF:EE:00:00:01";
pub const PERIPHERAL_NAME: &str = "Boiler";

/// A request the link made to the platform central.
#[derive(Debug, Clone, PartialEq)]
pub enum CentralCall {
    StartScan(Uuid),
    StopScan,
    Connect(PeripheralId),
    Disconnect(PeripheralId),
    Release(PeripheralId),
    DiscoverServices(Vec<Uuid>),
    DiscoverCharacteristics(Uuid),
    Read(Uuid),
    SetNotify(Uuid, bool),
    Write(Uuid, Vec<u8>, WriteMode),
}

/// Records every call and never answers; tests inject the answers.
#[derive(Default)]
pub struct FakeCentral {
    calls: Mutex<Vec<CentralCall>>,
}

impl FakeCentral {
    pub fn take(&self) -> Vec<CentralCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn push(&self, call: CentralCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Central for FakeCentral {
    fn start_scan(&self, advertised: Uuid) {
        self.push(CentralCall::StartScan(advertised));
    }

    fn stop_scan(&self) {
        self.push(CentralCall::StopScan);
    }

    fn connect(&self, peripheral: &PeripheralId) {
        self.push(CentralCall::Connect(peripheral.clone()));
    }

    fn disconnect(&self, peripheral: &PeripheralId) {
        self.push(CentralCall::Disconnect(peripheral.clone()));
    }

    fn release(&self, peripheral: &PeripheralId) {
        self.push(CentralCall::Release(peripheral.clone()));
    }

    fn discover_services(&self, _: &PeripheralId, services: &[Uuid]) {
        self.push(CentralCall::DiscoverServices(services.to_vec()));
    }

    fn discover_characteristics(&self, _: &PeripheralId, service: Uuid) {
        self.push(CentralCall::DiscoverCharacteristics(service));
    }

    fn read_value(&self, _: &PeripheralId, _: Uuid, characteristic: Uuid) {
        self.push(CentralCall::Read(characteristic));
    }

    fn set_notify_value(&self, _: &PeripheralId, _: Uuid, characteristic: Uuid, enabled: bool) {
        self.push(CentralCall::SetNotify(characteristic, enabled));
    }

    fn write_value(
        &self,
        _: &PeripheralId,
        _: Uuid,
        characteristic: Uuid,
        bytes: Vec<u8>,
        mode: WriteMode,
    ) {
        self.push(CentralCall::Write(characteristic, bytes, mode));
    }
}

/// Console output captured in memory.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn peripheral_id() -> PeripheralId {
    PeripheralId::from(PERIPHERAL)
}

pub fn properties(read: bool, write: bool, notify: bool) -> CharacteristicProperties {
    CharacteristicProperties {
        read,
        write,
        notify,
        ..CharacteristicProperties::default()
    }
}

/// The characteristic table of a well-behaved controller.
pub fn controller_characteristics() -> Vec<CharacteristicInfo> {
    [
        UUID_STATE,
        UUID_TIME_IN_STATE,
        UUID_TIME_HEATED,
        UUID_TIME_TO_GO,
        UUID_ACCEPTED_USER_COMMANDS,
        UUID_WATER_SENSOR,
        UUID_AMBIENT_SENSOR,
        UUID_LOG_ENTRY,
    ]
    .into_iter()
    .map(|uuid| CharacteristicInfo {
        uuid,
        properties: properties(true, false, true),
    })
    .chain([UUID_USER_REQUEST, UUID_TARGET_TEMPERATURE].into_iter().map(|uuid| {
        CharacteristicInfo {
            uuid,
            properties: properties(true, true, true),
        }
    }))
    .collect()
}

/// The real link state machines on top of a [`FakeCentral`], with observers
/// running inline.
pub struct Fixture {
    pub link: Link,
    pub handle: LinkHandle,
    pub events: CentralEventSender,
    pub central: Arc<FakeCentral>,
    pub model: BoilerControllerService,
}

impl Fixture {
    pub fn new() -> Self {
        let dispatcher = UiDispatcher::inline();
        let (handle, events, receiver) = link::channel();
        let central = Arc::new(FakeCentral::default());
        let model =
            BoilerControllerService::new(UUID_BOILER_CONTROLLER_SERVICE, dispatcher.clone())
                .unwrap();
        let services = ServiceConnectionManager::new(
            vec![model.service().clone()],
            central.clone(),
            Arc::new(handle.clone()),
        )
        .unwrap();
        let controller = PeripheralDiscoveryController::new(
            advertised_uuid_for(UUID_BOILER_CONTROLLER_SERVICE),
            central.clone(),
            services,
            dispatcher,
        );

        Self {
            link: Link::new(controller, receiver),
            handle,
            events,
            central,
            model,
        }
    }

    /// Attaches a console presenter writing into the returned buffer.
    pub fn presenter(&self, config: &LinkConfig) -> (Arc<ConsolePresenter>, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let presenter = ConsolePresenter::with_output(
            self.model.clone(),
            self.handle.clone(),
            config,
            Box::new(buffer.clone()),
        );
        presenter.attach(&self.link.controller().observers());
        (presenter, buffer)
    }

    pub fn try_pump(&mut self) -> Result<usize> {
        self.link.process_pending()
    }

    pub fn pump(&mut self) -> usize {
        self.try_pump().unwrap()
    }

    pub fn send(&mut self, event: CentralEvent) {
        assert!(self.events.send(event));
        self.pump();
    }

    pub fn state(&self) -> DiscoveryState {
        self.link.controller().state()
    }

    pub fn power_on(&mut self) {
        self.send(CentralEvent::AdapterStateChanged(AdapterState::PoweredOn));
    }

    pub fn discover(&mut self, id: &str, name: &str) {
        self.send(CentralEvent::PeripheralDiscovered(PeripheralHandle::new(
            PeripheralId::from(id),
            name.to_string(),
        )));
    }

    /// Drives the link up to a connected peripheral with an available service
    /// and forgets the calls made on the way.
    pub fn connect(&mut self) {
        self.power_on();
        self.handle.start_scan();
        self.pump();
        self.discover(PERIPHERAL, PERIPHERAL_NAME);
        self.handle.connect();
        self.pump();
        self.send(CentralEvent::Connected(peripheral_id()));
        self.send(CentralEvent::ServicesDiscovered {
            peripheral: peripheral_id(),
            result: Ok(vec![UUID_BOILER_CONTROLLER_SERVICE]),
        });
        self.send(CentralEvent::CharacteristicsDiscovered {
            peripheral: peripheral_id(),
            service: UUID_BOILER_CONTROLLER_SERVICE,
            result: Ok(controller_characteristics()),
        });
        assert_eq!(self.state(), DiscoveryState::Connected);
        self.central.take();
    }

    pub fn value(&mut self, characteristic: Uuid, bytes: &[u8]) {
        self.send(CentralEvent::ValueUpdated {
            peripheral: peripheral_id(),
            service: UUID_BOILER_CONTROLLER_SERVICE,
            characteristic,
            result: Ok(bytes.to_vec()),
        });
    }

    pub fn write_completed(&mut self, characteristic: Uuid, result: std::result::Result<(), String>) {
        self.send(CentralEvent::WriteCompleted {
            peripheral: peripheral_id(),
            service: UUID_BOILER_CONTROLLER_SERVICE,
            characteristic,
            result,
        });
    }
}
