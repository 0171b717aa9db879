mod common;

use boiler_controller_lib::config::LinkConfig;
use boiler_controller_lib::core::bluetooth::constants::{
    advertised_uuid_for, UUID_BOILER_CONTROLLER_SERVICE, UUID_STATE,
};
use boiler_controller_lib::core::bluetooth::{AdapterState, CentralEvent, DiscoveryState};
use boiler_controller_lib::core::gatt::ServiceAvailability;

use common::{peripheral_id, CentralCall, Fixture, PERIPHERAL, PERIPHERAL_NAME};

fn advertised() -> uuid::Uuid {
    advertised_uuid_for(UUID_BOILER_CONTROLLER_SERVICE)
}

#[test]
fn commands_are_ignored_until_the_adapter_is_on() {
    let mut fixture = Fixture::new();
    assert_eq!(fixture.state(), DiscoveryState::Disabled);

    fixture.handle.start_scan();
    fixture.handle.connect();
    fixture.pump();
    assert_eq!(fixture.state(), DiscoveryState::Disabled);
    assert!(fixture.central.take().is_empty());

    fixture.power_on();
    assert_eq!(fixture.state(), DiscoveryState::Idle);

    // Nothing to stop or connect to yet.
    fixture.handle.stop_scan();
    fixture.handle.connect();
    fixture.pump();
    assert_eq!(fixture.state(), DiscoveryState::Idle);
    assert!(fixture.central.take().is_empty());

    fixture.handle.start_scan();
    fixture.pump();
    assert_eq!(fixture.state(), DiscoveryState::Scanning);
    assert_eq!(fixture.central.take(), vec![CentralCall::StartScan(advertised())]);
}

#[test]
fn first_named_peripheral_stops_the_scan() {
    let mut fixture = Fixture::new();
    fixture.power_on();
    fixture.handle.start_scan();
    fixture.pump();
    fixture.central.take();

    fixture.discover("anonymous", "  ");
    assert_eq!(fixture.state(), DiscoveryState::Scanning);

    fixture.discover(PERIPHERAL, PERIPHERAL_NAME);
    assert_eq!(fixture.state(), DiscoveryState::DiscoveredPeripherals);
    assert_eq!(fixture.central.take(), vec![CentralCall::StopScan]);

    fixture.discover("C0:FF:EE:00:00:02", "Other boiler");
    let peripheral = fixture.link.controller().peripheral().unwrap();
    assert_eq!(peripheral.id, peripheral_id());
    assert_eq!(peripheral.name, PERIPHERAL_NAME);
}

#[test]
fn stopping_an_empty_scan_returns_to_idle() {
    let mut fixture = Fixture::new();
    fixture.power_on();
    fixture.handle.start_scan();
    fixture.handle.stop_scan();
    fixture.pump();

    assert_eq!(fixture.state(), DiscoveryState::Idle);
    assert_eq!(
        fixture.central.take(),
        vec![CentralCall::StartScan(advertised()), CentralCall::StopScan]
    );
}

#[test]
fn connection_hands_the_peripheral_to_service_discovery() {
    let mut fixture = Fixture::new();
    fixture.power_on();
    fixture.handle.start_scan();
    fixture.pump();
    fixture.discover(PERIPHERAL, PERIPHERAL_NAME);
    fixture.handle.connect();
    fixture.pump();
    fixture.central.take();

    fixture.send(CentralEvent::Connected("someone-else".into()));
    assert_eq!(fixture.state(), DiscoveryState::DiscoveredPeripherals);

    fixture.send(CentralEvent::Connected(peripheral_id()));
    assert_eq!(fixture.state(), DiscoveryState::Connected);
    assert_eq!(
        fixture.central.take(),
        vec![CentralCall::DiscoverServices(vec![UUID_BOILER_CONTROLLER_SERVICE])]
    );
    let bound = fixture.link.controller().services().peripheral().unwrap();
    assert_eq!(bound.id, peripheral_id());
}

#[test]
fn service_discovery_reads_and_subscribes() {
    let mut fixture = Fixture::new();
    fixture.connect();
    assert_eq!(
        fixture.model.service().availability(),
        ServiceAvailability::Available
    );

    fixture.value(UUID_STATE, &[0x02]);
    assert!(fixture.model.state.value().is_some());
}

#[test]
fn failed_connection_rescans() {
    let mut fixture = Fixture::new();
    fixture.power_on();
    fixture.handle.start_scan();
    fixture.pump();
    fixture.discover(PERIPHERAL, PERIPHERAL_NAME);
    fixture.handle.connect();
    fixture.pump();
    fixture.central.take();

    fixture.send(CentralEvent::ConnectFailed {
        peripheral: peripheral_id(),
        error: "timeout".to_string(),
    });
    assert_eq!(fixture.state(), DiscoveryState::Scanning);
    assert!(fixture.link.controller().peripheral().is_none());
    assert_eq!(
        fixture.central.take(),
        vec![
            CentralCall::Release(peripheral_id()),
            CentralCall::StartScan(advertised()),
        ]
    );
}

#[test]
fn lost_connection_clears_values_and_rescans() {
    let mut fixture = Fixture::new();
    fixture.connect();
    fixture.value(UUID_STATE, &[0x02]);

    fixture.send(CentralEvent::Disconnected {
        peripheral: peripheral_id(),
        error: Some("connection lost".to_string()),
    });

    assert_eq!(fixture.state(), DiscoveryState::Scanning);
    assert_eq!(
        fixture.model.service().availability(),
        ServiceAvailability::Unavailable
    );
    assert_eq!(fixture.model.state.value(), None);
    assert!(fixture.link.controller().services().peripheral().is_none());
}

#[test]
fn requested_disconnect_waits_for_the_platform() {
    let mut fixture = Fixture::new();
    fixture.connect();

    fixture.handle.disconnect();
    fixture.pump();
    assert_eq!(fixture.central.take(), vec![CentralCall::Disconnect(peripheral_id())]);
    assert_eq!(fixture.state(), DiscoveryState::Connected);

    fixture.send(CentralEvent::Disconnected {
        peripheral: peripheral_id(),
        error: None,
    });
    assert_eq!(fixture.state(), DiscoveryState::Scanning);
}

#[test]
fn adapter_power_loss_disables_discovery() {
    let mut fixture = Fixture::new();
    fixture.connect();
    fixture.value(UUID_STATE, &[0x02]);

    fixture.send(CentralEvent::AdapterStateChanged(AdapterState::PoweredOff));
    assert_eq!(fixture.state(), DiscoveryState::Disabled);
    assert_eq!(
        fixture.model.service().availability(),
        ServiceAvailability::Unavailable
    );
    assert_eq!(fixture.model.state.value(), None);

    fixture.send(CentralEvent::AdapterStateChanged(AdapterState::Unauthorized));
    assert_eq!(fixture.state(), DiscoveryState::Disabled);

    fixture.power_on();
    assert_eq!(fixture.state(), DiscoveryState::Idle);
}

#[test]
fn adapter_loss_stops_a_running_scan() {
    let mut fixture = Fixture::new();
    fixture.power_on();
    fixture.handle.start_scan();
    fixture.pump();
    fixture.central.take();

    fixture.send(CentralEvent::AdapterStateChanged(AdapterState::Unknown));
    assert_eq!(fixture.state(), DiscoveryState::Disabled);
    assert_eq!(fixture.central.take(), vec![CentralCall::StopScan]);
}

#[test]
fn adapter_loss_closes_the_connection() {
    let mut fixture = Fixture::new();
    fixture.connect();

    fixture.send(CentralEvent::AdapterStateChanged(AdapterState::PoweredOff));
    assert_eq!(fixture.central.take(), vec![CentralCall::Disconnect(peripheral_id())]);
    assert!(fixture.link.controller().peripheral().is_none());
}

#[test]
fn adapter_loss_forgets_an_unconnected_peripheral() {
    let mut fixture = Fixture::new();
    fixture.power_on();
    fixture.handle.start_scan();
    fixture.pump();
    fixture.discover(PERIPHERAL, PERIPHERAL_NAME);
    fixture.central.take();

    fixture.send(CentralEvent::AdapterStateChanged(AdapterState::Resetting));
    assert_eq!(fixture.state(), DiscoveryState::Disabled);
    assert_eq!(fixture.central.take(), vec![CentralCall::Release(peripheral_id())]);
}

#[test]
fn presenter_scans_and_connects_automatically() {
    let mut fixture = Fixture::new();
    let (_presenter, output) = fixture.presenter(&LinkConfig::default());

    fixture.power_on();
    assert_eq!(fixture.state(), DiscoveryState::Scanning);

    fixture.discover(PERIPHERAL, PERIPHERAL_NAME);
    assert_eq!(
        fixture.central.take(),
        vec![
            CentralCall::StartScan(advertised()),
            CentralCall::StopScan,
            CentralCall::Connect(peripheral_id()),
        ]
    );

    let output = output.contents();
    assert!(output.contains("discovery: idle"));
    assert!(output.contains("discovery: peripheral discovered"));
}

#[test]
fn presenter_leaves_manual_mode_alone() {
    let mut fixture = Fixture::new();
    let config = LinkConfig {
        auto_scan: false,
        auto_connect: false,
        ..LinkConfig::default()
    };
    let (_presenter, _output) = fixture.presenter(&config);

    fixture.power_on();
    assert_eq!(fixture.state(), DiscoveryState::Idle);
    assert!(fixture.central.take().is_empty());
}

#[test]
fn stop_holds_with_auto_scan_enabled() {
    let mut fixture = Fixture::new();
    let (_presenter, _output) = fixture.presenter(&LinkConfig::default());
    fixture.power_on();
    assert_eq!(fixture.state(), DiscoveryState::Scanning);

    fixture.handle.stop_scan();
    fixture.pump();
    assert_eq!(fixture.state(), DiscoveryState::Idle);
    assert_eq!(
        fixture.central.take(),
        vec![CentralCall::StartScan(advertised()), CentralCall::StopScan]
    );

    // Power cycling the adapter brings auto-scan back.
    fixture.send(CentralEvent::AdapterStateChanged(AdapterState::PoweredOff));
    fixture.power_on();
    assert_eq!(fixture.state(), DiscoveryState::Scanning);
}
