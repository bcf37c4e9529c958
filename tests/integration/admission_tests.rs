//! Scan admission: name matching, the in-flight gate and the
//! primaries-connected stop.

use gattlink::config::ClientConfig;
use gattlink::fsm::Phase;
use gattlink::gatt::{GapEvent, GattStatus};

use crate::mock_transport::*;

#[test]
fn only_exact_names_connect() {
    let mut rig = Rig::demo();
    rig.advertise(ADDR_A, b"DEV");
    rig.advertise(ADDR_A, b"DEV_AB");
    rig.advertise(ADDR_A, b"dev_a");
    rig.advertise(ADDR_A, b"DEV_A\0");
    rig.gap(GapEvent::ScanResult {
        addr: ADDR_A,
        addr_type: gattlink::gatt::AddrType::Public,
        rssi: -40,
        name: None,
    });
    assert_eq!(rig.stack.opens(), 0);
    assert_eq!(rig.client.admission().in_flight(), None);

    rig.advertise(ADDR_A, b"DEV_A");
    assert_eq!(rig.stack.opens(), 1);
}

#[test]
fn second_match_while_in_flight_is_ignored() {
    let mut rig = Rig::demo();
    rig.advertise(ADDR_A, b"DEV_A");
    rig.advertise(ADDR_B, b"DEV_B");
    rig.advertise(ADDR_A, b"DEV_A");

    assert_eq!(rig.stack.opens(), 1);
    assert_eq!(rig.phase(0), Phase::Connecting);
    assert_eq!(rig.phase(1), Phase::Idle);
    assert_eq!(rig.client.admission().in_flight(), Some(0));
    assert!(!rig.client.slot(1).unwrap().is_connected());
}

#[test]
fn connected_slot_ignores_repeat_advertisements() {
    let mut rig = Rig::demo();
    rig.advertise(ADDR_A, b"DEV_A");
    rig.open(0, 4, ADDR_A, GattStatus::OK);
    rig.advertise(ADDR_A, b"DEV_A");
    assert_eq!(rig.stack.opens(), 1);
    assert_eq!(rig.phase(0), Phase::Open);
}

#[test]
fn primaries_connected_stops_scan_once() {
    let mut rig = Rig::demo();
    rig.discover(0, 4, ADDR_A, b"DEV_A");
    rig.discover(1, 5, ADDR_B, b"DEV_B");
    let stops_before = rig.stack.stops();

    rig.advertise(ADDR_C, b"DEV_C");
    assert_eq!(rig.stack.stops(), stops_before + 1);
    assert_eq!(rig.sink.count(|e| *e == Recorded::PrimariesConnected), 1);

    // Further reports, including the non-primary target, change nothing.
    rig.advertise(ADDR_C, b"DEV_C");
    rig.advertise(ADDR_A, b"DEV_A");
    assert_eq!(rig.stack.stops(), stops_before + 1);
    assert_eq!(rig.stack.opens(), 2);
    assert_eq!(rig.phase(2), Phase::Idle);
    assert!(rig.client.admission().stop_requested());
}

#[test]
fn empty_primary_set_keeps_scanning() {
    let mut config = ClientConfig::with_targets(&["DEV_A", "DEV_B"]).unwrap();
    config.primary_slots.clear();
    let mut rig = Rig::started(config);
    rig.discover(0, 4, ADDR_A, b"DEV_A");
    rig.discover(1, 5, ADDR_B, b"DEV_B");
    let stops_before = rig.stack.stops();

    rig.advertise(ADDR_A, b"DEV_A");
    assert_eq!(rig.stack.stops(), stops_before);
    assert_eq!(rig.sink.count(|e| *e == Recorded::PrimariesConnected), 0);
}

#[test]
fn unregistered_slot_is_never_admitted() {
    let mut rig = Rig::unregistered(ClientConfig::with_targets(&["DEV_A", "DEV_B"]).unwrap());
    rig.registered(0, GattStatus(0x85));
    rig.registered(1, GattStatus::OK);
    rig.gap(GapEvent::ScanParamsSet {
        status: GattStatus::OK,
    });

    assert!(rig.sink.contains(&Recorded::RegistrationFailed(0)));
    assert!(!rig.client.slot(0).unwrap().is_registered());
    assert_eq!(rig.stack.count(|c| *c == Call::SetScanParams), 1);

    rig.advertise(ADDR_A, b"DEV_A");
    assert_eq!(rig.stack.opens(), 0);
    rig.advertise(ADDR_B, b"DEV_B");
    assert_eq!(rig.stack.opens(), 1);
}

#[test]
fn rejected_registration_request_fails_the_slot() {
    let mut client =
        gattlink::app::service::CentralClient::new(ClientConfig::default()).unwrap();
    let mut stack = MockTransport::new();
    stack.reject_register.push(1);
    let mut sink = RecordingSink::new();
    client.start(&mut stack, &mut sink);

    assert!(sink.contains(&Recorded::RegistrationFailed(1)));
    assert!(!client.slot(1).unwrap().is_registered());
    assert!(!client.registry().all_resolved());
}

#[test]
fn no_registered_slot_means_no_scan() {
    let mut rig = Rig::unregistered(ClientConfig::with_targets(&["DEV_A"]).unwrap());
    rig.registered(0, GattStatus(0x85));
    assert_eq!(rig.stack.count(|c| *c == Call::SetScanParams), 0);
}
