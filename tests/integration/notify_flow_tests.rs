//! Notify-path discovery: subscription, CCCD write and probe write.

use gattlink::app::events::DiscoveryFailure;
use gattlink::config::{ClientConfig, DiscoveryMode};
use gattlink::error::Error;
use gattlink::fsm::Phase;
use gattlink::fsm::states::SCRATCH_CAPACITY;
use gattlink::gatt::{AttrKind, BtUuid, GattStatus, GattcEvent, props};

use crate::mock_transport::*;

fn notify_rig() -> Rig {
    let mut config = ClientConfig::with_targets(&["DEV_A", "DEV_B", "DEV_C"]).unwrap();
    config.discovery_mode = DiscoveryMode::Notify;
    Rig::started(config)
}

fn registered_for_notify(rig: &mut Rig, status: GattStatus) {
    rig.gattc(
        Some(iface(0)),
        GattcEvent::RegisteredForNotify {
            status,
            handle: CHAR_HANDLE,
        },
    );
}

#[test]
fn notify_path_enables_notifications_and_writes_probe() {
    let mut rig = notify_rig();
    rig.discover(0, 4, ADDR_A, b"DEV_A");
    assert_eq!(rig.phase(0), Phase::NotifySubscribing);
    assert!(rig.stack.calls.contains(&Call::RegisterForNotify {
        gattc_if: iface(0),
        addr: ADDR_A,
        handle: CHAR_HANDLE,
    }));
    assert_eq!(rig.stack.count(|c| matches!(c, Call::ReadChar { .. })), 0);

    registered_for_notify(&mut rig, GattStatus::OK);
    assert_eq!(rig.phase(0), Phase::DescriptorResolved);
    assert!(rig.stack.calls.contains(&Call::AttrCount {
        kind: AttrKind::Descriptor,
        range: SERVICE_RANGE,
        char_handle: CHAR_HANDLE,
    }));
    assert!(rig.stack.calls.contains(&Call::DescrsByCharHandle {
        char_handle: CHAR_HANDLE,
        uuid: BtUuid::CCCD,
    }));
    assert!(rig.stack.calls.contains(&Call::WriteDescr {
        handle: CCCD_HANDLE,
        value: vec![0x01, 0x00],
    }));

    rig.gattc(
        Some(iface(0)),
        GattcEvent::WriteDescr {
            status: GattStatus::OK,
            conn_id: 4,
            handle: CCCD_HANDLE,
        },
    );
    assert_eq!(rig.phase(0), Phase::NotifyEnabled);
    assert!(rig.stack.calls.contains(&Call::WriteChar {
        handle: CHAR_HANDLE,
        value: (0..35).collect(),
    }));

    rig.gattc(
        Some(iface(0)),
        GattcEvent::WriteChar {
            status: GattStatus::OK,
            conn_id: 4,
            handle: CHAR_HANDLE,
        },
    );
    assert!(rig.sink.contains(&Recorded::WriteComplete(0, GattStatus::OK)));
    assert_eq!(rig.phase(0), Phase::NotifyEnabled);
}

#[test]
fn notifications_are_forwarded_without_a_phase_change() {
    let mut rig = notify_rig();
    rig.discover(0, 4, ADDR_A, b"DEV_A");
    registered_for_notify(&mut rig, GattStatus::OK);
    rig.gattc(
        Some(iface(0)),
        GattcEvent::WriteDescr {
            status: GattStatus::OK,
            conn_id: 4,
            handle: CCCD_HANDLE,
        },
    );
    let phase_events = rig.sink.count(|e| matches!(e, Recorded::Phase { .. }));

    for value in [&[1u8, 2][..], &[3u8][..]] {
        rig.gattc(
            Some(iface(0)),
            GattcEvent::Notify {
                conn_id: 4,
                addr: ADDR_A,
                handle: CHAR_HANDLE,
                value,
                is_notify: true,
            },
        );
    }

    assert!(rig.sink.contains(&Recorded::Notification {
        slot: 0,
        value: vec![1, 2],
    }));
    assert!(rig.sink.contains(&Recorded::Notification {
        slot: 0,
        value: vec![3],
    }));
    assert_eq!(
        rig.sink.count(|e| matches!(e, Recorded::Phase { .. })),
        phase_events
    );
    assert_eq!(rig.phase(0), Phase::NotifyEnabled);
}

#[test]
fn notification_for_another_connection_is_dropped() {
    let mut rig = notify_rig();
    rig.discover(0, 4, ADDR_A, b"DEV_A");
    rig.gattc(
        Some(iface(0)),
        GattcEvent::Notify {
            conn_id: 9,
            addr: ADDR_B,
            handle: CHAR_HANDLE,
            value: &[7],
            is_notify: true,
        },
    );
    assert_eq!(
        rig.sink.count(|e| matches!(e, Recorded::Notification { .. })),
        0
    );
}

#[test]
fn notify_mode_requires_notify_or_indicate() {
    let mut rig = notify_rig();
    rig.stack.chars[0].properties = props::READ;
    rig.discover(0, 4, ADDR_A, b"DEV_A");
    assert_eq!(rig.phase(0), Phase::CharacteristicResolved);
    assert_eq!(
        rig.stack.count(|c| matches!(c, Call::RegisterForNotify { .. })),
        0
    );

    let mut rig = notify_rig();
    rig.stack.chars[0].properties = props::INDICATE;
    rig.discover(0, 4, ADDR_A, b"DEV_A");
    assert_eq!(rig.phase(0), Phase::NotifySubscribing);
}

#[test]
fn missing_cccd_stops_before_write() {
    let mut rig = notify_rig();
    rig.stack.descr_count = 0;
    rig.discover(0, 4, ADDR_A, b"DEV_A");
    registered_for_notify(&mut rig, GattStatus::OK);

    assert_eq!(rig.phase(0), Phase::NotifySubscribing);
    assert!(rig
        .sink
        .contains(&Recorded::DiscoveryFailed(0, DiscoveryFailure::NoDescriptor)));
    assert_eq!(rig.stack.count(|c| matches!(c, Call::WriteDescr { .. })), 0);
}

#[test]
fn failed_subscription_does_not_query_descriptors() {
    let mut rig = notify_rig();
    rig.discover(0, 4, ADDR_A, b"DEV_A");
    rig.stack.clear();
    registered_for_notify(&mut rig, GattStatus(0x80));

    assert_eq!(rig.phase(0), Phase::NotifySubscribing);
    assert_eq!(rig.stack.count(Call::is_discovery), 0);
}

#[test]
fn failed_cccd_write_skips_probe() {
    let mut rig = notify_rig();
    rig.discover(0, 4, ADDR_A, b"DEV_A");
    registered_for_notify(&mut rig, GattStatus::OK);
    rig.gattc(
        Some(iface(0)),
        GattcEvent::WriteDescr {
            status: GattStatus(0x05),
            conn_id: 4,
            handle: CCCD_HANDLE,
        },
    );
    assert_eq!(rig.phase(0), Phase::DescriptorResolved);
    assert_eq!(rig.stack.count(|c| matches!(c, Call::WriteChar { .. })), 0);
}

#[test]
fn oversized_descriptor_list_is_skipped() {
    let mut rig = notify_rig();
    rig.stack.descr_count = SCRATCH_CAPACITY as u16 + 1;
    rig.discover(0, 4, ADDR_A, b"DEV_A");
    registered_for_notify(&mut rig, GattStatus::OK);

    assert_eq!(rig.phase(0), Phase::NotifySubscribing);
    assert!(rig.sink.contains(&Recorded::DiscoveryFailed(
        0,
        DiscoveryFailure::Rejected(Error::ScratchExhausted {
            needed: 17,
            capacity: 16,
        })
    )));
    assert_eq!(
        rig.stack.count(|c| matches!(c, Call::DescrsByCharHandle { .. })),
        0
    );
    assert_eq!(rig.stack.count(|c| matches!(c, Call::WriteDescr { .. })), 0);
}
