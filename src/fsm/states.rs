//! Concrete phase handlers and the table builder.
//!
//! Every phase is a pair of plain `fn` pointers; no closures, no heap.
//!
//! ```text
//!  IDLE ──[name match]──▶ CONNECTING ──[open ok]──▶ OPEN ──[mtu]──▶ MTU_CONFIGURED
//!    ▲                        │                                         │
//!    │                  [open failed]                            [search complete]
//!    │                        │                                         ▼
//!    ◀────────────────────────┘                               SERVICE_DISCOVERED
//!    │                                                                  │
//!    │                                                          [char resolved]
//!    │                                                                  ▼
//!    │              ┌─────────[read mode]──────── CHARACTERISTIC_RESOLVED
//!    │              ▼                                                   │
//!    │        READ_PENDING ──[read ok]──▶ READ_COMPLETE         [notify mode]
//!    │                                                                  ▼
//!    │                                                       NOTIFY_SUBSCRIBING
//!    │                                                                  │
//!    │                                    NOTIFY_ENABLED ◀── DESCRIPTOR_RESOLVED
//!    │
//!  Any phase ──[disconnect from the slot's peer]──▶ IDLE
//! ```

use heapless::Vec;
use log::{error, info, warn};

use super::{Phase, PhaseDescriptor, SlotContext};
use crate::app::events::{ClientEvent, DiscoveryFailure};
use crate::app::ports::{EventSink, GattcPort};
use crate::config::DiscoveryMode;
use crate::error::Error;
use crate::gatt::{
    Addr, AttrKind, BtUuid, CharElem, ConnId, DescrElem, GattIf, GattcEvent, Hex, NOTIFY_ENABLE,
    ServiceSource, props,
};
use crate::registry::Slot;

/// Largest characteristic / descriptor list a handler will fetch.
pub const SCRATCH_CAPACITY: usize = 16;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the shared phase table.  Called once per [`SlotMachine`](super::SlotMachine).
pub fn build_phase_table() -> [PhaseDescriptor; Phase::COUNT] {
    [
        PhaseDescriptor {
            phase: Phase::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_event: idle_event,
        },
        PhaseDescriptor {
            phase: Phase::Connecting,
            name: "Connecting",
            on_enter: None,
            on_event: connecting_event,
        },
        PhaseDescriptor {
            phase: Phase::Open,
            name: "Open",
            on_enter: None,
            on_event: open_event,
        },
        PhaseDescriptor {
            phase: Phase::MtuConfigured,
            name: "MtuConfigured",
            on_enter: None,
            on_event: mtu_configured_event,
        },
        PhaseDescriptor {
            phase: Phase::ServiceDiscovered,
            name: "ServiceDiscovered",
            on_enter: Some(service_discovered_enter),
            on_event: ignore,
        },
        PhaseDescriptor {
            phase: Phase::CharacteristicResolved,
            name: "CharacteristicResolved",
            on_enter: Some(characteristic_resolved_enter),
            on_event: ignore,
        },
        PhaseDescriptor {
            phase: Phase::ReadPending,
            name: "ReadPending",
            on_enter: None,
            on_event: read_pending_event,
        },
        PhaseDescriptor {
            phase: Phase::ReadComplete,
            name: "ReadComplete",
            on_enter: None,
            on_event: ignore,
        },
        PhaseDescriptor {
            phase: Phase::NotifySubscribing,
            name: "NotifySubscribing",
            on_enter: None,
            on_event: notify_subscribing_event,
        },
        PhaseDescriptor {
            phase: Phase::DescriptorResolved,
            name: "DescriptorResolved",
            on_enter: None,
            on_event: descriptor_resolved_event,
        },
        PhaseDescriptor {
            phase: Phase::NotifyEnabled,
            name: "NotifyEnabled",
            on_enter: None,
            on_event: notify_enabled_event,
        },
    ]
}

fn ignore(_slot: &mut Slot, _event: &GattcEvent<'_>, _ctx: &mut SlotContext<'_>) -> Option<Phase> {
    None
}

/// Interface and connection id of a live slot.
fn link(slot: &Slot) -> Option<(GattIf, ConnId)> {
    let link = slot.gattc_if().zip(slot.conn_id());
    if link.is_none() {
        error!("slot {}: no live connection in {}", slot.index(), slot.phase());
    }
    link
}

fn fail(slot: &Slot, ctx: &mut SlotContext<'_>, reason: DiscoveryFailure) {
    warn!("slot {} ({}): {} in {}", slot.index(), slot.name(), reason, slot.phase());
    ctx.sink.emit(&ClientEvent::DiscoveryFailed {
        slot: slot.index(),
        reason,
    });
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(slot: &mut Slot, ctx: &mut SlotContext<'_>) -> Option<Phase> {
    ctx.admission.release(slot.index());
    slot.reset();
    None
}

/// An open that completes after the slot gave up on it (watchdog) leaves a
/// link nothing tracks; close it so the peer can advertise again.
fn idle_event(slot: &mut Slot, event: &GattcEvent<'_>, ctx: &mut SlotContext<'_>) -> Option<Phase> {
    let GattcEvent::Open {
        status,
        conn_id,
        addr,
        ..
    } = *event
    else {
        return None;
    };
    if !status.is_ok() {
        return None;
    }
    let gattc_if = slot.gattc_if()?;
    warn!(
        "slot {}: late open conn_id={} peer={}, closing",
        slot.index(),
        conn_id,
        Addr(&addr)
    );
    if let Err(e) = ctx.transport.close(gattc_if, conn_id) {
        warn!("slot {}: close rejected: {}", slot.index(), e);
    }
    ctx.sink.emit(&ClientEvent::StaleLinkClosed {
        slot: slot.index(),
        conn_id,
        addr,
    });
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTING — waiting for the open result
// ═══════════════════════════════════════════════════════════════════════════

fn connecting_event(
    slot: &mut Slot,
    event: &GattcEvent<'_>,
    ctx: &mut SlotContext<'_>,
) -> Option<Phase> {
    let GattcEvent::Open {
        status,
        conn_id,
        addr,
        mtu,
    } = *event
    else {
        return None;
    };

    if !status.is_ok() {
        warn!("slot {}: open failed, status {}", slot.index(), status);
        ctx.sink.emit(&ClientEvent::ConnectFailed {
            slot: slot.index(),
            status: Some(status),
        });
        ctx.restart_scan();
        return Some(Phase::Idle);
    }

    slot.record_open(conn_id, addr);
    ctx.admission.release(slot.index());
    info!(
        "slot {}: open conn_id={} peer={} mtu={}",
        slot.index(),
        conn_id,
        Addr(&addr),
        mtu
    );
    ctx.sink.emit(&ClientEvent::Connected {
        slot: slot.index(),
        conn_id,
        addr,
    });

    if let Some(gattc_if) = slot.gattc_if() {
        if let Err(e) = ctx.transport.send_mtu_req(gattc_if, conn_id) {
            warn!("slot {}: MTU request rejected: {}", slot.index(), e);
        }
    }
    Some(Phase::Open)
}

// ═══════════════════════════════════════════════════════════════════════════
//  OPEN — waiting for the MTU exchange
// ═══════════════════════════════════════════════════════════════════════════

fn open_event(slot: &mut Slot, event: &GattcEvent<'_>, ctx: &mut SlotContext<'_>) -> Option<Phase> {
    let GattcEvent::MtuConfigured { status, mtu, .. } = *event else {
        return None;
    };

    // Discovery works with the default MTU as well.
    if status.is_ok() {
        info!("slot {}: MTU {}", slot.index(), mtu);
    } else {
        warn!("slot {}: MTU exchange failed, status {}", slot.index(), status);
    }

    let (gattc_if, conn_id) = link(slot)?;
    if let Err(e) = ctx
        .transport
        .search_service(gattc_if, conn_id, &ctx.config.service_uuid)
    {
        fail(slot, ctx, DiscoveryFailure::Rejected(e));
    }
    Some(Phase::MtuConfigured)
}

// ═══════════════════════════════════════════════════════════════════════════
//  MTU_CONFIGURED — collecting service search results
// ═══════════════════════════════════════════════════════════════════════════

fn mtu_configured_event(
    slot: &mut Slot,
    event: &GattcEvent<'_>,
    ctx: &mut SlotContext<'_>,
) -> Option<Phase> {
    match *event {
        GattcEvent::SearchResult {
            uuid,
            range,
            is_primary,
            ..
        } => {
            if uuid == ctx.config.service_uuid && range.is_valid() {
                info!(
                    "slot {}: service {} at 0x{:04x}..0x{:04x}{}",
                    slot.index(),
                    uuid,
                    range.start,
                    range.end,
                    if is_primary { " (primary)" } else { "" }
                );
                slot.record_service(range);
            }
            None
        }
        GattcEvent::SearchComplete { status, source, .. } => {
            if !status.is_ok() {
                fail(slot, ctx, DiscoveryFailure::SearchFailed(status));
                return None;
            }
            match source {
                ServiceSource::RemoteDevice => info!("slot {}: services from remote", slot.index()),
                ServiceSource::Cache => info!("slot {}: services from cache", slot.index()),
                ServiceSource::Unknown => {}
            }
            if !slot.service_found() {
                fail(slot, ctx, DiscoveryFailure::ServiceNotFound);
                return None;
            }
            Some(Phase::ServiceDiscovered)
        }
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  SERVICE_DISCOVERED — synchronous characteristic lookup
// ═══════════════════════════════════════════════════════════════════════════

fn service_discovered_enter(slot: &mut Slot, ctx: &mut SlotContext<'_>) -> Option<Phase> {
    let (gattc_if, conn_id) = link(slot)?;
    let range = slot.service_range()?;

    let count = match ctx.transport.attr_count(
        gattc_if,
        conn_id,
        AttrKind::Characteristic,
        range,
        crate::gatt::INVALID_HANDLE,
    ) {
        Ok(n) => n,
        Err(e) => {
            fail(slot, ctx, DiscoveryFailure::Rejected(e));
            return None;
        }
    };
    if count == 0 {
        fail(slot, ctx, DiscoveryFailure::NoCharacteristic);
        return None;
    }

    let mut scratch: Vec<CharElem, SCRATCH_CAPACITY> = Vec::new();
    if scratch.resize_default(usize::from(count)).is_err() {
        let e = Error::ScratchExhausted {
            needed: count,
            capacity: SCRATCH_CAPACITY,
        };
        fail(slot, ctx, DiscoveryFailure::Rejected(e));
        return None;
    }

    let found = match ctx.transport.chars_by_uuid(
        gattc_if,
        conn_id,
        range,
        &ctx.config.char_uuid,
        &mut scratch,
    ) {
        Ok(n) => n,
        Err(e) => {
            fail(slot, ctx, DiscoveryFailure::Rejected(e));
            return None;
        }
    };
    scratch.truncate(found);

    // Only the first match is used: one characteristic of interest per service.
    let Some(first) = scratch.first() else {
        fail(slot, ctx, DiscoveryFailure::NoCharacteristic);
        return None;
    };
    info!(
        "slot {}: characteristic {} handle 0x{:04x} props 0x{:02x}",
        slot.index(),
        first.uuid,
        first.handle,
        first.properties
    );
    slot.record_char(first.handle, first.properties);
    Some(Phase::CharacteristicResolved)
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHARACTERISTIC_RESOLVED — branch into the read or notify path
// ═══════════════════════════════════════════════════════════════════════════

fn characteristic_resolved_enter(slot: &mut Slot, ctx: &mut SlotContext<'_>) -> Option<Phase> {
    let (gattc_if, conn_id) = link(slot)?;
    let handle = slot.char_handle()?;
    let properties = slot.char_properties();

    match ctx.config.discovery_mode {
        DiscoveryMode::Read => {
            if properties & props::READ == 0 {
                fail(slot, ctx, DiscoveryFailure::MissingProperty(properties));
                return None;
            }
            match ctx.transport.read_char(gattc_if, conn_id, handle) {
                Ok(()) => Some(Phase::ReadPending),
                Err(e) => {
                    fail(slot, ctx, DiscoveryFailure::Rejected(e));
                    None
                }
            }
        }
        DiscoveryMode::Notify => {
            if properties & (props::NOTIFY | props::INDICATE) == 0 {
                fail(slot, ctx, DiscoveryFailure::MissingProperty(properties));
                return None;
            }
            let addr = slot.remote_addr()?;
            match ctx.transport.register_for_notify(gattc_if, addr, handle) {
                Ok(()) => Some(Phase::NotifySubscribing),
                Err(e) => {
                    fail(slot, ctx, DiscoveryFailure::Rejected(e));
                    None
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  READ_PENDING
// ═══════════════════════════════════════════════════════════════════════════

fn read_pending_event(
    slot: &mut Slot,
    event: &GattcEvent<'_>,
    ctx: &mut SlotContext<'_>,
) -> Option<Phase> {
    let GattcEvent::ReadChar {
        status,
        handle,
        value,
        ..
    } = *event
    else {
        return None;
    };

    if !status.is_ok() {
        fail(slot, ctx, DiscoveryFailure::Rejected(Error::Status(status)));
        return None;
    }

    info!(
        "slot {}: read {} bytes from 0x{:04x}: {}",
        slot.index(),
        value.len(),
        handle,
        Hex(value)
    );
    ctx.sink.emit(&ClientEvent::ReadValue {
        slot: slot.index(),
        handle,
        value,
    });
    ctx.restart_scan();
    Some(Phase::ReadComplete)
}

// ═══════════════════════════════════════════════════════════════════════════
//  NOTIFY_SUBSCRIBING — resolve the CCCD and enable notifications
// ═══════════════════════════════════════════════════════════════════════════

fn notify_subscribing_event(
    slot: &mut Slot,
    event: &GattcEvent<'_>,
    ctx: &mut SlotContext<'_>,
) -> Option<Phase> {
    let GattcEvent::RegisteredForNotify { status, .. } = *event else {
        return None;
    };
    if !status.is_ok() {
        fail(slot, ctx, DiscoveryFailure::Rejected(Error::Status(status)));
        return None;
    }

    let (gattc_if, conn_id) = link(slot)?;
    let char_handle = slot.char_handle()?;
    let range = slot.service_range()?;

    let count = match ctx
        .transport
        .attr_count(gattc_if, conn_id, AttrKind::Descriptor, range, char_handle)
    {
        Ok(n) => n,
        Err(e) => {
            fail(slot, ctx, DiscoveryFailure::Rejected(e));
            return None;
        }
    };
    if count == 0 {
        fail(slot, ctx, DiscoveryFailure::NoDescriptor);
        return None;
    }

    let mut scratch: Vec<DescrElem, SCRATCH_CAPACITY> = Vec::new();
    if scratch.resize_default(usize::from(count)).is_err() {
        let e = Error::ScratchExhausted {
            needed: count,
            capacity: SCRATCH_CAPACITY,
        };
        fail(slot, ctx, DiscoveryFailure::Rejected(e));
        return None;
    }

    let found = match ctx.transport.descrs_by_char_handle(
        gattc_if,
        conn_id,
        char_handle,
        &BtUuid::CCCD,
        &mut scratch,
    ) {
        Ok(n) => n,
        Err(e) => {
            fail(slot, ctx, DiscoveryFailure::Rejected(e));
            return None;
        }
    };
    scratch.truncate(found);

    let cccd = match scratch.first() {
        Some(d) if d.uuid == BtUuid::CCCD => *d,
        _ => {
            fail(slot, ctx, DiscoveryFailure::NoDescriptor);
            return None;
        }
    };

    match ctx
        .transport
        .write_descr(gattc_if, conn_id, cccd.handle, &NOTIFY_ENABLE)
    {
        Ok(()) => Some(Phase::DescriptorResolved),
        Err(e) => {
            fail(slot, ctx, DiscoveryFailure::Rejected(e));
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DESCRIPTOR_RESOLVED — CCCD write in flight
// ═══════════════════════════════════════════════════════════════════════════

fn descriptor_resolved_event(
    slot: &mut Slot,
    event: &GattcEvent<'_>,
    ctx: &mut SlotContext<'_>,
) -> Option<Phase> {
    let GattcEvent::WriteDescr { status, .. } = *event else {
        return None;
    };
    if !status.is_ok() {
        fail(slot, ctx, DiscoveryFailure::Rejected(Error::Status(status)));
        return None;
    }
    info!("slot {}: notifications enabled", slot.index());

    let (gattc_if, conn_id) = link(slot)?;
    let handle = slot.char_handle()?;
    let payload = ctx.config.probe_payload();
    match ctx.transport.write_char(gattc_if, conn_id, handle, &payload) {
        Ok(()) => Some(Phase::NotifyEnabled),
        Err(e) => {
            fail(slot, ctx, DiscoveryFailure::Rejected(e));
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  NOTIFY_ENABLED
// ═══════════════════════════════════════════════════════════════════════════

fn notify_enabled_event(
    slot: &mut Slot,
    event: &GattcEvent<'_>,
    ctx: &mut SlotContext<'_>,
) -> Option<Phase> {
    if let GattcEvent::WriteChar { status, handle, .. } = *event {
        if status.is_ok() {
            info!("slot {}: characteristic write done", slot.index());
        } else {
            warn!("slot {}: characteristic write failed, status {}", slot.index(), status);
        }
        ctx.sink.emit(&ClientEvent::WriteComplete {
            slot: slot.index(),
            handle,
            status,
        });
    }
    None
}
