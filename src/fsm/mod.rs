//! Per-slot discovery state machine.
//!
//! Same table-driven engine as a classic embedded FSM, but the table is
//! shared by every slot and the "current state" lives in the [`Slot`]
//! itself:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  PhaseTable                                                   │
//! │  ┌────────────────────────┬────────────────┬────────────────┐ │
//! │  │ Phase                  │ on_enter       │ on_event       │ │
//! │  ├────────────────────────┼────────────────┼────────────────┤ │
//! │  │ Idle                   │ reset slot     │ —              │ │
//! │  │ Connecting             │ —              │ open result    │ │
//! │  │ Open                   │ —              │ MTU result     │ │
//! │  │ MtuConfigured          │ —              │ search events  │ │
//! │  │ ServiceDiscovered      │ fetch chars    │ —              │ │
//! │  │ CharacteristicResolved │ read / notify  │ —              │ │
//! │  │ ReadPending            │ —              │ read result    │ │
//! │  │ ...                    │                │                │ │
//! │  └────────────────────────┴────────────────┴────────────────┘ │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! An event is first offered to the phase-independent edges (disconnect,
//! notification delivery), then to the current phase's `on_event`.  If
//! that returns `Some(next)` the engine moves the slot and runs
//! `next.on_enter`, which may itself chain into a further phase when the
//! step it performs is synchronous (characteristic lookup, for example).

pub mod states;

use log::{debug, info, warn};

use crate::admission::AdmissionState;
use crate::app::events::ClientEvent;
use crate::app::ports::{EventSink, GattcPort, Transport};
use crate::config::ClientConfig;
use crate::gatt::{Addr, AddrType, BdAddr, GattcEvent};
use crate::registry::Slot;

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// Discovery phase of one slot.  Ordered: later phases compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    Connecting = 1,
    Open = 2,
    MtuConfigured = 3,
    ServiceDiscovered = 4,
    CharacteristicResolved = 5,
    ReadPending = 6,
    ReadComplete = 7,
    NotifySubscribing = 8,
    DescriptorResolved = 9,
    NotifyEnabled = 10,
}

impl Phase {
    /// Number of phases — sizes the table.
    pub const COUNT: usize = 11;

    pub const ALL: [Phase; Self::COUNT] = [
        Self::Idle,
        Self::Connecting,
        Self::Open,
        Self::MtuConfigured,
        Self::ServiceDiscovered,
        Self::CharacteristicResolved,
        Self::ReadPending,
        Self::ReadComplete,
        Self::NotifySubscribing,
        Self::DescriptorResolved,
        Self::NotifyEnabled,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting",
            Self::Open => "Open",
            Self::MtuConfigured => "MtuConfigured",
            Self::ServiceDiscovered => "ServiceDiscovered",
            Self::CharacteristicResolved => "CharacteristicResolved",
            Self::ReadPending => "ReadPending",
            Self::ReadComplete => "ReadComplete",
            Self::NotifySubscribing => "NotifySubscribing",
            Self::DescriptorResolved => "DescriptorResolved",
            Self::NotifyEnabled => "NotifyEnabled",
        }
    }

    /// Successful end of a discovery path.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ReadComplete | Self::NotifyEnabled)
    }

    /// Waiting on the peer or the stack.  The watchdog only fires here.
    pub fn is_in_progress(self) -> bool {
        self != Self::Idle && !self.is_terminal()
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Handler context
// ---------------------------------------------------------------------------

/// Everything a phase handler may touch besides its own slot.
pub struct SlotContext<'a> {
    pub config: &'a ClientConfig,
    pub admission: &'a mut AdmissionState,
    pub transport: &'a mut dyn Transport,
    pub sink: &'a mut dyn EventSink,
}

impl SlotContext<'_> {
    /// Start a fresh scan window so the remaining peripherals can be found.
    pub fn restart_scan(&mut self) {
        let secs = self.config.scan_duration_secs;
        self.admission.restart_scan(&mut *self.transport, secs);
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Runs once when a slot enters the phase.  May request an immediate
/// follow-up transition.
pub type PhaseEnterFn = fn(&mut Slot, &mut SlotContext<'_>) -> Option<Phase>;

/// Handles one routed event.  `Some(next)` moves the slot.
pub type PhaseEventFn = fn(&mut Slot, &GattcEvent<'_>, &mut SlotContext<'_>) -> Option<Phase>;

/// One row of the phase table.
pub struct PhaseDescriptor {
    pub phase: Phase,
    pub name: &'static str,
    pub on_enter: Option<PhaseEnterFn>,
    pub on_event: PhaseEventFn,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SlotMachine {
    table: [PhaseDescriptor; Phase::COUNT],
}

impl Default for SlotMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotMachine {
    pub fn new() -> Self {
        Self {
            table: states::build_phase_table(),
        }
    }

    /// Feed one routed GATT-client event to `slot`.
    pub fn handle(&self, slot: &mut Slot, event: &GattcEvent<'_>, ctx: &mut SlotContext<'_>) {
        match *event {
            GattcEvent::Disconnected { addr, reason, .. } => {
                if slot.remote_addr() == Some(addr) {
                    info!(
                        "slot {}: disconnected from {}, reason 0x{:x}",
                        slot.index(),
                        Addr(&addr),
                        reason
                    );
                    ctx.sink.emit(&ClientEvent::Disconnected {
                        slot: slot.index(),
                        addr,
                        reason,
                    });
                    self.transition(slot, Phase::Idle, ctx);
                }
                return;
            }
            GattcEvent::Notify {
                conn_id,
                handle,
                value,
                is_notify,
                ..
            } => {
                if slot.conn_id() == Some(conn_id) {
                    ctx.sink.emit(&ClientEvent::Notification {
                        slot: slot.index(),
                        handle,
                        value,
                        is_notify,
                    });
                }
                return;
            }
            GattcEvent::Connected { conn_id, addr } => {
                debug!(
                    "slot {}: link up conn_id={} peer={}",
                    slot.index(),
                    conn_id,
                    Addr(&addr)
                );
                return;
            }
            GattcEvent::ServiceDiscoveryComplete { status, conn_id } => {
                debug!(
                    "slot {}: service discovery complete conn_id={} status={}",
                    slot.index(),
                    conn_id,
                    status
                );
                return;
            }
            GattcEvent::ServiceChanged { addr } => {
                info!("slot {}: service changed on {}", slot.index(), Addr(&addr));
                return;
            }
            GattcEvent::Registered { .. } => return,
            _ => {}
        }

        let next = (self.table[slot.phase() as usize].on_event)(slot, event, ctx);
        if let Some(next) = next {
            self.transition(slot, next, ctx);
        }
    }

    /// Idle → Connecting.  Called by the admission path on an exact name
    /// match; the caller has already checked the in-flight gate.
    pub fn connect(
        &self,
        slot: &mut Slot,
        addr: BdAddr,
        addr_type: AddrType,
        ctx: &mut SlotContext<'_>,
    ) {
        let Some(gattc_if) = slot.gattc_if() else {
            warn!("slot {}: connect requested before registration", slot.index());
            return;
        };
        if slot.phase() != Phase::Idle || slot.is_connected() {
            return;
        }
        if !ctx.admission.try_claim(slot.index()) {
            return;
        }

        slot.claim(addr);
        info!(
            "slot {} ({}): connecting to {}",
            slot.index(),
            slot.name(),
            Addr(&addr)
        );
        ctx.sink.emit(&ClientEvent::Connecting {
            slot: slot.index(),
            addr,
        });
        self.transition(slot, Phase::Connecting, ctx);

        ctx.admission.stop_for_connect(&mut *ctx.transport);
        if let Err(e) = ctx.transport.open(gattc_if, addr, addr_type) {
            warn!("slot {}: open request rejected: {}", slot.index(), e);
            ctx.sink.emit(&ClientEvent::ConnectFailed {
                slot: slot.index(),
                status: None,
            });
            self.transition(slot, Phase::Idle, ctx);
            ctx.restart_scan();
        }
    }

    /// Unconditionally return `slot` to Idle (watchdog path).
    pub fn force_idle(&self, slot: &mut Slot, ctx: &mut SlotContext<'_>) {
        self.transition(slot, Phase::Idle, ctx);
    }

    pub fn descriptor(&self, phase: Phase) -> &PhaseDescriptor {
        &self.table[phase as usize]
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&self, slot: &mut Slot, mut next: Phase, ctx: &mut SlotContext<'_>) {
        loop {
            let from = slot.phase();
            if from == next {
                return;
            }

            info!(
                "slot {}: FSM transition: {} -> {}",
                slot.index(),
                self.table[from as usize].name,
                self.table[next as usize].name
            );
            slot.set_phase(next);
            ctx.sink.emit(&ClientEvent::PhaseChanged {
                slot: slot.index(),
                from,
                to: next,
            });

            match self.table[next as usize].on_enter {
                Some(enter) => match enter(slot, ctx) {
                    Some(chained) => next = chained,
                    None => return,
                },
                None => return,
            }
        }
    }
}
