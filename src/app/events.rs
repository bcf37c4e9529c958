//! Outbound client events.
//!
//! [`CentralClient`](super::service::CentralClient) and the slot state
//! machine emit these through the [`EventSink`](super::ports::EventSink)
//! port.  Payload slices borrow from the inbound event, so a sink that
//! wants to keep them must copy.

use core::fmt;

use crate::error::Error;
use crate::fsm::Phase;
use crate::gatt::{BdAddr, ConnId, GattIf, GattStatus, Handle};
use crate::registry::SlotIndex;

/// Why a discovery step did not advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryFailure {
    /// Service search completed with a non-OK status.
    SearchFailed(GattStatus),
    /// Search completed but the configured service was not among the results.
    ServiceNotFound,
    NoCharacteristic,
    /// Characteristic lacks the property the configured mode needs.
    MissingProperty(u8),
    NoDescriptor,
    /// A request was rejected or a result reported failure.
    Rejected(Error),
}

impl fmt::Display for DiscoveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SearchFailed(status) => write!(f, "service search failed, status {status}"),
            Self::ServiceNotFound => f.write_str("service not found"),
            Self::NoCharacteristic => f.write_str("no matching characteristic"),
            Self::MissingProperty(p) => write!(f, "characteristic properties 0x{p:02x} unusable"),
            Self::NoDescriptor => f.write_str("no CCCD descriptor"),
            Self::Rejected(e) => write!(f, "{e}"),
        }
    }
}

/// Structured events emitted by the client core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent<'a> {
    /// Registration requests were issued for this many slots.
    Started { slots: usize },
    SlotRegistered { slot: SlotIndex, gattc_if: GattIf },
    /// The slot is excluded from matching for the rest of the run.
    RegistrationFailed { slot: SlotIndex, status: GattStatus },
    ScanStarted,
    ScanStopped,
    /// The bounded scan window ran out.
    ScanWindowElapsed,
    /// Every primary slot is connected; scanning was stopped.
    PrimariesConnected,
    Connecting { slot: SlotIndex, addr: BdAddr },
    Connected {
        slot: SlotIndex,
        conn_id: ConnId,
        addr: BdAddr,
    },
    /// `status` is `None` when the open request itself was rejected.
    ConnectFailed {
        slot: SlotIndex,
        status: Option<GattStatus>,
    },
    PhaseChanged {
        slot: SlotIndex,
        from: Phase,
        to: Phase,
    },
    DiscoveryFailed {
        slot: SlotIndex,
        reason: DiscoveryFailure,
    },
    ReadValue {
        slot: SlotIndex,
        handle: Handle,
        value: &'a [u8],
    },
    Notification {
        slot: SlotIndex,
        handle: Handle,
        value: &'a [u8],
        is_notify: bool,
    },
    WriteComplete {
        slot: SlotIndex,
        handle: Handle,
        status: GattStatus,
    },
    Disconnected {
        slot: SlotIndex,
        addr: BdAddr,
        reason: u16,
    },
    /// The slot sat in `phase` too long and was forced back to Idle.
    WatchdogExpired { slot: SlotIndex, phase: Phase },
    /// A connection completed for an Idle slot and was closed again.
    StaleLinkClosed {
        slot: SlotIndex,
        conn_id: ConnId,
        addr: BdAddr,
    },
}
