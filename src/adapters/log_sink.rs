//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every [`ClientEvent`] to the `log`
//! facade (the ESP-IDF logger on the device, UART / USB-CDC).  Payloads
//! are rendered as hex; the core never interprets them.

use log::{info, warn};

use crate::app::events::ClientEvent;
use crate::app::ports::EventSink;
use crate::gatt::{Addr, Hex};

/// Adapter that logs every [`ClientEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &ClientEvent<'_>) {
        match *event {
            ClientEvent::Started { slots } => info!("START | slots={}", slots),
            ClientEvent::SlotRegistered { slot, gattc_if } => {
                info!("REG   | slot={} if={}", slot, gattc_if);
            }
            ClientEvent::RegistrationFailed { slot, status } => {
                warn!("REG   | slot={} failed status={}", slot, status);
            }
            ClientEvent::ScanStarted => info!("SCAN  | started"),
            ClientEvent::ScanStopped => info!("SCAN  | stopped"),
            ClientEvent::ScanWindowElapsed => info!("SCAN  | window elapsed"),
            ClientEvent::PrimariesConnected => info!("SCAN  | primaries connected"),
            ClientEvent::Connecting { slot, addr } => {
                info!("CONN  | slot={} connecting {}", slot, Addr(&addr));
            }
            ClientEvent::Connected {
                slot,
                conn_id,
                addr,
            } => info!("CONN  | slot={} conn_id={} peer={}", slot, conn_id, Addr(&addr)),
            ClientEvent::ConnectFailed { slot, status } => match status {
                Some(status) => warn!("CONN  | slot={} failed status={}", slot, status),
                None => warn!("CONN  | slot={} request rejected", slot),
            },
            ClientEvent::PhaseChanged { slot, from, to } => {
                info!("PHASE | slot={} {} -> {}", slot, from, to);
            }
            ClientEvent::DiscoveryFailed { slot, reason } => {
                warn!("DISC  | slot={} {}", slot, reason);
            }
            ClientEvent::ReadValue {
                slot,
                handle,
                value,
            } => info!(
                "READ  | slot={} handle=0x{:04x} len={} | {}",
                slot,
                handle,
                value.len(),
                Hex(value)
            ),
            ClientEvent::Notification {
                slot,
                handle,
                value,
                is_notify,
            } => info!(
                "{} | slot={} handle=0x{:04x} len={} | {}",
                if is_notify { "NOTIF" } else { "INDIC" },
                slot,
                handle,
                value.len(),
                Hex(value)
            ),
            ClientEvent::WriteComplete {
                slot,
                handle,
                status,
            } => info!(
                "WRITE | slot={} handle=0x{:04x} status={}",
                slot, handle, status
            ),
            ClientEvent::Disconnected { slot, addr, reason } => {
                info!("DISC  | slot={} peer={} reason=0x{:x}", slot, Addr(&addr), reason);
            }
            ClientEvent::WatchdogExpired { slot, phase } => {
                warn!("WDOG  | slot={} expired in {}", slot, phase);
            }
            ClientEvent::StaleLinkClosed {
                slot,
                conn_id,
                addr,
            } => {
                warn!("CONN  | slot={} closed stale conn_id={} peer={}", slot, conn_id, Addr(&addr));
            }
        }
    }
}
