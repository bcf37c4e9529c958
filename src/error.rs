//! Unified error type for the GATT client.
//!
//! A single `Copy` enum that every transport call and configuration check
//! funnels into.  The orchestration core never escalates these: a failing
//! call aborts the affected slot's current attempt and the client carries on.

use core::fmt;

use crate::gatt::GattStatus;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The Bluetooth stack rejected a request (raw `esp_err_t`).
    Transport(i32),
    /// A synchronous GATT-client query returned a non-OK status.
    Status(GattStatus),
    /// The slot already owns an interface handle.
    AlreadyRegistered(usize),
    /// An app id / slot index outside the configured registry.
    UnknownSlot(usize),
    /// A discovery result did not fit in the handler's scratch buffer.
    ScratchExhausted { needed: u16, capacity: usize },
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(code) => write!(f, "transport error 0x{code:x}"),
            Self::Status(status) => write!(f, "GATT status {status}"),
            Self::AlreadyRegistered(slot) => write!(f, "slot {slot} already registered"),
            Self::UnknownSlot(slot) => write!(f, "unknown slot {slot}"),
            Self::ScratchExhausted { needed, capacity } => {
                write!(f, "no scratch space: {needed} entries, capacity {capacity}")
            }
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl From<GattStatus> for Error {
    fn from(status: GattStatus) -> Self {
        Self::Status(status)
    }
}

impl core::error::Error for Error {}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
