//! GATT-client vocabulary shared by the core and the transport adapters.
//!
//! Everything here is plain data: handles, addresses, UUIDs, discovery
//! elements, and the two inbound event enums ([`GapEvent`], [`GattcEvent`])
//! that a transport delivers.  Event payloads borrow from the stack's
//! callback buffer, so an adapter can hand them over without copying.

use core::fmt;

use serde::{Deserialize, Serialize};

// ───────────────────────────────────────────────────────────────
// Handles and identifiers
// ───────────────────────────────────────────────────────────────

/// Interface handle assigned by the stack when an app registers.
pub type GattIf = u8;
/// Per-connection identifier assigned by the stack.
pub type ConnId = u16;
/// Attribute handle.
pub type Handle = u16;
/// Bluetooth device address.
pub type BdAddr = [u8; 6];

/// Reserved handle value meaning "not set".
pub const INVALID_HANDLE: Handle = 0;

/// Client Characteristic Configuration descriptor value enabling notifications.
pub const NOTIFY_ENABLE: [u8; 2] = 0x0001u16.to_le_bytes();

/// Status byte reported by the stack (`0` = OK).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GattStatus(pub u8);

impl GattStatus {
    pub const OK: Self = Self(0);
    /// Generic failure (`ESP_GATT_ERROR`).
    pub const ERROR: Self = Self(0x85);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

/// Inclusive attribute-handle range of a discovered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandleRange {
    pub start: Handle,
    pub end: Handle,
}

impl HandleRange {
    pub const fn new(start: Handle, end: Handle) -> Self {
        Self { start, end }
    }

    /// `true` when both ends are set and ordered.
    pub fn is_valid(&self) -> bool {
        self.start != INVALID_HANDLE && self.end != INVALID_HANDLE && self.start <= self.end
    }
}

/// Remote address kind, as reported in an advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddrType {
    #[default]
    Public,
    Random,
    RpaPublic,
    RpaRandom,
}

impl AddrType {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Random,
            2 => Self::RpaPublic,
            3 => Self::RpaRandom,
            _ => Self::Public,
        }
    }

    pub fn to_raw(self) -> u8 {
        self as u8
    }
}

// ───────────────────────────────────────────────────────────────
// UUIDs
// ───────────────────────────────────────────────────────────────

/// A Bluetooth UUID in one of its three wire widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BtUuid {
    Uuid16(u16),
    Uuid32(u32),
    Uuid128([u8; 16]),
}

impl BtUuid {
    /// Client Characteristic Configuration descriptor.
    pub const CCCD: Self = Self::Uuid16(0x2902);
}

impl Default for BtUuid {
    fn default() -> Self {
        Self::Uuid16(0)
    }
}

impl fmt::Display for BtUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid16(v) => write!(f, "0x{v:04x}"),
            Self::Uuid32(v) => write!(f, "0x{v:08x}"),
            Self::Uuid128(bytes) => {
                // Stored little-endian, printed big-endian.
                for (i, b) in bytes.iter().rev().enumerate() {
                    if matches!(i, 4 | 6 | 8 | 10) {
                        f.write_str("-")?;
                    }
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Discovery elements
// ───────────────────────────────────────────────────────────────

/// Characteristic property bits.
pub mod props {
    pub const BROADCAST: u8 = 0x01;
    pub const READ: u8 = 0x02;
    pub const WRITE_NR: u8 = 0x04;
    pub const WRITE: u8 = 0x08;
    pub const NOTIFY: u8 = 0x10;
    pub const INDICATE: u8 = 0x20;
    pub const AUTH: u8 = 0x40;
    pub const EXT_PROP: u8 = 0x80;
}

/// One characteristic returned by a discovery query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharElem {
    pub handle: Handle,
    pub properties: u8,
    pub uuid: BtUuid,
}

impl CharElem {
    pub fn can_read(&self) -> bool {
        self.properties & props::READ != 0
    }

    pub fn can_notify(&self) -> bool {
        self.properties & (props::NOTIFY | props::INDICATE) != 0
    }
}

/// One descriptor returned by a discovery query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DescrElem {
    pub handle: Handle,
    pub uuid: BtUuid,
}

/// Attribute class for [`GattcPort::attr_count`](crate::app::ports::GattcPort::attr_count).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Characteristic,
    Descriptor,
}

/// Where a completed service search took its data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceSource {
    RemoteDevice,
    Cache,
    Unknown,
}

// ───────────────────────────────────────────────────────────────
// Inbound events
// ───────────────────────────────────────────────────────────────

/// Scan-side (GAP) events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapEvent<'a> {
    /// Scan parameters accepted; the client starts a scan window.
    ScanParamsSet { status: GattStatus },
    ScanStarted { status: GattStatus },
    /// One advertisement report.  `name` is the complete local name, if any.
    ScanResult {
        addr: BdAddr,
        addr_type: AddrType,
        rssi: i8,
        name: Option<&'a [u8]>,
    },
    /// The bounded scan window elapsed.
    ScanComplete,
    ScanStopped { status: GattStatus },
    ConnParamsUpdated {
        status: GattStatus,
        conn_interval: u16,
        latency: u16,
        timeout: u16,
    },
}

/// Connection and discovery (GATT-client) events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattcEvent<'a> {
    Registered { app_id: u16, status: GattStatus },
    /// Link-layer connect; delivered to every app, informational only.
    Connected { conn_id: ConnId, addr: BdAddr },
    Open {
        status: GattStatus,
        conn_id: ConnId,
        addr: BdAddr,
        mtu: u16,
    },
    MtuConfigured {
        status: GattStatus,
        conn_id: ConnId,
        mtu: u16,
    },
    ServiceDiscoveryComplete { status: GattStatus, conn_id: ConnId },
    SearchResult {
        conn_id: ConnId,
        uuid: BtUuid,
        range: HandleRange,
        is_primary: bool,
    },
    SearchComplete {
        status: GattStatus,
        conn_id: ConnId,
        source: ServiceSource,
    },
    ReadChar {
        status: GattStatus,
        conn_id: ConnId,
        handle: Handle,
        value: &'a [u8],
    },
    RegisteredForNotify { status: GattStatus, handle: Handle },
    Notify {
        conn_id: ConnId,
        addr: BdAddr,
        handle: Handle,
        value: &'a [u8],
        is_notify: bool,
    },
    WriteDescr {
        status: GattStatus,
        conn_id: ConnId,
        handle: Handle,
    },
    WriteChar {
        status: GattStatus,
        conn_id: ConnId,
        handle: Handle,
    },
    ServiceChanged { addr: BdAddr },
    Disconnected {
        conn_id: ConnId,
        addr: BdAddr,
        reason: u16,
    },
}

/// Formats a byte slice as space-separated hex.
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Formats a device address as `aa:bb:cc:dd:ee:ff`.
pub struct Addr<'a>(pub &'a BdAddr);

impl fmt::Display for Addr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

/// Formats an advertised name, escaping bytes outside printable ASCII.
pub struct AdvName<'a>(pub &'a [u8]);

impl fmt::Display for AdvName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0 {
            if (0x20..=0x7e).contains(&b) {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}
