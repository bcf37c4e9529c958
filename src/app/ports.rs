//! Port traits — the boundary between the orchestration core and the
//! Bluetooth stack.
//!
//! ```text
//!   Stack callbacks ──▶ GapEvent / GattcEvent ──▶ CentralClient (domain)
//!   CentralClient ──▶ GapPort / GattcPort ──▶ Stack requests
//!   CentralClient ──▶ EventSink ──▶ log / telemetry
//! ```
//!
//! Requests are fire-and-forget: `Ok(())` means the stack accepted the
//! request, and the outcome arrives later as an event.  The three
//! attribute queries are the exception; they answer synchronously from
//! the stack's local attribute cache.

use crate::error::Result;
use crate::gatt::{
    AddrType, AttrKind, BdAddr, BtUuid, CharElem, ConnId, DescrElem, GattIf, Handle, HandleRange,
};

use super::events::ClientEvent;

// ───────────────────────────────────────────────────────────────
// GAP port (scanning)
// ───────────────────────────────────────────────────────────────

pub trait GapPort {
    /// Configure scan parameters.  Completion: `GapEvent::ScanParamsSet`.
    fn set_scan_params(&mut self) -> Result<()>;

    /// Scan for `duration_secs`, then stop on its own
    /// (`GapEvent::ScanComplete`).
    fn start_scan(&mut self, duration_secs: u32) -> Result<()>;

    fn stop_scan(&mut self) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// GATT-client port (connection and discovery)
// ───────────────────────────────────────────────────────────────

pub trait GattcPort {
    /// Register application `app_id`.  Completion: `GattcEvent::Registered`.
    fn register_app(&mut self, app_id: u16) -> Result<()>;

    /// Preferred ATT MTU for every future connection.
    fn set_local_mtu(&mut self, mtu: u16) -> Result<()>;

    fn open(&mut self, gattc_if: GattIf, addr: BdAddr, addr_type: AddrType) -> Result<()>;

    fn close(&mut self, gattc_if: GattIf, conn_id: ConnId) -> Result<()>;

    fn send_mtu_req(&mut self, gattc_if: GattIf, conn_id: ConnId) -> Result<()>;

    /// Search for `uuid` only.  Results: zero or more `SearchResult`, then
    /// one `SearchComplete`.
    fn search_service(&mut self, gattc_if: GattIf, conn_id: ConnId, uuid: &BtUuid) -> Result<()>;

    /// Number of attributes of `kind` in `range`.  `char_handle` narrows a
    /// descriptor count to one characteristic and is ignored otherwise.
    fn attr_count(
        &mut self,
        gattc_if: GattIf,
        conn_id: ConnId,
        kind: AttrKind,
        range: HandleRange,
        char_handle: Handle,
    ) -> Result<u16>;

    /// Fill `out` with characteristics matching `uuid`; returns how many
    /// entries were written.
    fn chars_by_uuid(
        &mut self,
        gattc_if: GattIf,
        conn_id: ConnId,
        range: HandleRange,
        uuid: &BtUuid,
        out: &mut [CharElem],
    ) -> Result<usize>;

    /// Fill `out` with descriptors of `char_handle` matching `uuid`.
    fn descrs_by_char_handle(
        &mut self,
        gattc_if: GattIf,
        conn_id: ConnId,
        char_handle: Handle,
        uuid: &BtUuid,
        out: &mut [DescrElem],
    ) -> Result<usize>;

    fn read_char(&mut self, gattc_if: GattIf, conn_id: ConnId, handle: Handle) -> Result<()>;

    fn write_char(
        &mut self,
        gattc_if: GattIf,
        conn_id: ConnId,
        handle: Handle,
        value: &[u8],
    ) -> Result<()>;

    fn write_descr(
        &mut self,
        gattc_if: GattIf,
        conn_id: ConnId,
        handle: Handle,
        value: &[u8],
    ) -> Result<()>;

    fn register_for_notify(&mut self, gattc_if: GattIf, addr: BdAddr, handle: Handle)
    -> Result<()>;
}

/// Both halves of the stack.  Handlers receive one `&mut dyn Transport`.
pub trait Transport: GapPort + GattcPort {}

impl<T: GapPort + GattcPort + ?Sized> Transport for T {}

// ───────────────────────────────────────────────────────────────
// Event sink
// ───────────────────────────────────────────────────────────────

/// The core reports what happened through this port.  Adapters decide
/// where it goes (serial log, a queue, a test recorder).
pub trait EventSink {
    fn emit(&mut self, event: &ClientEvent<'_>);
}
