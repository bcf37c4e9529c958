//! ESP-IDF Bluedroid adapter.
//!
//! [`EspTransport`] implements [`GapPort`] and [`GattcPort`] over the raw
//! `esp_ble_gap_*` / `esp_ble_gattc_*` calls.  The two `extern "C"`
//! callbacks translate the stack's parameter unions into [`GapEvent`] /
//! [`GattcEvent`] and hand them to the process-wide [`SharedClient`].
//!
//! ```text
//!  Bluedroid task ──▶ gap_event_handler   ──┐
//!                                           ├──▶ CLIENT.with(..) ──▶ EspTransport
//!  Bluedroid task ──▶ gattc_event_handler ──┘
//! ```

use core::slice;

use esp_idf_hal::modem::Modem;
use esp_idf_svc::bt::{Ble, BtDriver};
use esp_idf_svc::nvs::{EspNvsPartition, NvsDefault};
use esp_idf_sys::*;
use log::{info, warn};

use crate::app::ports::{GapPort, GattcPort};
use crate::app::service::CentralClient;
use crate::error::{Error, Result};
use crate::fsm::states::SCRATCH_CAPACITY;
use crate::gatt::{
    AddrType, AttrKind, BdAddr, BtUuid, CharElem, ConnId, DescrElem, GapEvent, GattIf, GattStatus,
    GattcEvent, Handle, HandleRange, ServiceSource,
};
use crate::shared::SharedClient;

use super::log_sink::LogEventSink;

/// The one client instance the callbacks feed.
static CLIENT: SharedClient = SharedClient::new();

/// Interface value the stack uses before an app is registered.
const GATT_IF_NONE: esp_gatt_if_t = 0xFF;

/// Scan interval / window in 0.625 ms units.
const SCAN_INTERVAL: u16 = 0x50;
const SCAN_WINDOW: u16 = 0x30;

// ───────────────────────────────────────────────────────────────
// Conversions
// ───────────────────────────────────────────────────────────────

fn check(code: esp_err_t) -> Result<()> {
    if code == ESP_OK as esp_err_t {
        Ok(())
    } else {
        Err(Error::Transport(code))
    }
}

fn check_gatt(status: esp_gatt_status_t) -> Result<()> {
    if status == esp_gatt_status_t_ESP_GATT_OK {
        Ok(())
    } else {
        Err(Error::Status(GattStatus(status as u8)))
    }
}

fn to_esp_uuid(uuid: &BtUuid) -> esp_bt_uuid_t {
    // SAFETY: all-zero is a valid esp_bt_uuid_t.
    let mut raw: esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    match *uuid {
        BtUuid::Uuid16(v) => {
            raw.len = 2;
            raw.uuid.uuid16 = v;
        }
        BtUuid::Uuid32(v) => {
            raw.len = 4;
            raw.uuid.uuid32 = v;
        }
        BtUuid::Uuid128(bytes) => {
            raw.len = 16;
            raw.uuid.uuid128 = bytes;
        }
    }
    raw
}

fn from_esp_uuid(raw: &esp_bt_uuid_t) -> BtUuid {
    // SAFETY: `len` selects the active union member.
    unsafe {
        match raw.len {
            2 => BtUuid::Uuid16(raw.uuid.uuid16),
            4 => BtUuid::Uuid32(raw.uuid.uuid32),
            _ => BtUuid::Uuid128(raw.uuid.uuid128),
        }
    }
}

fn to_esp_addr_type(addr_type: AddrType) -> esp_ble_addr_type_t {
    esp_ble_addr_type_t::from(addr_type.to_raw())
}

fn attr_type(kind: AttrKind) -> esp_gatt_db_attr_type_t {
    match kind {
        AttrKind::Characteristic => esp_gatt_db_attr_type_t_ESP_GATT_DB_CHARACTERISTIC,
        AttrKind::Descriptor => esp_gatt_db_attr_type_t_ESP_GATT_DB_DESCRIPTOR,
    }
}

fn service_source(raw: esp_service_source_t) -> ServiceSource {
    match raw {
        esp_service_source_t_ESP_GATT_SERVICE_FROM_REMOTE_DEVICE => ServiceSource::RemoteDevice,
        esp_service_source_t_ESP_GATT_SERVICE_FROM_NVS_FLASH => ServiceSource::Cache,
        _ => ServiceSource::Unknown,
    }
}

/// Borrow `len` bytes at `ptr`; empty for a null pointer.
///
/// # Safety
/// `ptr` must be valid for `len` bytes for the lifetime of the callback.
unsafe fn bytes<'a>(ptr: *const u8, len: usize) -> &'a [u8] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(ptr, len) }
    }
}

// ───────────────────────────────────────────────────────────────
// EspTransport
// ───────────────────────────────────────────────────────────────

/// Stateless handle onto the Bluedroid host stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct EspTransport;

impl GapPort for EspTransport {
    fn set_scan_params(&mut self) -> Result<()> {
        let mut params = esp_ble_scan_params_t {
            scan_type: esp_ble_scan_type_t_BLE_SCAN_TYPE_ACTIVE,
            own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
            scan_filter_policy: esp_ble_scan_filter_t_BLE_SCAN_FILTER_ALLOW_ALL,
            scan_interval: SCAN_INTERVAL,
            scan_window: SCAN_WINDOW,
            scan_duplicate: esp_ble_scan_duplicate_t_BLE_SCAN_DUPLICATE_DISABLE,
        };
        check(unsafe { esp_ble_gap_set_scan_params(&mut params) })
    }

    fn start_scan(&mut self, duration_secs: u32) -> Result<()> {
        check(unsafe { esp_ble_gap_start_scanning(duration_secs) })
    }

    fn stop_scan(&mut self) -> Result<()> {
        check(unsafe { esp_ble_gap_stop_scanning() })
    }
}

impl GattcPort for EspTransport {
    fn register_app(&mut self, app_id: u16) -> Result<()> {
        check(unsafe { esp_ble_gattc_app_register(app_id) })
    }

    fn set_local_mtu(&mut self, mtu: u16) -> Result<()> {
        check(unsafe { esp_ble_gatt_set_local_mtu(mtu) })
    }

    fn open(&mut self, gattc_if: GattIf, mut addr: BdAddr, addr_type: AddrType) -> Result<()> {
        check(unsafe {
            esp_ble_gattc_open(
                gattc_if,
                addr.as_mut_ptr(),
                to_esp_addr_type(addr_type),
                true,
            )
        })
    }

    fn close(&mut self, gattc_if: GattIf, conn_id: ConnId) -> Result<()> {
        check(unsafe { esp_ble_gattc_close(gattc_if, conn_id) })
    }

    fn send_mtu_req(&mut self, gattc_if: GattIf, conn_id: ConnId) -> Result<()> {
        check(unsafe { esp_ble_gattc_send_mtu_req(gattc_if, conn_id) })
    }

    fn search_service(&mut self, gattc_if: GattIf, conn_id: ConnId, uuid: &BtUuid) -> Result<()> {
        let mut filter = to_esp_uuid(uuid);
        check(unsafe { esp_ble_gattc_search_service(gattc_if, conn_id, &mut filter) })
    }

    fn attr_count(
        &mut self,
        gattc_if: GattIf,
        conn_id: ConnId,
        kind: AttrKind,
        range: HandleRange,
        char_handle: Handle,
    ) -> Result<u16> {
        let mut count: u16 = 0;
        check_gatt(unsafe {
            esp_ble_gattc_get_attr_count(
                gattc_if,
                conn_id,
                attr_type(kind),
                range.start,
                range.end,
                char_handle,
                &mut count,
            )
        })?;
        Ok(count)
    }

    fn chars_by_uuid(
        &mut self,
        gattc_if: GattIf,
        conn_id: ConnId,
        range: HandleRange,
        uuid: &BtUuid,
        out: &mut [CharElem],
    ) -> Result<usize> {
        // SAFETY: all-zero is a valid esp_gattc_char_elem_t.
        let mut raw: [esp_gattc_char_elem_t; SCRATCH_CAPACITY] = unsafe { core::mem::zeroed() };
        let mut count = out.len().min(SCRATCH_CAPACITY) as u16;
        check_gatt(unsafe {
            esp_ble_gattc_get_char_by_uuid(
                gattc_if,
                conn_id,
                range.start,
                range.end,
                to_esp_uuid(uuid),
                raw.as_mut_ptr(),
                &mut count,
            )
        })?;

        let n = usize::from(count).min(out.len());
        for (dst, src) in out.iter_mut().zip(&raw[..n]) {
            *dst = CharElem {
                handle: src.char_handle,
                properties: src.properties as u8,
                uuid: from_esp_uuid(&src.uuid),
            };
        }
        Ok(n)
    }

    fn descrs_by_char_handle(
        &mut self,
        gattc_if: GattIf,
        conn_id: ConnId,
        char_handle: Handle,
        uuid: &BtUuid,
        out: &mut [DescrElem],
    ) -> Result<usize> {
        // SAFETY: all-zero is a valid esp_gattc_descr_elem_t.
        let mut raw: [esp_gattc_descr_elem_t; SCRATCH_CAPACITY] = unsafe { core::mem::zeroed() };
        let mut count = out.len().min(SCRATCH_CAPACITY) as u16;
        check_gatt(unsafe {
            esp_ble_gattc_get_descr_by_char_handle(
                gattc_if,
                conn_id,
                char_handle,
                to_esp_uuid(uuid),
                raw.as_mut_ptr(),
                &mut count,
            )
        })?;

        let n = usize::from(count).min(out.len());
        for (dst, src) in out.iter_mut().zip(&raw[..n]) {
            *dst = DescrElem {
                handle: src.handle,
                uuid: from_esp_uuid(&src.uuid),
            };
        }
        Ok(n)
    }

    fn read_char(&mut self, gattc_if: GattIf, conn_id: ConnId, handle: Handle) -> Result<()> {
        check(unsafe {
            esp_ble_gattc_read_char(
                gattc_if,
                conn_id,
                handle,
                esp_gatt_auth_req_t_ESP_GATT_AUTH_REQ_NONE,
            )
        })
    }

    fn write_char(
        &mut self,
        gattc_if: GattIf,
        conn_id: ConnId,
        handle: Handle,
        value: &[u8],
    ) -> Result<()> {
        // The stack copies the buffer before returning.
        check(unsafe {
            esp_ble_gattc_write_char(
                gattc_if,
                conn_id,
                handle,
                value.len() as u16,
                value.as_ptr().cast_mut(),
                esp_gatt_write_type_t_ESP_GATT_WRITE_TYPE_RSP,
                esp_gatt_auth_req_t_ESP_GATT_AUTH_REQ_NONE,
            )
        })
    }

    fn write_descr(
        &mut self,
        gattc_if: GattIf,
        conn_id: ConnId,
        handle: Handle,
        value: &[u8],
    ) -> Result<()> {
        check(unsafe {
            esp_ble_gattc_write_char_descr(
                gattc_if,
                conn_id,
                handle,
                value.len() as u16,
                value.as_ptr().cast_mut(),
                esp_gatt_write_type_t_ESP_GATT_WRITE_TYPE_RSP,
                esp_gatt_auth_req_t_ESP_GATT_AUTH_REQ_NONE,
            )
        })
    }

    fn register_for_notify(
        &mut self,
        gattc_if: GattIf,
        mut addr: BdAddr,
        handle: Handle,
    ) -> Result<()> {
        check(unsafe { esp_ble_gattc_register_for_notify(gattc_if, addr.as_mut_ptr(), handle) })
    }
}

// ───────────────────────────────────────────────────────────────
// Stack callbacks
// ───────────────────────────────────────────────────────────────

unsafe extern "C" fn gap_event_handler(
    event: esp_gap_ble_cb_event_t,
    param: *mut esp_ble_gap_cb_param_t,
) {
    if param.is_null() {
        return;
    }
    // SAFETY: the stack passes a valid parameter union for `event`.
    let param = unsafe { &mut *param };

    let translated = unsafe {
        match event {
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_PARAM_SET_COMPLETE_EVT => {
                Some(GapEvent::ScanParamsSet {
                    status: GattStatus(param.scan_param_cmpl.status as u8),
                })
            }
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_START_COMPLETE_EVT => {
                Some(GapEvent::ScanStarted {
                    status: GattStatus(param.scan_start_cmpl.status as u8),
                })
            }
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_STOP_COMPLETE_EVT => {
                Some(GapEvent::ScanStopped {
                    status: GattStatus(param.scan_stop_cmpl.status as u8),
                })
            }
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_UPDATE_CONN_PARAMS_EVT => {
                let p = &param.update_conn_params;
                Some(GapEvent::ConnParamsUpdated {
                    status: GattStatus(p.status as u8),
                    conn_interval: p.conn_int,
                    latency: p.latency,
                    timeout: p.timeout,
                })
            }
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_RESULT_EVT => {
                let r = &mut param.scan_rst;
                match r.search_evt {
                    esp_gap_search_evt_t_ESP_GAP_SEARCH_INQ_RES_EVT => {
                        let mut name_len: u8 = 0;
                        let name_ptr = esp_ble_resolve_adv_data(
                            r.ble_adv.as_mut_ptr(),
                            esp_ble_adv_data_type_ESP_BLE_AD_TYPE_NAME_CMPL as u8,
                            &mut name_len,
                        );
                        let name = bytes(name_ptr, usize::from(name_len));
                        Some(GapEvent::ScanResult {
                            addr: r.bda,
                            addr_type: AddrType::from_raw(r.ble_addr_type as u8),
                            rssi: r.rssi as i8,
                            name: (!name.is_empty()).then_some(name),
                        })
                    }
                    esp_gap_search_evt_t_ESP_GAP_SEARCH_INQ_CMPL_EVT => Some(GapEvent::ScanComplete),
                    _ => None,
                }
            }
            _ => None,
        }
    };

    if let Some(event) = translated {
        CLIENT.with(|client| client.handle_gap_event(&event, &mut EspTransport, &mut LogEventSink));
    }
}

unsafe extern "C" fn gattc_event_handler(
    event: esp_gattc_cb_event_t,
    gattc_if: esp_gatt_if_t,
    param: *mut esp_ble_gattc_cb_param_t,
) {
    if param.is_null() {
        return;
    }
    // SAFETY: the stack passes a valid parameter union for `event`.
    let param = unsafe { &*param };

    let translated = unsafe {
        match event {
            esp_gattc_cb_event_t_ESP_GATTC_REG_EVT => Some(GattcEvent::Registered {
                app_id: param.reg.app_id,
                status: GattStatus(param.reg.status as u8),
            }),
            esp_gattc_cb_event_t_ESP_GATTC_CONNECT_EVT => Some(GattcEvent::Connected {
                conn_id: param.connect.conn_id,
                addr: param.connect.remote_bda,
            }),
            esp_gattc_cb_event_t_ESP_GATTC_OPEN_EVT => Some(GattcEvent::Open {
                status: GattStatus(param.open.status as u8),
                conn_id: param.open.conn_id,
                addr: param.open.remote_bda,
                mtu: param.open.mtu,
            }),
            esp_gattc_cb_event_t_ESP_GATTC_CFG_MTU_EVT => Some(GattcEvent::MtuConfigured {
                status: GattStatus(param.cfg_mtu.status as u8),
                conn_id: param.cfg_mtu.conn_id,
                mtu: param.cfg_mtu.mtu,
            }),
            esp_gattc_cb_event_t_ESP_GATTC_DIS_SRVC_CMPL_EVT => {
                Some(GattcEvent::ServiceDiscoveryComplete {
                    status: GattStatus(param.dis_srvc_cmpl.status as u8),
                    conn_id: param.dis_srvc_cmpl.conn_id,
                })
            }
            esp_gattc_cb_event_t_ESP_GATTC_SEARCH_RES_EVT => {
                let r = &param.search_res;
                Some(GattcEvent::SearchResult {
                    conn_id: r.conn_id,
                    uuid: from_esp_uuid(&r.srvc_id.uuid),
                    range: HandleRange::new(r.start_handle, r.end_handle),
                    is_primary: r.is_primary,
                })
            }
            esp_gattc_cb_event_t_ESP_GATTC_SEARCH_CMPL_EVT => Some(GattcEvent::SearchComplete {
                status: GattStatus(param.search_cmpl.status as u8),
                conn_id: param.search_cmpl.conn_id,
                source: service_source(param.search_cmpl.searched_service_source),
            }),
            esp_gattc_cb_event_t_ESP_GATTC_READ_CHAR_EVT => {
                let r = &param.read;
                Some(GattcEvent::ReadChar {
                    status: GattStatus(r.status as u8),
                    conn_id: r.conn_id,
                    handle: r.handle,
                    value: bytes(r.value, usize::from(r.value_len)),
                })
            }
            esp_gattc_cb_event_t_ESP_GATTC_REG_FOR_NOTIFY_EVT => {
                Some(GattcEvent::RegisteredForNotify {
                    status: GattStatus(param.reg_for_notify.status as u8),
                    handle: param.reg_for_notify.handle,
                })
            }
            esp_gattc_cb_event_t_ESP_GATTC_NOTIFY_EVT => {
                let n = &param.notify;
                Some(GattcEvent::Notify {
                    conn_id: n.conn_id,
                    addr: n.remote_bda,
                    handle: n.handle,
                    value: bytes(n.value, usize::from(n.value_len)),
                    is_notify: n.is_notify,
                })
            }
            esp_gattc_cb_event_t_ESP_GATTC_WRITE_DESCR_EVT => Some(GattcEvent::WriteDescr {
                status: GattStatus(param.write.status as u8),
                conn_id: param.write.conn_id,
                handle: param.write.handle,
            }),
            esp_gattc_cb_event_t_ESP_GATTC_WRITE_CHAR_EVT => Some(GattcEvent::WriteChar {
                status: GattStatus(param.write.status as u8),
                conn_id: param.write.conn_id,
                handle: param.write.handle,
            }),
            esp_gattc_cb_event_t_ESP_GATTC_SRVC_CHG_EVT => Some(GattcEvent::ServiceChanged {
                addr: param.srvc_chg.remote_bda,
            }),
            esp_gattc_cb_event_t_ESP_GATTC_DISCONNECT_EVT => Some(GattcEvent::Disconnected {
                conn_id: param.disconnect.conn_id,
                addr: param.disconnect.remote_bda,
                reason: param.disconnect.reason as u16,
            }),
            _ => None,
        }
    };

    let Some(event) = translated else {
        return;
    };
    let gattc_if = (gattc_if != GATT_IF_NONE).then_some(gattc_if);
    CLIENT.with(|client| {
        client.handle_gattc_event(&event, gattc_if, &mut EspTransport, &mut LogEventSink);
    });
}

// ───────────────────────────────────────────────────────────────
// Bootstrap
// ───────────────────────────────────────────────────────────────

/// NVS, controller and Bluedroid bring-up in BLE-only mode.
///
/// The returned driver owns the controller; keep it alive for as long as
/// the client runs.
pub fn init_bluetooth(modem: Modem) -> Result<BtDriver<'static, Ble>> {
    let nvs = EspNvsPartition::<NvsDefault>::take().map_err(|e| Error::Transport(e.code()))?;
    let driver = BtDriver::<Ble>::new(modem, Some(nvs)).map_err(|e| Error::Transport(e.code()))?;
    info!("Bluetooth controller and Bluedroid enabled");
    Ok(driver)
}

/// Make `client` the target of every stack callback.
pub fn install(client: CentralClient) {
    if CLIENT.install(client).is_some() {
        warn!("replaced a previously installed client");
    }
}

/// Register the callbacks, then register one app per slot.
pub fn start() -> Result<()> {
    // SAFETY: plain registration calls; the handlers are 'static.
    unsafe {
        check(esp_ble_gap_register_callback(Some(gap_event_handler)))?;
        check(esp_ble_gattc_register_callback(Some(gattc_event_handler)))?;
    }
    CLIENT
        .with(|client| client.start(&mut EspTransport, &mut LogEventSink))
        .ok_or(Error::Config("no client installed"))
}

/// Periodic discovery watchdog; call at a fixed rate.
pub fn watchdog_tick() {
    CLIENT.with(|client| client.watchdog_tick(&mut EspTransport, &mut LogEventSink));
}
