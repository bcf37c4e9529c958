//! Mock Bluetooth stack for integration tests.
//!
//! Records every request the client makes so tests can assert on the
//! full call history, and answers the synchronous attribute queries from
//! canned tables.  Also provides a recording event sink and a few
//! helpers that drive a client through the common bring-up steps.

use gattlink::app::events::{ClientEvent, DiscoveryFailure};
use gattlink::app::ports::{EventSink, GapPort, GattcPort};
use gattlink::app::service::CentralClient;
use gattlink::config::ClientConfig;
use gattlink::error::{Error, Result};
use gattlink::fsm::Phase;
use gattlink::gatt::{
    AddrType, AttrKind, BdAddr, BtUuid, CharElem, ConnId, DescrElem, GapEvent, GattIf, GattStatus,
    GattcEvent, Handle, HandleRange, ServiceSource, props,
};

pub const ADDR_A: BdAddr = [0x24, 0x0a, 0xc4, 0x00, 0x00, 0x0a];
pub const ADDR_B: BdAddr = [0x24, 0x0a, 0xc4, 0x00, 0x00, 0x0b];
pub const ADDR_C: BdAddr = [0x24, 0x0a, 0xc4, 0x00, 0x00, 0x0c];

pub const SERVICE_RANGE: HandleRange = HandleRange::new(0x28, 0x2f);
pub const CHAR_HANDLE: Handle = 0x2a;
pub const CCCD_HANDLE: Handle = 0x2b;

/// Interface the mock stack hands out for `slot`.
pub fn iface(slot: usize) -> GattIf {
    3 + slot as GattIf
}

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetScanParams,
    StartScan(u32),
    StopScan,
    RegisterApp(u16),
    SetLocalMtu(u16),
    Open {
        gattc_if: GattIf,
        addr: BdAddr,
        addr_type: AddrType,
    },
    Close {
        gattc_if: GattIf,
        conn_id: ConnId,
    },
    SendMtuReq {
        gattc_if: GattIf,
        conn_id: ConnId,
    },
    SearchService {
        gattc_if: GattIf,
        conn_id: ConnId,
        uuid: BtUuid,
    },
    AttrCount {
        kind: AttrKind,
        range: HandleRange,
        char_handle: Handle,
    },
    CharsByUuid {
        range: HandleRange,
        uuid: BtUuid,
    },
    DescrsByCharHandle {
        char_handle: Handle,
        uuid: BtUuid,
    },
    ReadChar {
        gattc_if: GattIf,
        conn_id: ConnId,
        handle: Handle,
    },
    WriteChar {
        handle: Handle,
        value: Vec<u8>,
    },
    WriteDescr {
        handle: Handle,
        value: Vec<u8>,
    },
    RegisterForNotify {
        gattc_if: GattIf,
        addr: BdAddr,
        handle: Handle,
    },
}

impl Call {
    /// Any characteristic or descriptor discovery request.
    pub fn is_discovery(&self) -> bool {
        matches!(
            self,
            Self::AttrCount { .. } | Self::CharsByUuid { .. } | Self::DescrsByCharHandle { .. }
        )
    }
}

// ── MockTransport ─────────────────────────────────────────────

pub struct MockTransport {
    pub calls: Vec<Call>,
    pub char_count: u16,
    pub chars: Vec<CharElem>,
    pub descr_count: u16,
    pub descrs: Vec<DescrElem>,
    pub reject_open: bool,
    pub reject_register: Vec<u16>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            char_count: 1,
            chars: vec![CharElem {
                handle: CHAR_HANDLE,
                properties: props::READ | props::WRITE | props::NOTIFY,
                uuid: BtUuid::Uuid16(0xFF01),
            }],
            descr_count: 1,
            descrs: vec![DescrElem {
                handle: CCCD_HANDLE,
                uuid: BtUuid::CCCD,
            }],
            reject_open: false,
            reject_register: Vec::new(),
        }
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn opens(&self) -> usize {
        self.count(|c| matches!(c, Call::Open { .. }))
    }

    pub fn stops(&self) -> usize {
        self.count(|c| *c == Call::StopScan)
    }

    pub fn starts(&self) -> usize {
        self.count(|c| matches!(c, Call::StartScan(_)))
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl GapPort for MockTransport {
    fn set_scan_params(&mut self) -> Result<()> {
        self.calls.push(Call::SetScanParams);
        Ok(())
    }

    fn start_scan(&mut self, duration_secs: u32) -> Result<()> {
        self.calls.push(Call::StartScan(duration_secs));
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<()> {
        self.calls.push(Call::StopScan);
        Ok(())
    }
}

impl GattcPort for MockTransport {
    fn register_app(&mut self, app_id: u16) -> Result<()> {
        self.calls.push(Call::RegisterApp(app_id));
        if self.reject_register.contains(&app_id) {
            return Err(Error::Transport(0x103));
        }
        Ok(())
    }

    fn set_local_mtu(&mut self, mtu: u16) -> Result<()> {
        self.calls.push(Call::SetLocalMtu(mtu));
        Ok(())
    }

    fn open(&mut self, gattc_if: GattIf, addr: BdAddr, addr_type: AddrType) -> Result<()> {
        self.calls.push(Call::Open {
            gattc_if,
            addr,
            addr_type,
        });
        if self.reject_open {
            return Err(Error::Transport(0x103));
        }
        Ok(())
    }

    fn close(&mut self, gattc_if: GattIf, conn_id: ConnId) -> Result<()> {
        self.calls.push(Call::Close { gattc_if, conn_id });
        Ok(())
    }

    fn send_mtu_req(&mut self, gattc_if: GattIf, conn_id: ConnId) -> Result<()> {
        self.calls.push(Call::SendMtuReq { gattc_if, conn_id });
        Ok(())
    }

    fn search_service(&mut self, gattc_if: GattIf, conn_id: ConnId, uuid: &BtUuid) -> Result<()> {
        self.calls.push(Call::SearchService {
            gattc_if,
            conn_id,
            uuid: *uuid,
        });
        Ok(())
    }

    fn attr_count(
        &mut self,
        _gattc_if: GattIf,
        _conn_id: ConnId,
        kind: AttrKind,
        range: HandleRange,
        char_handle: Handle,
    ) -> Result<u16> {
        self.calls.push(Call::AttrCount {
            kind,
            range,
            char_handle,
        });
        Ok(match kind {
            AttrKind::Characteristic => self.char_count,
            AttrKind::Descriptor => self.descr_count,
        })
    }

    fn chars_by_uuid(
        &mut self,
        _gattc_if: GattIf,
        _conn_id: ConnId,
        range: HandleRange,
        uuid: &BtUuid,
        out: &mut [CharElem],
    ) -> Result<usize> {
        self.calls.push(Call::CharsByUuid { range, uuid: *uuid });
        let mut n = 0;
        for (dst, src) in out.iter_mut().zip(self.chars.iter().filter(|c| c.uuid == *uuid)) {
            *dst = *src;
            n += 1;
        }
        Ok(n)
    }

    fn descrs_by_char_handle(
        &mut self,
        _gattc_if: GattIf,
        _conn_id: ConnId,
        char_handle: Handle,
        uuid: &BtUuid,
        out: &mut [DescrElem],
    ) -> Result<usize> {
        self.calls.push(Call::DescrsByCharHandle {
            char_handle,
            uuid: *uuid,
        });
        let mut n = 0;
        for (dst, src) in out.iter_mut().zip(self.descrs.iter().filter(|d| d.uuid == *uuid)) {
            *dst = *src;
            n += 1;
        }
        Ok(n)
    }

    fn read_char(&mut self, gattc_if: GattIf, conn_id: ConnId, handle: Handle) -> Result<()> {
        self.calls.push(Call::ReadChar {
            gattc_if,
            conn_id,
            handle,
        });
        Ok(())
    }

    fn write_char(
        &mut self,
        _gattc_if: GattIf,
        _conn_id: ConnId,
        handle: Handle,
        value: &[u8],
    ) -> Result<()> {
        self.calls.push(Call::WriteChar {
            handle,
            value: value.to_vec(),
        });
        Ok(())
    }

    fn write_descr(
        &mut self,
        _gattc_if: GattIf,
        _conn_id: ConnId,
        handle: Handle,
        value: &[u8],
    ) -> Result<()> {
        self.calls.push(Call::WriteDescr {
            handle,
            value: value.to_vec(),
        });
        Ok(())
    }

    fn register_for_notify(&mut self, gattc_if: GattIf, addr: BdAddr, handle: Handle) -> Result<()> {
        self.calls.push(Call::RegisterForNotify {
            gattc_if,
            addr,
            handle,
        });
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

/// Owned copy of the events tests care about.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    RegistrationFailed(usize),
    PrimariesConnected,
    Connecting(usize),
    Connected(usize),
    ConnectFailed(usize),
    Phase { slot: usize, from: Phase, to: Phase },
    DiscoveryFailed(usize, DiscoveryFailure),
    ReadValue { slot: usize, handle: Handle, value: Vec<u8> },
    Notification { slot: usize, value: Vec<u8> },
    WriteComplete(usize, GattStatus),
    Disconnected(usize),
    Watchdog(usize, Phase),
    StaleLinkClosed(usize, ConnId),
    Other,
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<Recorded>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event: &Recorded) -> bool {
        self.events.contains(event)
    }

    pub fn count(&self, pred: impl Fn(&Recorded) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &ClientEvent<'_>) {
        let recorded = match *event {
            ClientEvent::RegistrationFailed { slot, .. } => Recorded::RegistrationFailed(slot),
            ClientEvent::PrimariesConnected => Recorded::PrimariesConnected,
            ClientEvent::Connecting { slot, .. } => Recorded::Connecting(slot),
            ClientEvent::Connected { slot, .. } => Recorded::Connected(slot),
            ClientEvent::ConnectFailed { slot, .. } => Recorded::ConnectFailed(slot),
            ClientEvent::PhaseChanged { slot, from, to } => Recorded::Phase { slot, from, to },
            ClientEvent::DiscoveryFailed { slot, reason } => Recorded::DiscoveryFailed(slot, reason),
            ClientEvent::ReadValue {
                slot,
                handle,
                value,
            } => Recorded::ReadValue {
                slot,
                handle,
                value: value.to_vec(),
            },
            ClientEvent::Notification { slot, value, .. } => Recorded::Notification {
                slot,
                value: value.to_vec(),
            },
            ClientEvent::WriteComplete { slot, status, .. } => Recorded::WriteComplete(slot, status),
            ClientEvent::Disconnected { slot, .. } => Recorded::Disconnected(slot),
            ClientEvent::WatchdogExpired { slot, phase } => Recorded::Watchdog(slot, phase),
            ClientEvent::StaleLinkClosed { slot, conn_id, .. } => {
                Recorded::StaleLinkClosed(slot, conn_id)
            }
            _ => Recorded::Other,
        };
        self.events.push(recorded);
    }
}

// ── Drivers ───────────────────────────────────────────────────

pub struct Rig {
    pub client: CentralClient,
    pub stack: MockTransport,
    pub sink: RecordingSink,
}

impl Rig {
    /// Client with every slot registered and the first scan window open.
    pub fn started(config: ClientConfig) -> Self {
        let mut rig = Self::unregistered(config);
        for slot in 0..rig.client.registry().len() {
            rig.registered(slot, GattStatus::OK);
        }
        rig.gap(GapEvent::ScanParamsSet {
            status: GattStatus::OK,
        });
        rig.gap(GapEvent::ScanStarted {
            status: GattStatus::OK,
        });
        rig
    }

    /// Client after `start`, before any registration event.
    pub fn unregistered(config: ClientConfig) -> Self {
        let mut client = CentralClient::new(config).expect("valid config");
        let mut stack = MockTransport::new();
        let mut sink = RecordingSink::new();
        client.start(&mut stack, &mut sink);
        Self {
            client,
            stack,
            sink,
        }
    }

    pub fn demo() -> Self {
        Self::started(ClientConfig::with_targets(&["DEV_A", "DEV_B", "DEV_C"]).expect("config"))
    }

    pub fn registered(&mut self, slot: usize, status: GattStatus) {
        self.gattc(
            Some(iface(slot)),
            GattcEvent::Registered {
                app_id: slot as u16,
                status,
            },
        );
    }

    pub fn gap(&mut self, event: GapEvent<'_>) {
        self.client
            .handle_gap_event(&event, &mut self.stack, &mut self.sink);
    }

    pub fn gattc(&mut self, gattc_if: Option<GattIf>, event: GattcEvent<'_>) {
        self.client
            .handle_gattc_event(&event, gattc_if, &mut self.stack, &mut self.sink);
    }

    pub fn advertise(&mut self, addr: BdAddr, name: &[u8]) {
        self.gap(GapEvent::ScanResult {
            addr,
            addr_type: AddrType::Public,
            rssi: -60,
            name: Some(name),
        });
    }

    pub fn open(&mut self, slot: usize, conn_id: ConnId, addr: BdAddr, status: GattStatus) {
        self.gattc(
            Some(iface(slot)),
            GattcEvent::Open {
                status,
                conn_id,
                addr,
                mtu: 23,
            },
        );
    }

    pub fn mtu(&mut self, slot: usize, conn_id: ConnId, status: GattStatus) {
        self.gattc(
            Some(iface(slot)),
            GattcEvent::MtuConfigured {
                status,
                conn_id,
                mtu: 500,
            },
        );
    }

    pub fn service_found(&mut self, slot: usize, conn_id: ConnId) {
        let uuid = self.client.config().service_uuid;
        self.gattc(
            Some(iface(slot)),
            GattcEvent::SearchResult {
                conn_id,
                uuid,
                range: SERVICE_RANGE,
                is_primary: true,
            },
        );
    }

    pub fn search_complete(&mut self, slot: usize, conn_id: ConnId, status: GattStatus) {
        self.gattc(
            Some(iface(slot)),
            GattcEvent::SearchComplete {
                status,
                conn_id,
                source: ServiceSource::RemoteDevice,
            },
        );
    }

    /// Advertise, open, negotiate MTU, find the service and complete the
    /// search: the slot ends in its mode-specific pending phase.
    pub fn discover(&mut self, slot: usize, conn_id: ConnId, addr: BdAddr, name: &[u8]) {
        self.advertise(addr, name);
        self.open(slot, conn_id, addr, GattStatus::OK);
        self.mtu(slot, conn_id, GattStatus::OK);
        self.service_found(slot, conn_id);
        self.search_complete(slot, conn_id, GattStatus::OK);
    }

    pub fn phase(&self, slot: usize) -> Phase {
        self.client.slot(slot).expect("slot").phase()
    }
}
