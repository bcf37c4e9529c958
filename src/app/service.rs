//! Central client service — the hexagonal core.
//!
//! [`CentralClient`] owns the registry, the admission state and the slot
//! state machine.  Every inbound event passes through one of its
//! `handle_*` methods, which makes it the single place where the shared
//! admission state is mutated.  The stack is reached only through the
//! port traits handed in at each call site.
//!
//! ```text
//!  GapEvent ────▶ ┌──────────────────────────────┐ ──▶ GapPort
//!                 │        CentralClient          │
//!  GattcEvent ──▶ │ Admission · Router · Slot FSM │ ──▶ GattcPort
//!                 └──────────────────────────────┘ ──▶ EventSink
//! ```

use log::{debug, info, warn};

use crate::admission::{AdmissionState, Decision};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::fsm::{SlotContext, SlotMachine};
use crate::gatt::{AdvName, Addr, AddrType, BdAddr, GapEvent, GattIf, GattStatus, GattcEvent};
use crate::registry::{Registry, Slot, SlotIndex};
use crate::router;

use super::events::ClientEvent;
use super::ports::{EventSink, GapPort, GattcPort, Transport};

// ───────────────────────────────────────────────────────────────
// CentralClient
// ───────────────────────────────────────────────────────────────

pub struct CentralClient {
    config: ClientConfig,
    registry: Registry,
    admission: AdmissionState,
    machine: SlotMachine,
}

impl CentralClient {
    /// Validate `config` and build one Idle slot per target.
    ///
    /// Nothing is sent to the stack until [`start`](Self::start).
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let registry = Registry::new(&config);
        Ok(Self {
            config,
            registry,
            admission: AdmissionState::new(),
            machine: SlotMachine::new(),
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Set the local MTU and register one application per slot.
    ///
    /// A slot whose registration request is rejected outright is marked
    /// failed immediately; the others wait for their `Registered` event.
    pub fn start(&mut self, transport: &mut impl Transport, sink: &mut impl EventSink) {
        if let Err(e) = transport.set_local_mtu(self.config.local_mtu) {
            warn!("local MTU {} rejected: {}", self.config.local_mtu, e);
        }

        for index in 0..self.registry.len() {
            let app_id = index as u16;
            if let Err(e) = transport.register_app(app_id) {
                warn!("slot {}: app registration rejected: {}", index, e);
                if self
                    .registry
                    .fail_registration(app_id, GattStatus::ERROR)
                    .is_ok()
                {
                    sink.emit(&ClientEvent::RegistrationFailed {
                        slot: index,
                        status: GattStatus::ERROR,
                    });
                }
            }
        }

        info!("central client started with {} slots", self.registry.len());
        sink.emit(&ClientEvent::Started {
            slots: self.registry.len(),
        });
        self.after_registration(transport);
    }

    // ── Inbound events ────────────────────────────────────────

    /// Scan-side events: scan lifecycle and advertisement reports.
    pub fn handle_gap_event(
        &mut self,
        event: &GapEvent<'_>,
        transport: &mut impl Transport,
        sink: &mut impl EventSink,
    ) {
        match *event {
            GapEvent::ScanParamsSet { status } => {
                if status.is_ok() {
                    self.admission
                        .start_scan(transport, self.config.scan_duration_secs);
                } else {
                    warn!("scan parameters failed, status {}", status);
                }
            }
            GapEvent::ScanStarted { status } => {
                if status.is_ok() {
                    info!("scan started");
                    self.admission.note_scan_started();
                    sink.emit(&ClientEvent::ScanStarted);
                } else {
                    warn!("scan start failed, status {}", status);
                }
            }
            GapEvent::ScanStopped { status } => {
                if status.is_ok() {
                    info!("scan stopped");
                } else {
                    warn!("scan stop failed, status {}", status);
                }
                self.admission.note_scan_stopped();
                sink.emit(&ClientEvent::ScanStopped);
            }
            GapEvent::ScanComplete => {
                debug!("scan window elapsed");
                self.admission.note_scan_stopped();
                sink.emit(&ClientEvent::ScanWindowElapsed);
            }
            GapEvent::ConnParamsUpdated {
                status,
                conn_interval,
                latency,
                timeout,
            } => {
                info!(
                    "conn params status={} interval={} latency={} timeout={}",
                    status, conn_interval, latency, timeout
                );
            }
            GapEvent::ScanResult {
                addr,
                addr_type,
                rssi,
                name,
            } => self.on_scan_result(addr, addr_type, rssi, name, transport, sink),
        }
    }

    /// Connection and discovery events.  `gattc_if` is the interface the
    /// stack raised the event on, `None` when it has not been assigned yet.
    pub fn handle_gattc_event(
        &mut self,
        event: &GattcEvent<'_>,
        gattc_if: Option<GattIf>,
        transport: &mut impl Transport,
        sink: &mut impl EventSink,
    ) {
        if let GattcEvent::Registered { app_id, status } = *event {
            self.on_registered(app_id, status, gattc_if, sink);
            self.after_registration(transport);
            return;
        }

        let targets = router::targets(gattc_if, &self.registry);
        if targets.is_empty() {
            debug!("no slot owns interface {:?}", gattc_if);
            return;
        }

        let mut ctx = SlotContext {
            config: &self.config,
            admission: &mut self.admission,
            transport,
            sink,
        };
        for index in targets {
            if let Some(slot) = self.registry.get_mut(index) {
                self.machine.handle(slot, event, &mut ctx);
            }
        }
    }

    /// Advance the discovery watchdog by one tick.  A no-op unless
    /// `discovery_timeout_ticks` is configured.
    pub fn watchdog_tick(&mut self, transport: &mut impl Transport, sink: &mut impl EventSink) {
        let Some(limit) = self.config.discovery_timeout_ticks else {
            return;
        };

        let mut ctx = SlotContext {
            config: &self.config,
            admission: &mut self.admission,
            transport,
            sink,
        };
        let mut expired = false;
        for slot in self.registry.iter_mut() {
            if !slot.phase().is_in_progress() || slot.tick() <= limit {
                continue;
            }

            let phase = slot.phase();
            warn!(
                "slot {} ({}): stuck in {} for {} ticks, giving up",
                slot.index(),
                slot.name(),
                phase,
                slot.ticks_in_phase()
            );
            if let Some((gattc_if, conn_id)) = slot.gattc_if().zip(slot.conn_id()) {
                if let Err(e) = ctx.transport.close(gattc_if, conn_id) {
                    warn!("slot {}: close rejected: {}", slot.index(), e);
                }
            }
            ctx.sink.emit(&ClientEvent::WatchdogExpired {
                slot: slot.index(),
                phase,
            });
            self.machine.force_idle(slot, &mut ctx);
            expired = true;
        }

        if expired {
            ctx.restart_scan();
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn slot(&self, index: SlotIndex) -> Option<&Slot> {
        self.registry.get(index)
    }

    pub fn admission(&self) -> &AdmissionState {
        &self.admission
    }

    // ── Internal ──────────────────────────────────────────────

    fn on_registered(
        &mut self,
        app_id: u16,
        status: GattStatus,
        gattc_if: Option<GattIf>,
        sink: &mut impl EventSink,
    ) {
        let slot = usize::from(app_id);
        match gattc_if {
            Some(gattc_if) if status.is_ok() => match self.registry.register(app_id, gattc_if) {
                Ok(()) => sink.emit(&ClientEvent::SlotRegistered { slot, gattc_if }),
                Err(e) => warn!("registration for app {} ignored: {}", app_id, e),
            },
            _ => {
                let status = if status.is_ok() { GattStatus::ERROR } else { status };
                match self.registry.fail_registration(app_id, status) {
                    Ok(()) => sink.emit(&ClientEvent::RegistrationFailed { slot, status }),
                    Err(e) => warn!("registration failure for app {} ignored: {}", app_id, e),
                }
            }
        }
    }

    /// Once every slot has registered (or failed), configure scanning.
    fn after_registration(&mut self, transport: &mut impl Transport) {
        if !self.registry.all_resolved() {
            return;
        }
        if !self.registry.iter().any(Slot::is_registered) {
            warn!("no slot registered; scanning disabled");
            return;
        }
        if self.admission.request_params(transport) {
            info!("all slots registered, configuring scan");
        }
    }

    fn on_scan_result(
        &mut self,
        addr: BdAddr,
        addr_type: AddrType,
        rssi: i8,
        name: Option<&[u8]>,
        transport: &mut impl Transport,
        sink: &mut impl EventSink,
    ) {
        let decision = self
            .admission
            .evaluate(&self.registry, &self.config.primary_slots, name);

        match decision {
            Decision::InFlight(_) | Decision::PrimariesConnected | Decision::NoMatch => {}
            Decision::AlreadyConnected(index) => {
                debug!("slot {}: already connected, ignoring {}", index, Addr(&addr));
            }
            Decision::StopScan => {
                info!("all primary peripherals connected, stopping scan");
                if let Err(e) = transport.stop_scan() {
                    warn!("scan stop rejected: {}", e);
                }
                sink.emit(&ClientEvent::PrimariesConnected);
            }
            Decision::Connect(index) => {
                if let Some(name) = name {
                    info!(
                        "found {} at {} (rssi {})",
                        AdvName(name),
                        Addr(&addr),
                        rssi
                    );
                }
                let Some(slot) = self.registry.get_mut(index) else {
                    return;
                };
                let mut ctx = SlotContext {
                    config: &self.config,
                    admission: &mut self.admission,
                    transport,
                    sink,
                };
                self.machine.connect(slot, addr, addr_type, &mut ctx);
            }
        }
    }
}
