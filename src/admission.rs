//! Scan admission controller.
//!
//! Owns the only cross-slot mutable state: whether a scan is running,
//! whether the "all primaries connected" stop has already been issued,
//! and which slot (if any) has a connection attempt in flight.  Holding
//! the in-flight slot as an `Option` makes "at most one attempt at a time"
//! a property of the type rather than of a boolean convention.
//!
//! ```text
//!  registration resolved ──▶ set scan params ──▶ [params set] ──▶ start scan
//!                                                                    │
//!  advertisement ──▶ in flight? ──yes──▶ ignore                       │
//!                      │ no                                           │
//!                      ▼                                              │
//!               primaries connected? ──yes──▶ stop once, then ignore  │
//!                      │ no                                           │
//!                      ▼                                              │
//!               exact name match on a free slot ──▶ connect           │
//!                                                                     │
//!  read complete / open failed / watchdog ──▶ restart scan ◀──────────┘
//! ```

use log::{debug, info, warn};

use crate::app::ports::GapPort;
use crate::registry::{Registry, SlotIndex};

/// Outcome of evaluating one advertisement report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// A connection attempt is already in flight; report not evaluated.
    InFlight(SlotIndex),
    /// Every primary slot is connected; the one-time stop was issued now.
    StopScan,
    /// Every primary slot is connected and the stop was already issued.
    PrimariesConnected,
    /// Report carried no name or no registered slot wants it.
    NoMatch,
    /// The matching slot is already claimed or connected.
    AlreadyConnected(SlotIndex),
    /// Start connecting this slot.
    Connect(SlotIndex),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionState {
    scanning: bool,
    stop_requested: bool,
    in_flight: Option<SlotIndex>,
    params_requested: bool,
}

impl AdmissionState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn in_flight(&self) -> Option<SlotIndex> {
        self.in_flight
    }

    pub fn params_requested(&self) -> bool {
        self.params_requested
    }

    // ── In-flight gate ────────────────────────────────────────

    /// Claim the in-flight gate for `slot`.  Fails if another slot holds it.
    pub fn try_claim(&mut self, slot: SlotIndex) -> bool {
        match self.in_flight {
            None => {
                self.in_flight = Some(slot);
                true
            }
            Some(owner) => owner == slot,
        }
    }

    /// Release the gate if `slot` holds it.
    pub fn release(&mut self, slot: SlotIndex) {
        if self.in_flight == Some(slot) {
            self.in_flight = None;
        }
    }

    // ── Scan control ──────────────────────────────────────────

    /// Issue scan parameters once.  Returns `true` if the request went out.
    pub fn request_params<G: GapPort + ?Sized>(&mut self, gap: &mut G) -> bool {
        if self.params_requested {
            return false;
        }
        match gap.set_scan_params() {
            Ok(()) => {
                self.params_requested = true;
                true
            }
            Err(e) => {
                warn!("scan parameters rejected: {}", e);
                false
            }
        }
    }

    /// Begin a bounded scan window.
    pub fn start_scan<G: GapPort + ?Sized>(&mut self, gap: &mut G, duration_secs: u32) {
        match gap.start_scan(duration_secs) {
            Ok(()) => debug!("scan requested for {}s", duration_secs),
            Err(e) => warn!("scan start rejected: {}", e),
        }
    }

    /// Start a new scan window after a slot finished (or gave up).
    /// Clears the one-shot stop guard so the primaries check re-arms.
    pub fn restart_scan<G: GapPort + ?Sized>(&mut self, gap: &mut G, duration_secs: u32) {
        self.stop_requested = false;
        info!("restarting scan");
        self.start_scan(gap, duration_secs);
    }

    /// Stop scanning ahead of a connection attempt.  Does not touch the
    /// one-shot stop guard.
    pub fn stop_for_connect<G: GapPort + ?Sized>(&mut self, gap: &mut G) {
        if let Err(e) = gap.stop_scan() {
            warn!("scan stop rejected: {}", e);
        }
    }

    pub fn note_scan_started(&mut self) {
        self.scanning = true;
    }

    pub fn note_scan_stopped(&mut self) {
        self.scanning = false;
    }

    // ── Report evaluation ─────────────────────────────────────

    /// Decide what one advertisement report means.  Only mutates the stop
    /// guard; the caller performs the connect through the state machine.
    pub fn evaluate(
        &mut self,
        registry: &Registry,
        primaries: &[SlotIndex],
        name: Option<&[u8]>,
    ) -> Decision {
        if let Some(slot) = self.in_flight {
            return Decision::InFlight(slot);
        }

        let primaries_connected = !primaries.is_empty()
            && primaries
                .iter()
                .all(|&i| registry.get(i).is_some_and(|s| s.is_connected()));
        if primaries_connected {
            if self.stop_requested {
                return Decision::PrimariesConnected;
            }
            self.stop_requested = true;
            return Decision::StopScan;
        }

        let Some(name) = name else {
            return Decision::NoMatch;
        };
        match registry.lookup_by_name(name) {
            None => Decision::NoMatch,
            Some(slot) if slot.is_connected() => Decision::AlreadyConnected(slot.index()),
            Some(slot) => Decision::Connect(slot.index()),
        }
    }
}
