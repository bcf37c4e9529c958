//! Peripheral registry — one [`Slot`] per configured target.
//!
//! Pure storage: slots are created once at startup, recycled on disconnect,
//! never destroyed.  Fields that only make sense after a given discovery
//! phase are private and exposed through accessors that check the phase,
//! so a stale connection id or handle can never leak out of an `Idle` slot.

use heapless::{String, Vec};
use log::{info, warn};

use crate::config::{ClientConfig, MAX_NAME_LEN, MAX_SLOTS};
use crate::error::{Error, Result};
use crate::fsm::Phase;
use crate::gatt::{BdAddr, ConnId, GattIf, GattStatus, Handle, HandleRange, INVALID_HANDLE};

/// Stable slot identity; doubles as the app id registered with the stack.
pub type SlotIndex = usize;

/// Outcome of the slot's one-time registration with the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Pending,
    Registered(GattIf),
    /// Fatal for this slot: it never takes part in scan matching.
    Failed(GattStatus),
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Slot {
    index: SlotIndex,
    name: String<MAX_NAME_LEN>,
    registration: Registration,
    phase: Phase,
    connected: bool,
    service_found: bool,
    conn_id: ConnId,
    remote_addr: Option<BdAddr>,
    service_range: HandleRange,
    char_handle: Handle,
    char_properties: u8,
    ticks_in_phase: u32,
}

impl Slot {
    fn new(index: SlotIndex, name: String<MAX_NAME_LEN>) -> Self {
        Self {
            index,
            name,
            registration: Registration::Pending,
            phase: Phase::Idle,
            connected: false,
            service_found: false,
            conn_id: 0,
            remote_addr: None,
            service_range: HandleRange::default(),
            char_handle: INVALID_HANDLE,
            char_properties: 0,
            ticks_in_phase: 0,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn index(&self) -> SlotIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registration(&self) -> Registration {
        self.registration
    }

    pub fn gattc_if(&self) -> Option<GattIf> {
        match self.registration {
            Registration::Registered(gattc_if) => Some(gattc_if),
            _ => None,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.gattc_if().is_some()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Claimed by a connection attempt or connected.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn service_found(&self) -> bool {
        self.service_found
    }

    /// Connection id; `None` before the open result has arrived.
    pub fn conn_id(&self) -> Option<ConnId> {
        (self.phase >= Phase::Open).then_some(self.conn_id)
    }

    /// Address of the peer this slot is connecting or connected to.
    pub fn remote_addr(&self) -> Option<BdAddr> {
        self.remote_addr
    }

    /// Service handle range; `None` until a matching service was found.
    pub fn service_range(&self) -> Option<HandleRange> {
        self.service_found.then_some(self.service_range)
    }

    /// Characteristic handle; `None` until characteristic discovery succeeded.
    pub fn char_handle(&self) -> Option<Handle> {
        (self.phase >= Phase::CharacteristicResolved && self.char_handle != INVALID_HANDLE)
            .then_some(self.char_handle)
    }

    /// Property bits of the resolved characteristic (`0` before resolution).
    pub fn char_properties(&self) -> u8 {
        self.char_handle().map_or(0, |_| self.char_properties)
    }

    pub fn ticks_in_phase(&self) -> u32 {
        self.ticks_in_phase
    }

    /// Exact advertised-name comparison (length and bytes).
    pub fn name_matches(&self, adv_name: &[u8]) -> bool {
        self.name.as_bytes() == adv_name
    }

    // ── Mutation (state machine only) ─────────────────────────

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.ticks_in_phase = 0;
    }

    pub(crate) fn claim(&mut self, addr: BdAddr) {
        self.connected = true;
        self.remote_addr = Some(addr);
    }

    pub(crate) fn record_open(&mut self, conn_id: ConnId, addr: BdAddr) {
        self.conn_id = conn_id;
        self.remote_addr = Some(addr);
    }

    pub(crate) fn record_service(&mut self, range: HandleRange) {
        self.service_range = range;
        self.service_found = true;
    }

    pub(crate) fn record_char(&mut self, handle: Handle, properties: u8) {
        self.char_handle = handle;
        self.char_properties = properties;
    }

    pub(crate) fn tick(&mut self) -> u32 {
        self.ticks_in_phase = self.ticks_in_phase.saturating_add(1);
        self.ticks_in_phase
    }

    /// Back to a fresh `Idle` slot.  Registration survives.
    pub(crate) fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.connected = false;
        self.service_found = false;
        self.conn_id = 0;
        self.remote_addr = None;
        self.service_range = HandleRange::default();
        self.char_handle = INVALID_HANDLE;
        self.char_properties = 0;
        self.ticks_in_phase = 0;
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct Registry {
    slots: Vec<Slot, MAX_SLOTS>,
}

impl Registry {
    pub fn new(config: &ClientConfig) -> Self {
        let slots = config
            .targets
            .iter()
            .enumerate()
            .map(|(i, name)| Slot::new(i, name.clone()))
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: SlotIndex) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: SlotIndex) -> Option<&mut Slot> {
        self.slots.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Slot> {
        self.slots.iter_mut()
    }

    pub fn lookup_by_interface(&self, gattc_if: GattIf) -> Option<&Slot> {
        self.slots.iter().find(|s| s.gattc_if() == Some(gattc_if))
    }

    /// Registered slot whose target name equals `adv_name` exactly.
    pub fn lookup_by_name(&self, adv_name: &[u8]) -> Option<&Slot> {
        self.slots
            .iter()
            .find(|s| s.is_registered() && s.name_matches(adv_name))
    }

    /// Store the interface handle handed out for `app_id`.  Write-once.
    pub fn register(&mut self, app_id: u16, gattc_if: GattIf) -> Result<()> {
        let slot = self.slot_for_app(app_id)?;
        if slot.registration != Registration::Pending {
            warn!("slot {}: duplicate registration (if={})", slot.index, gattc_if);
            return Err(Error::AlreadyRegistered(slot.index));
        }
        slot.registration = Registration::Registered(gattc_if);
        info!("slot {} ({}): registered, if={}", slot.index, slot.name, gattc_if);
        Ok(())
    }

    /// Mark `app_id` as permanently unusable.
    pub fn fail_registration(&mut self, app_id: u16, status: GattStatus) -> Result<()> {
        let slot = self.slot_for_app(app_id)?;
        if slot.registration != Registration::Pending {
            return Err(Error::AlreadyRegistered(slot.index));
        }
        slot.registration = Registration::Failed(status);
        warn!(
            "slot {} ({}): registration failed, status {} — slot disabled",
            slot.index, slot.name, status
        );
        Ok(())
    }

    /// Every slot has either registered or failed.
    pub fn all_resolved(&self) -> bool {
        self.slots
            .iter()
            .all(|s| s.registration != Registration::Pending)
    }

    /// Slots currently claimed or connected.
    pub fn connected_count(&self) -> usize {
        self.slots.iter().filter(|s| s.connected).count()
    }

    fn slot_for_app(&mut self, app_id: u16) -> Result<&mut Slot> {
        let index = usize::from(app_id);
        self.slots.get_mut(index).ok_or(Error::UnknownSlot(index))
    }
}
