//! Client configuration.
//!
//! Supplied once at startup and immutable afterwards.  One target name per
//! peripheral slot; every peripheral exposes the same service/characteristic
//! UUID pair.

use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::gatt::BtUuid;

/// Hard ceiling on peripheral slots (sizes every per-slot buffer).
pub const MAX_SLOTS: usize = 9;

/// Longest advertised name that can be configured as a target.
pub const MAX_NAME_LEN: usize = 32;

/// Longest characteristic write issued at the end of the notify path.
pub const MAX_PROBE_LEN: usize = 64;

/// Smallest ATT MTU (the default before any exchange).
const MIN_MTU: u16 = 23;
/// Largest ATT MTU the Bluedroid stack accepts.
const MAX_MTU: u16 = 517;

/// Which branch a slot follows once its characteristic is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiscoveryMode {
    /// Read the characteristic once, then resume scanning.
    #[default]
    Read,
    /// Subscribe to notifications and enable them through the CCCD.
    Notify,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Advertised names, one per slot (slot index = position).
    pub targets: Vec<String<MAX_NAME_LEN>, MAX_SLOTS>,
    /// Service every peripheral exposes.
    pub service_uuid: BtUuid,
    /// Characteristic of interest inside that service.
    pub char_uuid: BtUuid,
    /// Length of one scan window (seconds).
    pub scan_duration_secs: u32,
    /// Preferred local ATT MTU.
    pub local_mtu: u16,
    /// Slots whose joint connection stops scanning.
    pub primary_slots: Vec<usize, MAX_SLOTS>,
    pub discovery_mode: DiscoveryMode,
    /// Bytes written to the characteristic once notifications are enabled.
    pub probe_payload_len: u8,
    /// Watchdog ticks a slot may spend in one in-progress phase.
    /// `None` disables the watchdog.
    pub discovery_timeout_ticks: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        // Three short names always fit MAX_SLOTS / MAX_NAME_LEN.
        let targets = ["ESP_GATTS_DEMO_a", "ESP_GATTS_DEMO_b", "ESP_GATTS_DEMO_c"]
            .into_iter()
            .filter_map(|name| String::try_from(name).ok())
            .collect();
        let primary_slots = Vec::from_slice(&[0, 1]).unwrap_or_default();

        Self {
            targets,
            service_uuid: BtUuid::Uuid16(0x00FF),
            char_uuid: BtUuid::Uuid16(0xFF01),
            scan_duration_secs: 1,
            local_mtu: 500,
            primary_slots,
            discovery_mode: DiscoveryMode::Read,
            probe_payload_len: 35,
            discovery_timeout_ticks: None,
        }
    }
}

impl ClientConfig {
    /// Default configuration with a different target list.
    pub fn with_targets(names: &[&str]) -> Result<Self> {
        let mut targets = Vec::new();
        for name in names {
            let name = String::try_from(*name).map_err(|()| Error::Config("target name too long"))?;
            targets
                .push(name)
                .map_err(|_| Error::Config("too many targets"))?;
        }
        let mut config = Self {
            targets,
            ..Self::default()
        };
        config.primary_slots.retain(|&p| p < names.len());
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let config: Self =
            serde_json::from_slice(bytes).map_err(|_| Error::Config("malformed JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Number of peripheral slots this configuration describes.
    pub fn slot_count(&self) -> usize {
        self.targets.len()
    }

    /// Reject values the client cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(Error::Config("at least one target required"));
        }
        for (i, name) in self.targets.iter().enumerate() {
            if name.is_empty() {
                return Err(Error::Config("empty target name"));
            }
            if self.targets[..i].contains(name) {
                return Err(Error::Config("duplicate target name"));
            }
        }
        for (i, &p) in self.primary_slots.iter().enumerate() {
            if p >= self.targets.len() {
                return Err(Error::Config("primary slot out of range"));
            }
            if self.primary_slots[..i].contains(&p) {
                return Err(Error::Config("duplicate primary slot"));
            }
        }
        if self.scan_duration_secs == 0 {
            return Err(Error::Config("scan duration must be non-zero"));
        }
        if !(MIN_MTU..=MAX_MTU).contains(&self.local_mtu) {
            return Err(Error::Config("local MTU out of range"));
        }
        if usize::from(self.probe_payload_len) > MAX_PROBE_LEN {
            return Err(Error::Config("probe payload too long"));
        }
        if self.discovery_timeout_ticks == Some(0) {
            return Err(Error::Config("watchdog timeout must be non-zero"));
        }
        Ok(())
    }

    /// Payload written to the characteristic at the end of the notify path:
    /// `0, 1, 2, …` up to `probe_payload_len` bytes.
    pub fn probe_payload(&self) -> Vec<u8, MAX_PROBE_LEN> {
        (0..self.probe_payload_len).collect()
    }
}
