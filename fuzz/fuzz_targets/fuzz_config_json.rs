//! Fuzz target: `ClientConfig::from_json`
//!
//! Any document the parser accepts must also pass validation on its own
//! and describe a usable slot table.
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use gattlink::config::{ClientConfig, MAX_PROBE_LEN, MAX_SLOTS};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(config) = ClientConfig::from_json(data) else {
        return;
    };
    assert!(config.validate().is_ok());
    assert!((1..=MAX_SLOTS).contains(&config.slot_count()));
    assert!(config.primary_slots.iter().all(|&p| p < config.slot_count()));
    assert!(config.probe_payload().len() <= MAX_PROBE_LEN);
});
