//! Fuzz target: `AdmissionState::evaluate`
//!
//! Feeds arbitrary advertised names to the admission controller and
//! asserts that a connect decision is only ever returned for a byte-exact
//! target name.
//!
//! cargo fuzz run fuzz_adv_names

#![no_main]

use gattlink::admission::{AdmissionState, Decision};
use gattlink::config::ClientConfig;
use gattlink::registry::Registry;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = ClientConfig::default();
    let mut registry = Registry::new(&config);
    for app_id in 0..registry.len() as u16 {
        let _ = registry.register(app_id, 3 + app_id as u8);
    }

    let mut admission = AdmissionState::new();
    match admission.evaluate(&registry, &config.primary_slots, Some(data)) {
        Decision::Connect(index) => {
            let target = &config.targets[index];
            assert_eq!(target.as_bytes(), data, "non-exact name admitted");
        }
        Decision::NoMatch => {
            assert!(config.targets.iter().all(|t| t.as_bytes() != data));
        }
        other => panic!("unexpected decision {other:?}"),
    }
});
