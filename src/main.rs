//! gattlink firmware — main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  EspTransport (GapPort + GattcPort)     LogEventSink         │
//! │  gap / gattc callbacks ──▶ SharedClient                      │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │           CentralClient (pure logic)                   │  │
//! │  │  Registry · Router · Slot FSM · Admission              │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::peripherals::Peripherals;
use log::{info, warn};

use gattlink::adapters::esp_transport;
use gattlink::app::service::CentralClient;
use gattlink::config::ClientConfig;

/// Watchdog tick period (ms).
const TICK_MS: u32 = 1000;

fn load_config() -> ClientConfig {
    match option_env!("GATTLINK_CONFIG") {
        Some(json) => match ClientConfig::from_json(json.as_bytes()) {
            Ok(config) => {
                info!("Config loaded from GATTLINK_CONFIG");
                config
            }
            Err(e) => {
                warn!("GATTLINK_CONFIG rejected ({}), using defaults", e);
                ClientConfig::default()
            }
        },
        None => ClientConfig::default(),
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  gattlink v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = load_config();
    for (i, name) in config.targets.iter().enumerate() {
        info!("slot {}: target \"{}\"", i, name);
    }

    // ── 3. Radio and client ───────────────────────────────────
    let peripherals = Peripherals::take()?;
    let _bt = esp_transport::init_bluetooth(peripherals.modem)?;
    let client = CentralClient::new(config)?;
    esp_transport::install(client);
    esp_transport::start()?;

    // ── 4. Everything else is callback-driven ─────────────────
    loop {
        FreeRtos::delay_ms(TICK_MS);
        esp_transport::watchdog_tick();
    }
}
