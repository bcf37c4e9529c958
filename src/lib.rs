//! gattlink — multi-peripheral BLE GATT central client.
//!
//! Exposes the pure-logic modules for integration testing.  The
//! Bluedroid adapter is compiled only for `target_os = "espidf"` with the
//! `espidf` feature enabled; the critical-section shim for every ESP-IDF build.

#![deny(unused_must_use)]

pub mod admission;
pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod gatt;
pub mod registry;
pub mod router;
pub mod shared;

pub mod adapters;

#[cfg(target_os = "espidf")]
mod esp_link_shims;
