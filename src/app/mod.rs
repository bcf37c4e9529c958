//! Application core — connection and discovery orchestration, zero I/O.
//!
//! [`service::CentralClient`] ties the registry, the admission controller
//! and the slot state machine together.  All interaction with the
//! Bluetooth stack happens through the port traits in [`ports`], keeping
//! this layer fully testable without a radio.

pub mod events;
pub mod ports;
pub mod service;
