//! Adapters — concrete implementations of the port traits.
//!
//! | Adapter         | Implements          | Connects to              |
//! |-----------------|---------------------|--------------------------|
//! | `esp_transport` | GapPort, GattcPort  | ESP-IDF Bluedroid host   |
//! | `log_sink`      | EventSink           | Serial log output        |

#[cfg(all(feature = "espidf", target_os = "espidf"))]
pub mod esp_transport;
pub mod log_sink;
