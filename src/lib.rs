//! mmwave-io - Telemetry ingest for the TI IWR1443 mmWave radar
//!
//! This library decodes the radar's framed TLV telemetry stream into JSON
//! records while forwarding operator commands to its configuration port.
//! I/O is completion-driven: serial endpoints post tagged completions to
//! a reactor that serializes all per-endpoint callbacks.

pub mod config;
pub mod devices;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod reactor;
pub mod sink;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
