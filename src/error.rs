//! Error types for mmwave-io
//!
//! # Error Recovery Strategies
//!
//! Different error types require different recovery approaches:
//!
//! ## Startup Errors (Fix and Restart)
//!
//! - **`Serial`**: Opening or configuring a serial port failed. Check the
//!   configured port names and that no other process holds the device.
//! - **`Config`**: Configuration file is invalid. Fix the file and restart.
//! - **`Registration`**: An endpoint could not be attached to the reactor's
//!   completion queue. This only happens during startup wiring.
//!
//! All three abort the daemon with a non-zero exit code.
//!
//! ## Runtime Errors (Log and Continue)
//!
//! - **`Io`**: Read/write error on an established endpoint. The endpoint
//!   stays registered; the reader re-arms on the next completion.
//!
//! - **`InvalidFrame`**: A located frame declared TLV lengths that overrun
//!   its own packet length, or a payload too short for its fixed layout.
//!   The frame is dropped and the accumulator cleared; parsing resumes at
//!   the next magic sequence.
//!
//! - **`Json`**: Rendering a decoded frame failed. The frame is dropped.
//!
//! Unknown TLV types are NOT errors: they are emitted by name with no
//! payload and traversal continues.

use thiserror::Error;

/// Errors that can occur in mmwave-io
///
/// See module-level documentation for recovery strategies.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
