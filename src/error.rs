//! # Error Types
//!
//! Custom error types for the link engine using `thiserror`.
//!
//! Only boot-time and host-glue failures live here. Over-the-air decode
//! failures are [`DecodeError`](crate::rf::DecodeError) and never escape
//! the engine.

use thiserror::Error;

/// Main error type for the receiver
#[derive(Debug, Error)]
pub enum LinkError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No flight controller serial port found (tried: {0})")]
    SerialPortNotFound(String),

    /// Telemetry record could not be serialized
    #[error("Telemetry encoding error: {0}")]
    Telemetry(#[from] serde_json::Error),
}

/// Result type alias for the receiver
pub type Result<T> = std::result::Result<T, LinkError>;
