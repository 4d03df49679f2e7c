//! # Telemetry Module
//!
//! Handles link telemetry logging to JSONL files with rotation.
//!
//! This module handles:
//! - Stamping link snapshots with a UTC timestamp
//! - Formatting as JSONL (JSON Lines)
//! - Managing file rotation (max N records per file, last M files kept)

pub mod logger;
pub mod types;

pub use logger::TelemetryLogger;
pub use types::TelemetryRecord;
