//! # CRSF Protocol Module
//!
//! The Crossfire (CRSF) frames the receiver hands to the flight controller.
//!
//! This module handles:
//! - RC channels packet encoding (16 channels, 11-bit resolution)
//! - Link statistics packet encoding
//! - Mapping switch, RSSI and link quality values into the channel range

pub mod encoder;
pub mod protocol;
