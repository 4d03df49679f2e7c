//! # FPV Link Receiver Library
//!
//! Receiver side of a frequency-hopping RC link, with CRSF output to the
//! flight controller.
//!
//! The [`engine::LinkEngine`] owns the link: it validates incoming frames,
//! follows the transmitter's hop sequence, keeps its tick aligned in time and
//! frequency, and hands channel data and link statistics to the flight
//! controller. Hardware is reached only through the [`hal`] traits, so the
//! same engine runs on a target or against the [`sim`] bench.

pub mod config;
pub mod crc;
pub mod crsf;
pub mod engine;
pub mod error;
pub mod fhss;
pub mod filter;
pub mod hal;
pub mod identity;
pub mod link_quality;
pub mod lock_loop;
pub mod rates;
pub mod rf;
pub mod serial;
pub mod sim;
pub mod telemetry;
