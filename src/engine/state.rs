//! # Connection State
//!
//! ```text
//!                 matching SYNC
//!  Disconnected ─────────────────▶ Tentative
//!       ▲                              │ SYNC with predicted
//!       │ timeout                      │ nonce and hop index
//!       │                              ▼
//!       └───────────────────────── Connected
//! ```
//!
//! Any state falls back to `Disconnected` on timeout. A SYNC advances the
//! state by at most one step.

use serde::Serialize;
use std::fmt;

use crate::rf::DecodeError;

/// Link connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// No transmitter; listening on the initial channel and scanning rates
    #[default]
    Disconnected,
    /// SYNC seen, waiting for a second one to confirm the prediction
    Tentative,
    /// Following the transmitter's hop sequence
    Connected,
}

impl LinkState {
    /// State after a SYNC frame with a matching identity suffix.
    ///
    /// `prediction_matches` is whether the frame's nonce and hop index equal
    /// the local values before they are overwritten.
    #[must_use]
    pub fn after_sync(self, prediction_matches: bool) -> LinkState {
        match self {
            LinkState::Disconnected => LinkState::Tentative,
            LinkState::Tentative if prediction_matches => LinkState::Connected,
            other => other,
        }
    }

    #[must_use]
    pub fn is_connected(self) -> bool {
        self == LinkState::Connected
    }

    #[must_use]
    pub fn is_disconnected(self) -> bool {
        self == LinkState::Disconnected
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Tentative => "tentative",
            LinkState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Per-kind frame counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DecodeStats {
    pub accepted: u32,
    pub crc_mismatch: u32,
    pub address_mismatch: u32,
    pub redundancy_mismatch: u32,
    pub unknown_type: u32,
    /// SYNC frames that decoded but carried another transmitter's suffix
    pub foreign_sync: u32,
}

impl DecodeStats {
    /// Counts one rejected frame.
    pub fn record_error(&mut self, error: &DecodeError) {
        let counter = match error {
            DecodeError::CrcMismatch { .. } => &mut self.crc_mismatch,
            DecodeError::AddressMismatch { .. } => &mut self.address_mismatch,
            DecodeError::RedundancyMismatch => &mut self.redundancy_mismatch,
            DecodeError::UnknownFrameType(_) => &mut self.unknown_type,
        };
        *counter = counter.wrapping_add(1);
    }

    /// Counts one accepted frame.
    pub fn record_accepted(&mut self) {
        self.accepted = self.accepted.wrapping_add(1);
    }

    /// Total frames rejected by the codec.
    #[must_use]
    pub fn rejected(&self) -> u32 {
        self.crc_mismatch
            .wrapping_add(self.address_mismatch)
            .wrapping_add(self.redundancy_mismatch)
            .wrapping_add(self.unknown_type)
    }
}

/// Read-only snapshot of the engine for logging and the cooperative loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub state: LinkState,
    pub rate_id: u8,
    pub rate_hz: u16,
    pub nonce: u8,
    pub hop_index: u8,
    pub frequency_hz: u32,
    pub link_quality: u8,
    pub uplink_rssi: u8,
    pub uplink_snr: i8,
    pub phase_offset_us: i32,
    pub frequency_correction: i32,
    pub scan_suspended: bool,
    pub decode: DecodeStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_sync_goes_tentative_only() {
        assert_eq!(LinkState::Disconnected.after_sync(false), LinkState::Tentative);
        assert_eq!(LinkState::Disconnected.after_sync(true), LinkState::Tentative);
    }

    #[test]
    fn test_tentative_needs_prediction_match() {
        assert_eq!(LinkState::Tentative.after_sync(false), LinkState::Tentative);
        assert_eq!(LinkState::Tentative.after_sync(true), LinkState::Connected);
    }

    #[test]
    fn test_connected_is_stable_under_sync() {
        assert_eq!(LinkState::Connected.after_sync(false), LinkState::Connected);
        assert_eq!(LinkState::Connected.after_sync(true), LinkState::Connected);
    }

    #[test]
    fn test_display() {
        assert_eq!(LinkState::Tentative.to_string(), "tentative");
    }

    #[test]
    fn test_decode_stats_counts_per_kind() {
        let mut stats = DecodeStats::default();
        stats.record_error(&DecodeError::CrcMismatch { expected: 1, received: 2 });
        stats.record_error(&DecodeError::CrcMismatch { expected: 1, received: 3 });
        stats.record_error(&DecodeError::AddressMismatch { expected: 1, received: 2 });
        stats.record_error(&DecodeError::RedundancyMismatch);
        stats.record_accepted();

        assert_eq!(stats.crc_mismatch, 2);
        assert_eq!(stats.address_mismatch, 1);
        assert_eq!(stats.redundancy_mismatch, 1);
        assert_eq!(stats.unknown_type, 0);
        assert_eq!(stats.rejected(), 4);
        assert_eq!(stats.accepted, 1);
    }

    #[test]
    fn test_status_serializes_state_as_snake_case() {
        let value = serde_json::to_value(LinkState::Connected).unwrap();
        assert_eq!(value, serde_json::json!("connected"));
    }
}
