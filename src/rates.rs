//! # Air Rate Profiles
//!
//! The table of link configurations the receiver can run at. Exactly one
//! profile is current at any time; the engine swaps it while scanning for a
//! transmitter.
//!
//! | Id | Rate | BW | SF | CR | Interval | Hop | TLM | Timeout | Dwell |
//! |----|------|----|----|----|----------|-----|-----|---------|-------|
//! | 0 | 200 Hz | 500 kHz | 6 | 4/5 | 5000 µs | 2 | 1:64 | 1000 ms | 1500 ms |
//! | 1 | 100 Hz | 500 kHz | 7 | 4/7 | 10000 µs | 2 | 1:32 | 2000 ms | 2000 ms |
//! | 2 | 50 Hz | 500 kHz | 8 | 4/7 | 20000 µs | 2 | 1:16 | 6000 ms | 2500 ms |

use serde::Deserialize;

/// LoRa signal bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bandwidth {
    /// 125 kHz
    Khz125,
    /// 250 kHz
    Khz250,
    /// 500 kHz
    Khz500,
}

impl Bandwidth {
    /// Bandwidth in Hz.
    #[must_use]
    pub const fn hz(self) -> u32 {
        match self {
            Bandwidth::Khz125 => 125_000,
            Bandwidth::Khz250 => 250_000,
            Bandwidth::Khz500 => 500_000,
        }
    }
}

/// LoRa coding rate (4/x).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodingRate {
    Cr4_5,
    Cr4_6,
    Cr4_7,
    Cr4_8,
}

impl CodingRate {
    /// Denominator of the coding rate.
    #[must_use]
    pub const fn denominator(self) -> u8 {
        match self {
            CodingRate::Cr4_5 => 5,
            CodingRate::Cr4_6 => 6,
            CodingRate::Cr4_7 => 7,
            CodingRate::Cr4_8 => 8,
        }
    }
}

/// Modulation settings handed to the radio on a rate switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ModulationParams {
    pub bandwidth: Bandwidth,
    pub spreading_factor: u8,
    pub coding_rate: CodingRate,
    pub preamble_len: u8,
}

/// One entry of the air rate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AirRateProfile {
    /// Identifier carried in SYNC frames and reported as the RF mode
    pub id: u8,

    /// Nominal packet rate
    pub rate_hz: u16,

    /// Radio modulation
    pub modulation: ModulationParams,

    /// Time between frames (one scheduler tick)
    pub frame_interval_us: u32,

    /// Frames spent on each channel
    pub hop_interval: u8,

    /// Frames per telemetry reply, 0 disables telemetry
    pub telemetry_ratio: u8,

    /// Silence after which the link is declared lost
    pub connection_timeout_ms: u32,

    /// Time spent listening on this profile while scanning
    pub scan_dwell_ms: u32,

    /// Extra dwell granted while a tentative sync is pending
    pub tentative_grace_ms: u32,
}

impl AirRateProfile {
    /// True when `nonce + 1` lands on a hop boundary.
    #[inline]
    #[must_use]
    pub fn is_hop_slot(&self, nonce: u8) -> bool {
        self.hop_interval != 0 && nonce.wrapping_add(1) % self.hop_interval == 0
    }

    /// True when `nonce + 1` is a telemetry reply slot.
    #[inline]
    #[must_use]
    pub fn is_telemetry_slot(&self, nonce: u8) -> bool {
        self.telemetry_ratio != 0 && nonce.wrapping_add(1) % self.telemetry_ratio == 0
    }
}

/// Built-in profile table, fastest first.
pub const DEFAULT_AIR_RATES: [AirRateProfile; 3] = [
    AirRateProfile {
        id: 0,
        rate_hz: 200,
        modulation: ModulationParams {
            bandwidth: Bandwidth::Khz500,
            spreading_factor: 6,
            coding_rate: CodingRate::Cr4_5,
            preamble_len: 8,
        },
        frame_interval_us: 5000,
        hop_interval: 2,
        telemetry_ratio: 64,
        connection_timeout_ms: 1000,
        scan_dwell_ms: 1500,
        tentative_grace_ms: 1000,
    },
    AirRateProfile {
        id: 1,
        rate_hz: 100,
        modulation: ModulationParams {
            bandwidth: Bandwidth::Khz500,
            spreading_factor: 7,
            coding_rate: CodingRate::Cr4_7,
            preamble_len: 8,
        },
        frame_interval_us: 10000,
        hop_interval: 2,
        telemetry_ratio: 32,
        connection_timeout_ms: 2000,
        scan_dwell_ms: 2000,
        tentative_grace_ms: 2000,
    },
    AirRateProfile {
        id: 2,
        rate_hz: 50,
        modulation: ModulationParams {
            bandwidth: Bandwidth::Khz500,
            spreading_factor: 8,
            coding_rate: CodingRate::Cr4_7,
            preamble_len: 10,
        },
        frame_interval_us: 20000,
        hop_interval: 2,
        telemetry_ratio: 16,
        connection_timeout_ms: 6000,
        scan_dwell_ms: 2500,
        tentative_grace_ms: 6000,
    },
];

/// Owned copy of the built-in table, used as the config default.
#[must_use]
pub fn default_air_rates() -> Vec<AirRateProfile> {
    DEFAULT_AIR_RATES.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_ids_match_positions() {
        for (index, profile) in DEFAULT_AIR_RATES.iter().enumerate() {
            assert_eq!(profile.id as usize, index);
        }
    }

    #[test]
    fn test_interval_matches_rate() {
        for profile in DEFAULT_AIR_RATES.iter() {
            assert_eq!(profile.frame_interval_us, 1_000_000 / profile.rate_hz as u32);
        }
    }

    #[test]
    fn test_hop_slot() {
        let profile = DEFAULT_AIR_RATES[0];
        assert!(profile.is_hop_slot(1));
        assert!(!profile.is_hop_slot(2));
        assert!(profile.is_hop_slot(255)); // 255 + 1 wraps to 0
    }

    #[test]
    fn test_telemetry_slot() {
        let profile = DEFAULT_AIR_RATES[0];
        assert!(profile.is_telemetry_slot(63));
        assert!(!profile.is_telemetry_slot(64));
    }

    #[test]
    fn test_telemetry_disabled_never_fires() {
        let mut profile = DEFAULT_AIR_RATES[2];
        profile.telemetry_ratio = 0;
        assert!((0..=255u8).all(|n| !profile.is_telemetry_slot(n)));
    }

    #[test]
    fn test_profile_deserializes_from_toml() {
        let toml_content = r#"
id = 4
rate_hz = 25
frame_interval_us = 40000
hop_interval = 4
telemetry_ratio = 8
connection_timeout_ms = 100
scan_dwell_ms = 3000
tentative_grace_ms = 500

[modulation]
bandwidth = "khz250"
spreading_factor = 9
coding_rate = "cr4_8"
preamble_len = 12
"#;
        let profile: AirRateProfile = toml::from_str(toml_content).unwrap();
        assert_eq!(profile.id, 4);
        assert_eq!(profile.modulation.bandwidth.hz(), 250_000);
        assert_eq!(profile.modulation.coding_rate.denominator(), 8);
    }
}
