//! # CRSF Protocol Constants and Types
//!
//! Core protocol definitions for the CRSF (Crossfire) frames sent to the
//! flight controller, plus the value mappings from link fields into the
//! CRSF channel range.

use serde::Serialize;

/// CRSF frame sync byte (flight controller address)
pub const CRSF_SYNC_BYTE: u8 = 0xC8;

/// RC Channels packet type
pub const CRSF_FRAMETYPE_RC_CHANNELS_PACKED: u8 = 0x16;

/// Link Statistics packet type
pub const CRSF_FRAMETYPE_LINK_STATISTICS: u8 = 0x14;

/// RC channels payload size (22 bytes for 16 channels × 11 bits)
pub const CRSF_RC_CHANNELS_PAYLOAD_SIZE: usize = 22;

/// RC channels frame length (type + payload + crc)
pub const CRSF_RC_CHANNELS_FRAME_LENGTH: u8 = 0x18; // 24 bytes

/// Link Statistics payload size
pub const CRSF_LINK_STATS_PAYLOAD_SIZE: usize = 10;

/// Link Statistics frame length (type + payload + crc)
pub const CRSF_LINK_STATS_FRAME_LENGTH: u8 = 0x0C; // 12 bytes

/// Number of RC channels
pub const CRSF_NUM_CHANNELS: usize = 16;

/// Raw 11-bit ceiling of a packed channel
pub const CRSF_CHANNEL_VALUE_RAW_MAX: u16 = 2047;

/// Channel values corresponding to 988 µs / 1000 µs / 1500 µs / 2000 µs / 2012 µs
pub const CRSF_CHANNEL_VALUE_MIN: u16 = 172;
pub const CRSF_CHANNEL_VALUE_1000: u16 = 191;
pub const CRSF_CHANNEL_VALUE_MID: u16 = 992;
pub const CRSF_CHANNEL_VALUE_2000: u16 = 1792;
pub const CRSF_CHANNEL_VALUE_MAX: u16 = 1811;

/// Channel carrying link quality
pub const CRSF_LQ_CHANNEL: usize = 14;

/// Channel carrying uplink RSSI
pub const CRSF_RSSI_CHANNEL: usize = 15;

/// First channel driven by switches
pub const CRSF_FIRST_SWITCH_CHANNEL: usize = 4;

/// RC channels array type (16 channels, 11-bit values)
pub type RcChannels = [u16; CRSF_NUM_CHANNELS];

/// Link statistics reported to the flight controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LinkStatistics {
    /// Uplink RSSI (antenna 1), positive dB above the noise floor
    pub uplink_rssi_1: u8,

    /// Uplink RSSI (antenna 2), 0 without diversity
    pub uplink_rssi_2: u8,

    /// Uplink link quality (0-100%)
    pub uplink_lq: u8,

    /// Uplink SNR in dB
    pub uplink_snr: i8,

    /// Active antenna (0 or 1)
    pub active_antenna: u8,

    /// RF mode / air rate profile id
    pub rf_mode: u8,

    /// Uplink TX power (encoded)
    pub uplink_tx_power: u8,

    /// Downlink RSSI
    pub downlink_rssi: u8,

    /// Downlink link quality (0-100%)
    pub downlink_lq: u8,

    /// Downlink SNR
    pub downlink_snr: i8,
}

impl LinkStatistics {
    /// Packs the statistics into the 10-byte CRSF payload.
    #[must_use]
    pub fn to_payload(&self) -> [u8; CRSF_LINK_STATS_PAYLOAD_SIZE] {
        [
            self.uplink_rssi_1,
            self.uplink_rssi_2,
            self.uplink_lq,
            self.uplink_snr as u8,
            self.active_antenna,
            self.rf_mode,
            self.uplink_tx_power,
            self.downlink_rssi,
            self.downlink_lq,
            self.downlink_snr as u8,
        ]
    }
}

/// Maps a 3-bit switch position into the CRSF channel range.
///
/// Positions 1-4 are spread linearly; 0 and 5 are the end stops and 6/7
/// sit at the middle.
///
/// # Examples
///
/// ```
/// use fpv_link_rx::crsf::protocol::*;
///
/// assert_eq!(switch3b_to_crsf(0), CRSF_CHANNEL_VALUE_1000);
/// assert_eq!(switch3b_to_crsf(5), CRSF_CHANNEL_VALUE_2000);
/// assert_eq!(switch3b_to_crsf(7), CRSF_CHANNEL_VALUE_MID);
/// ```
#[must_use]
pub fn switch3b_to_crsf(value: u8) -> u16 {
    match value {
        0 => CRSF_CHANNEL_VALUE_1000,
        5 => CRSF_CHANNEL_VALUE_2000,
        6 | 7 => CRSF_CHANNEL_VALUE_MID,
        v => u16::from(v) * 240 + 391,
    }
}

/// Maps a single switch bit to the end stops.
#[must_use]
pub fn bit_to_crsf(on: bool) -> u16 {
    if on {
        CRSF_CHANNEL_VALUE_2000
    } else {
        CRSF_CHANNEL_VALUE_1000
    }
}

/// Maps a 10-bit value (0-1023) into `[CRSF_CHANNEL_VALUE_MIN, CRSF_CHANNEL_VALUE_MAX]`.
#[must_use]
pub fn uint10_to_crsf(value: u16) -> u16 {
    let value = u32::from(value.min(1023));
    let span = u32::from(CRSF_CHANNEL_VALUE_MAX - CRSF_CHANNEL_VALUE_MIN);
    CRSF_CHANNEL_VALUE_MIN + (value * span / 1023) as u16
}

/// Maps an RSSI in dBm onto 0-1023 over the usable -100..-50 dBm span.
#[must_use]
pub fn rssi_dbm_to_uint10(rssi_dbm: i8) -> u16 {
    let clamped = i32::from(rssi_dbm).clamp(-100, -50);
    ((clamped + 100) * 1023 / 50) as u16
}

/// Maps a link quality percentage onto 0-1023.
#[must_use]
pub fn link_quality_to_uint10(lq: u8) -> u16 {
    (u32::from(lq.min(100)) * 1023 / 100) as u16
}
