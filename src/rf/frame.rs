//! # RF Frame Types and Constants
//!
//! Every over-the-air frame is exactly 8 bytes:
//!
//! ```text
//! +--------+----------------------------------+-----+
//! | header |            payload[6]            | crc |
//! +--------+----------------------------------+-----+
//!   byte 0            bytes 1..=6              byte 7
//!
//! header = address(6 bits) << 2 | type(2 bits)
//! ```

use thiserror::Error;

/// Total frame length in bytes.
pub const FRAME_LEN: usize = 8;

/// Payload length in bytes.
pub const PAYLOAD_LEN: usize = 6;

/// Number of bytes covered by the checksum.
pub const CRC_COVERAGE: usize = FRAME_LEN - 1;

/// Mask of the 2-bit frame type in the header.
pub const TYPE_MASK: u8 = 0b0000_0011;

/// Raw 8-byte frame.
pub type RawFrame = [u8; FRAME_LEN];

/// Analog channels carried per RC_DATA frame.
pub const RC_DATA_CHANNELS: usize = 4;

/// Switch values carried per SWITCH_DATA frame.
pub const SWITCH_COUNT: usize = 4;

/// Frame type carried in the low two bits of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Four analog channels
    RcData = 0b00,
    /// Auxiliary switches plus nonce and hop index
    SwitchData = 0b01,
    /// Hop index, nonce and identity for synchronization
    Sync = 0b10,
    /// Telemetry (reply from the receiver, or reserved inbound)
    Telemetry = 0b11,
}

impl FrameType {
    /// Builds a header byte for this type.
    #[must_use]
    pub const fn header(self, address: u8) -> u8 {
        (address << 2) | self as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0b00 => Ok(FrameType::RcData),
            0b01 => Ok(FrameType::SwitchData),
            0b10 => Ok(FrameType::Sync),
            0b11 => Ok(FrameType::Telemetry),
            other => Err(DecodeError::UnknownFrameType(other)),
        }
    }
}

/// Why a received frame was dropped.
///
/// All variants are routine on a noisy link: the frame is discarded, a
/// counter is bumped, and nothing else changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("CRC mismatch: expected 0x{expected:02X}, got 0x{received:02X}")]
    CrcMismatch { expected: u8, received: u8 },

    #[error("address mismatch: expected {expected}, got {received}")]
    AddressMismatch { expected: u8, received: u8 },

    #[error("switch payload redundancy bytes disagree")]
    RedundancyMismatch,

    #[error("unknown frame type {0}")]
    UnknownFrameType(u8),
}

/// Bit depth used for RC_DATA analog channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
pub enum ChannelResolution {
    /// 11-bit channels (native)
    #[default]
    #[serde(rename = "11bit")]
    Bits11,
    /// 10-bit channels scaled up to the 11-bit range
    #[serde(rename = "10bit")]
    Bits10,
}

/// Decoded RC_DATA payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RcData {
    /// Analog channels, 0-2047
    pub channels: [u16; RC_DATA_CHANNELS],
    /// 1-bit aux switches from the low nibble of the last payload byte
    pub aux_bits: [bool; 4],
}

/// Decoded SWITCH_DATA payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchData {
    /// 3-bit switch positions (0-7)
    pub switches: [u8; SWITCH_COUNT],
    pub nonce: u8,
    pub hop_index: u8,
}

/// Decoded SYNC payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncData {
    pub hop_index: u8,
    pub nonce: u8,
    /// Air rate profile the transmitter is running
    pub rate_id: u8,
    /// Last three bytes of the transmitter identity
    pub uid_suffix: [u8; 3],
}

/// Fields of an outgoing telemetry reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetryReply {
    pub uplink_rssi: u8,
    pub uplink_snr: i8,
    pub link_quality: u8,
    /// Battery voltage in centivolts, 0 when not measured
    pub battery_voltage: u16,
}

/// Successfully decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedFrame {
    RcData(RcData),
    SwitchData(SwitchData),
    Sync(SyncData),
    /// Inbound telemetry has no defined meaning; the payload is kept as-is
    Telemetry([u8; PAYLOAD_LEN]),
}

impl ParsedFrame {
    /// Wire type of this frame.
    #[must_use]
    pub fn frame_type(&self) -> FrameType {
        match self {
            ParsedFrame::RcData(_) => FrameType::RcData,
            ParsedFrame::SwitchData(_) => FrameType::SwitchData,
            ParsedFrame::Sync(_) => FrameType::Sync,
            ParsedFrame::Telemetry(_) => FrameType::Telemetry,
        }
    }
}
