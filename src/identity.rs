//! # Device Identity
//!
//! The 6-byte unique identity shared by the bound transmitter and receiver.
//!
//! Every protocol parameter that has to be agreed on without ever being sent
//! over the air is derived from it:
//!
//! | Bytes | Use |
//! |-------|-----|
//! | `uid[2..6]` | Hop sequence seed (big-endian) |
//! | `uid[3..6]` | Identity suffix carried in SYNC frames |
//! | `uid[4]` | Additive CRC offset |
//! | `uid[5] & 0x3F` | 6-bit frame address |
//!
//! `uid[0..3]` is usually a vendor OUI and is not unique per device, which is
//! why the seed skips the first two bytes.

use serde::Deserialize;
use std::fmt;

/// Length of a device identity in bytes.
pub const UID_LEN: usize = 6;

/// Mask for the 6-bit address field of the frame header.
pub const ADDRESS_MASK: u8 = 0b0011_1111;

/// Immutable 6-byte device identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct DeviceIdentity([u8; UID_LEN]);

impl DeviceIdentity {
    /// Creates an identity from raw bytes.
    #[must_use]
    pub const fn new(uid: [u8; UID_LEN]) -> Self {
        Self(uid)
    }

    /// Raw identity bytes.
    #[must_use]
    pub const fn bytes(&self) -> &[u8; UID_LEN] {
        &self.0
    }

    /// 6-bit frame address (`uid[5]`, low 6 bits).
    #[must_use]
    pub const fn address(&self) -> u8 {
        self.0[5] & ADDRESS_MASK
    }

    /// Additive offset applied to the frame checksum.
    #[must_use]
    pub const fn crc_offset(&self) -> u8 {
        self.0[4]
    }

    /// Last three identity bytes, as carried in SYNC frames.
    #[must_use]
    pub const fn suffix(&self) -> [u8; 3] {
        [self.0[3], self.0[4], self.0[5]]
    }

    /// Seed for the hop sequence generator.
    #[must_use]
    pub const fn hop_seed(&self) -> u32 {
        u32::from_be_bytes([self.0[2], self.0[3], self.0[4], self.0[5]])
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self([0, 0, 0, 0, 0, 0])
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}
