//! # RF Frame Codec
//!
//! Mask-and-shift encode and decode of the 8-byte air frame.
//!
//! Decoding checks, in order: checksum, address, type-specific payload
//! rules. The first failure is returned and the frame is discarded.
//!
//! ## RC_DATA (11-bit)
//!
//! ```text
//! ch0 = p0 << 3 | (p4 & 0xE0) >> 5
//! ch1 = p1 << 3 | (p4 & 0x1C) >> 2
//! ch2 = p2 << 3 | (p4 & 0x03) << 1 | (p5 & 0x80) >> 7
//! ch3 = p3 << 3 | (p5 & 0x70) >> 4
//! aux = p5 & 0x0F   (bit 3 = aux0 ... bit 0 = aux3)
//! ```
//!
//! ## RC_DATA (10-bit)
//!
//! ```text
//! chN = ((pN << 2) | (p4 >> (6 - 2N)) & 0x03) << 1
//! ```

use crate::crc::frame_checksum;
use crate::identity::DeviceIdentity;

use super::frame::{
    ChannelResolution, DecodeError, FrameType, ParsedFrame, RawFrame, RcData, SwitchData,
    SyncData, TelemetryReply, CRC_COVERAGE, FRAME_LEN, PAYLOAD_LEN, RC_DATA_CHANNELS,
    SWITCH_COUNT, TYPE_MASK,
};

/// CRSF frame type echoed in the first byte of a telemetry reply payload.
pub const TELEMETRY_REPLY_KIND: u8 = 0x14;

/// Largest value a 3-bit switch can carry.
const SWITCH_MAX: u8 = 0b111;

/// Frame encoder/decoder bound to one device identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    address: u8,
    crc_offset: u8,
    resolution: ChannelResolution,
}

impl FrameCodec {
    /// Creates a codec for the given identity.
    ///
    /// # Examples
    ///
    /// ```
    /// use fpv_link_rx::identity::DeviceIdentity;
    /// use fpv_link_rx::rf::{ChannelResolution, FrameCodec, ParsedFrame};
    ///
    /// let id = DeviceIdentity::new([1, 2, 3, 4, 5, 6]);
    /// let codec = FrameCodec::new(&id, ChannelResolution::Bits11);
    ///
    /// let frame = codec.encode_sync(3, 17, 0, id.suffix());
    /// assert!(matches!(codec.decode(&frame), Ok(ParsedFrame::Sync(_))));
    /// ```
    #[must_use]
    pub fn new(identity: &DeviceIdentity, resolution: ChannelResolution) -> Self {
        Self {
            address: identity.address(),
            crc_offset: identity.crc_offset(),
            resolution,
        }
    }

    /// Address this codec accepts and stamps into headers.
    #[must_use]
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Channel layout used for RC_DATA.
    #[must_use]
    pub fn resolution(&self) -> ChannelResolution {
        self.resolution
    }

    /// Validates and unpacks one received frame.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::CrcMismatch`] when byte 7 does not match the checksum
    /// - [`DecodeError::AddressMismatch`] when the header addresses another device
    /// - [`DecodeError::RedundancyMismatch`] for a SWITCH_DATA frame whose copy
    ///   bytes disagree
    pub fn decode(&self, bytes: &RawFrame) -> Result<ParsedFrame, DecodeError> {
        let expected = frame_checksum(&bytes[..CRC_COVERAGE], self.crc_offset);
        let received = bytes[FRAME_LEN - 1];
        if expected != received {
            return Err(DecodeError::CrcMismatch { expected, received });
        }

        let header = bytes[0];
        let address = header >> 2;
        if address != self.address {
            return Err(DecodeError::AddressMismatch {
                expected: self.address,
                received: address,
            });
        }

        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&bytes[1..=PAYLOAD_LEN]);

        match FrameType::try_from(header & TYPE_MASK)? {
            FrameType::RcData => Ok(ParsedFrame::RcData(self.unpack_rc_data(&payload))),
            FrameType::SwitchData => unpack_switch_data(&payload).map(ParsedFrame::SwitchData),
            FrameType::Sync => Ok(ParsedFrame::Sync(SyncData {
                hop_index: payload[0],
                nonce: payload[1],
                rate_id: payload[2],
                uid_suffix: [payload[3], payload[4], payload[5]],
            })),
            FrameType::Telemetry => Ok(ParsedFrame::Telemetry(payload)),
        }
    }

    /// Builds a SYNC frame.
    #[must_use]
    pub fn encode_sync(&self, hop_index: u8, nonce: u8, rate_id: u8, uid_suffix: [u8; 3]) -> RawFrame {
        self.seal(
            FrameType::Sync,
            [
                hop_index,
                nonce,
                rate_id,
                uid_suffix[0],
                uid_suffix[1],
                uid_suffix[2],
            ],
        )
    }

    /// Builds the telemetry reply sent in the receiver's uplink slot.
    #[must_use]
    pub fn encode_telemetry_reply(&self, reply: &TelemetryReply) -> RawFrame {
        let [battery_hi, battery_lo] = reply.battery_voltage.to_be_bytes();
        self.seal(
            FrameType::Telemetry,
            [
                TELEMETRY_REPLY_KIND,
                reply.uplink_rssi,
                battery_hi,
                reply.uplink_snr as u8,
                reply.link_quality,
                battery_lo,
            ],
        )
    }

    /// Builds an RC_DATA frame in this codec's channel layout.
    ///
    /// Channels are masked to 11 bits. In the 10-bit layout the lowest bit of
    /// each channel is dropped and the aux bits are not carried.
    #[must_use]
    pub fn encode_rc_data(&self, channels: &[u16; RC_DATA_CHANNELS], aux_bits: [bool; 4]) -> RawFrame {
        let ch = channels.map(|c| c & 0x07FF);
        let payload = match self.resolution {
            ChannelResolution::Bits11 => {
                let aux = aux_bits
                    .iter()
                    .fold(0u8, |acc, &bit| (acc << 1) | u8::from(bit));
                [
                    (ch[0] >> 3) as u8,
                    (ch[1] >> 3) as u8,
                    (ch[2] >> 3) as u8,
                    (ch[3] >> 3) as u8,
                    ((ch[0] & 0x07) << 5 | (ch[1] & 0x07) << 2 | (ch[2] & 0x06) >> 1) as u8,
                    ((ch[2] & 0x01) << 7 | (ch[3] & 0x07) << 4) as u8 | aux,
                ]
            }
            ChannelResolution::Bits10 => {
                let ten = ch.map(|c| c >> 1);
                let low = ten
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (n, &c)| acc | ((c & 0x03) as u8) << (6 - 2 * n));
                [
                    (ten[0] >> 2) as u8,
                    (ten[1] >> 2) as u8,
                    (ten[2] >> 2) as u8,
                    (ten[3] >> 2) as u8,
                    low,
                    0,
                ]
            }
        };
        self.seal(FrameType::RcData, payload)
    }

    /// Builds a SWITCH_DATA frame. Switch values are masked to 3 bits.
    #[must_use]
    pub fn encode_switch_data(&self, switches: &[u8; SWITCH_COUNT], nonce: u8, hop_index: u8) -> RawFrame {
        let sw = switches.map(|s| s & SWITCH_MAX);
        let p0 = sw[0] << 5 | sw[1] << 2 | sw[2] >> 1;
        let p1 = (sw[2] & 0x01) << 7 | sw[3] << 4;
        self.seal(FrameType::SwitchData, [p0, p1, p0, p1, nonce, hop_index])
    }

    fn unpack_rc_data(&self, p: &[u8; PAYLOAD_LEN]) -> RcData {
        let wide = p.map(u16::from);
        let channels = match self.resolution {
            ChannelResolution::Bits11 => [
                wide[0] << 3 | (wide[4] & 0xE0) >> 5,
                wide[1] << 3 | (wide[4] & 0x1C) >> 2,
                wide[2] << 3 | (wide[4] & 0x03) << 1 | (wide[5] & 0x80) >> 7,
                wide[3] << 3 | (wide[5] & 0x70) >> 4,
            ],
            ChannelResolution::Bits10 => {
                let mut out = [0u16; RC_DATA_CHANNELS];
                for (n, slot) in out.iter_mut().enumerate() {
                    let low = (wide[4] >> (6 - 2 * n)) & 0x03;
                    *slot = (wide[n] << 2 | low) << 1;
                }
                out
            }
        };

        RcData {
            channels,
            aux_bits: [
                p[5] & 0x08 != 0,
                p[5] & 0x04 != 0,
                p[5] & 0x02 != 0,
                p[5] & 0x01 != 0,
            ],
        }
    }

    /// Stamps header and checksum around a payload.
    fn seal(&self, frame_type: FrameType, payload: [u8; PAYLOAD_LEN]) -> RawFrame {
        let mut frame = [0u8; FRAME_LEN];
        frame[0] = frame_type.header(self.address);
        frame[1..=PAYLOAD_LEN].copy_from_slice(&payload);
        frame[FRAME_LEN - 1] = frame_checksum(&frame[..CRC_COVERAGE], self.crc_offset);
        frame
    }
}

fn unpack_switch_data(p: &[u8; PAYLOAD_LEN]) -> Result<SwitchData, DecodeError> {
    if p[2] != p[0] || p[3] != p[1] {
        return Err(DecodeError::RedundancyMismatch);
    }

    Ok(SwitchData {
        switches: [
            (p[0] & 0xE0) >> 5,
            (p[0] & 0x1C) >> 2,
            (p[0] & 0x03) << 1 | (p[1] & 0x80) >> 7,
            (p[1] & 0x70) >> 4,
        ],
        nonce: p[4],
        hop_index: p[5],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> DeviceIdentity {
        DeviceIdentity::new([0xA0, 0xB1, 0xC2, 0xD3, 0x5A, 0x27])
    }

    fn codec() -> FrameCodec {
        FrameCodec::new(&identity(), ChannelResolution::Bits11)
    }

    /// Wraps an arbitrary header and payload with a valid checksum.
    fn raw_frame(header: u8, payload: [u8; PAYLOAD_LEN]) -> RawFrame {
        let mut frame = [0u8; FRAME_LEN];
        frame[0] = header;
        frame[1..7].copy_from_slice(&payload);
        frame[7] = frame_checksum(&frame[..7], identity().crc_offset());
        frame
    }

    // ==================== RC_DATA ====================

    #[test]
    fn test_rc_data_documented_layout() {
        let header = FrameType::RcData.header(identity().address());
        let frame = raw_frame(header, [0x10, 0x20, 0x30, 0x40, 0xE0, 0x00]);

        match codec().decode(&frame).unwrap() {
            ParsedFrame::RcData(rc) => {
                assert_eq!(rc.channels, [135, 256, 384, 512]);
                assert_eq!(rc.aux_bits, [false; 4]);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn test_rc_data_low_bits_and_aux() {
        let header = FrameType::RcData.header(identity().address());
        // p4 = 0b000_000_11, p5 = 0b1_101_1010
        let frame = raw_frame(header, [0, 0, 0, 0, 0x03, 0xDA]);

        let ParsedFrame::RcData(rc) = codec().decode(&frame).unwrap() else {
            panic!("expected RC data");
        };
        assert_eq!(rc.channels, [0, 0, 0b111, 0b101]);
        assert_eq!(rc.aux_bits, [true, false, true, false]);
    }

    #[test]
    fn test_rc_data_encode_matches_layout() {
        let codec = codec();
        let channels = [172, 992, 1811, 2047];
        let aux = [true, true, false, true];
        let frame = codec.encode_rc_data(&channels, aux);

        assert_eq!(frame[0] & TYPE_MASK, FrameType::RcData as u8);
        let ParsedFrame::RcData(rc) = codec.decode(&frame).unwrap() else {
            panic!("expected RC data");
        };
        assert_eq!(rc.channels, channels);
        assert_eq!(rc.aux_bits, aux);
    }

    #[test]
    fn test_rc_data_10bit_layout() {
        let codec = FrameCodec::new(&identity(), ChannelResolution::Bits10);
        let header = FrameType::RcData.header(identity().address());
        // low bits: ch0=0b11, ch1=0b00, ch2=0b10, ch3=0b01
        let frame = raw_frame(header, [0xFF, 0x00, 0x80, 0x01, 0b11_00_10_01, 0]);

        let ParsedFrame::RcData(rc) = codec.decode(&frame).unwrap() else {
            panic!("expected RC data");
        };
        assert_eq!(rc.channels, [2046, 0, 1028, 10]);
    }

    // ==================== SWITCH_DATA ====================

    #[test]
    fn test_switch_data_unpacks_switches_nonce_and_hop() {
        let codec = codec();
        let frame = codec.encode_switch_data(&[7, 2, 5, 1], 42, 9);

        let ParsedFrame::SwitchData(sw) = codec.decode(&frame).unwrap() else {
            panic!("expected switch data");
        };
        assert_eq!(sw.switches, [7, 2, 5, 1]);
        assert_eq!(sw.nonce, 42);
        assert_eq!(sw.hop_index, 9);
    }

    #[test]
    fn test_switch_data_redundancy_mismatch() {
        let header = FrameType::SwitchData.header(identity().address());
        let frame = raw_frame(header, [0xE4, 0x90, 0xE4, 0x91, 1, 2]);
        assert_eq!(codec().decode(&frame), Err(DecodeError::RedundancyMismatch));
    }

    // ==================== SYNC / TELEMETRY ====================

    #[test]
    fn test_sync_fields() {
        let codec = codec();
        let frame = codec.encode_sync(2, 5, 1, identity().suffix());
        assert_eq!(frame[1..7], [2, 5, 1, 0xD3, 0x5A, 0x27]);

        let ParsedFrame::Sync(sync) = codec.decode(&frame).unwrap() else {
            panic!("expected sync");
        };
        assert_eq!(sync.hop_index, 2);
        assert_eq!(sync.nonce, 5);
        assert_eq!(sync.rate_id, 1);
        assert_eq!(sync.uid_suffix, identity().suffix());
    }

    #[test]
    fn test_telemetry_reply_layout() {
        let reply = TelemetryReply {
            uplink_rssi: 87,
            uplink_snr: -4,
            link_quality: 99,
            battery_voltage: 0x0168,
        };
        let frame = codec().encode_telemetry_reply(&reply);
        assert_eq!(frame[0] & TYPE_MASK, FrameType::Telemetry as u8);
        assert_eq!(frame[1..7], [0x14, 87, 0x01, 0xFC, 99, 0x68]);
    }

    #[test]
    fn test_inbound_telemetry_is_passed_through() {
        let header = FrameType::Telemetry.header(identity().address());
        let payload = [1, 2, 3, 4, 5, 6];
        let frame = raw_frame(header, payload);
        assert_eq!(codec().decode(&frame), Ok(ParsedFrame::Telemetry(payload)));
    }

    // ==================== Validation ====================

    #[test]
    fn test_crc_checked_before_address() {
        let header = FrameType::Sync.header(identity().address() ^ 0x01);
        let mut frame = raw_frame(header, [0; 6]);
        frame[7] = frame[7].wrapping_add(1);
        assert!(matches!(
            codec().decode(&frame),
            Err(DecodeError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_address_mismatch() {
        let other = (identity().address() + 1) & 0x3F;
        let frame = raw_frame(FrameType::Sync.header(other), [0; 6]);
        assert_eq!(
            codec().decode(&frame),
            Err(DecodeError::AddressMismatch {
                expected: identity().address(),
                received: other,
            })
        );
    }

    #[test]
    fn test_any_single_bit_flip_is_rejected() {
        let codec = codec();
        let frame = codec.encode_sync(1, 2, 0, identity().suffix());
        for byte in 0..FRAME_LEN {
            for bit in 0..8 {
                let mut corrupted = frame;
                corrupted[byte] ^= 1 << bit;
                assert!(
                    codec.decode(&corrupted).is_err(),
                    "flip of byte {byte} bit {bit} accepted"
                );
            }
        }
    }

    #[test]
    fn test_exactly_one_checksum_byte_accepted() {
        let codec = codec();
        let frame = codec.encode_sync(1, 2, 0, identity().suffix());
        let expected = frame_checksum(&frame[..CRC_COVERAGE], identity().crc_offset());

        let accepted: Vec<u8> = (0..=u8::MAX)
            .filter(|&candidate| {
                let mut candidate_frame = frame;
                candidate_frame[FRAME_LEN - 1] = candidate;
                codec.decode(&candidate_frame).is_ok()
            })
            .collect();
        assert_eq!(accepted, vec![expected]);
    }

    #[test]
    fn test_foreign_crc_offset_rejected() {
        let other = DeviceIdentity::new([0xA0, 0xB1, 0xC2, 0xD3, 0x5B, 0x27]);
        let foreign = FrameCodec::new(&other, ChannelResolution::Bits11);
        let frame = foreign.encode_sync(0, 0, 0, other.suffix());
        assert!(matches!(
            codec().decode(&frame),
            Err(DecodeError::CrcMismatch { .. })
        ));
    }
}
