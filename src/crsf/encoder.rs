//! # CRSF Packet Encoder
//!
//! Encodes RC channels and link statistics into CRSF frames for the flight
//! controller.
//!
//! Every frame has the same envelope:
//!
//! ```text
//! sync(0xC8) | length | type | payload... | crc
//! ```
//!
//! `length` counts type + payload + crc, and the CRC covers type + payload.

use bytes::{BufMut, Bytes, BytesMut};

use super::protocol::*;
use crate::crc::crc8_dvb_s2;

/// Encode RC channels into a complete CRSF frame
///
/// # Arguments
///
/// * `channels` - Array of 16 channel values (11-bit: 0-2047)
///
/// # Returns
///
/// * `Bytes` - Complete CRSF frame (26 bytes: sync + length + type + 22-byte payload + crc)
///
/// # Examples
///
/// ```
/// use fpv_link_rx::crsf::encoder::encode_rc_channels_frame;
///
/// let channels = [992u16; 16]; // All channels at center
/// let frame = encode_rc_channels_frame(&channels);
/// assert_eq!(frame.len(), 26);
/// ```
pub fn encode_rc_channels_frame(channels: &RcChannels) -> Bytes {
    let payload = encode_rc_channels_payload(channels);
    seal_frame(
        CRSF_RC_CHANNELS_FRAME_LENGTH,
        CRSF_FRAMETYPE_RC_CHANNELS_PACKED,
        &payload,
    )
}

/// Encode link statistics into a complete CRSF frame (14 bytes)
pub fn encode_link_statistics_frame(stats: &LinkStatistics) -> Bytes {
    seal_frame(
        CRSF_LINK_STATS_FRAME_LENGTH,
        CRSF_FRAMETYPE_LINK_STATISTICS,
        &stats.to_payload(),
    )
}

/// Encode RC channels into payload (22 bytes)
///
/// Packs 16 channels (11 bits each) into 22 bytes using bit packing.
/// Channels are packed as a continuous bitstream, LSB first.
///
/// # Algorithm
///
/// Each channel is 11 bits (0-2047). Channels are packed LSB-first:
/// ```text
/// Byte 0: Ch1[0:7]
/// Byte 1: Ch1[8:10] | Ch2[0:4]
/// Byte 2: Ch2[5:10] | Ch3[0:1]
/// ...
/// ```
pub fn encode_rc_channels_payload(channels: &RcChannels) -> [u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE] {
    let mut payload = [0u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE];
    let mut bit_index = 0;

    for &channel in channels.iter() {
        let value = clamp_channel_value(channel);

        for bit in 0..11 {
            if (value >> bit) & 1 == 1 {
                payload[bit_index / 8] |= 1 << (bit_index % 8);
            }
            bit_index += 1;
        }
    }

    payload
}

/// Clamp a channel value to the raw 11-bit range (0-2047)
pub fn clamp_channel_value(value: u16) -> u16 {
    value.min(CRSF_CHANNEL_VALUE_RAW_MAX)
}

fn seal_frame(length: u8, frame_type: u8, payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(payload.len() + 4);
    frame.put_u8(CRSF_SYNC_BYTE);
    frame.put_u8(length);
    frame.put_u8(frame_type);
    frame.put_slice(payload);

    // CRC over Type + Payload
    let crc = crc8_dvb_s2(&frame[2..]);
    frame.put_u8(crc);
    frame.freeze()
}
