//! # CRC8-DVB-S2
//!
//! One checksum serves both links:
//!
//! - the over-the-air frame, where the result is shifted by a per-device
//!   offset before it is written to byte 7 ([`frame_checksum`]),
//! - the CRSF frames sent to the flight controller ([`crc8_dvb_s2`]).
//!
//! **Polynomial**: 0xD5 (x^8 + x^7 + x^6 + x^4 + x^2 + 1)
//! **Initial Value**: 0x00

/// CRC-8-DVB-S2 polynomial
const CRC8_POLY: u8 = 0xD5;

/// Precomputed CRC8 lookup table
const CRC8_TABLE: [u8; 256] = generate_crc8_table();

/// Generate CRC8 lookup table at compile time
const fn generate_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Calculate CRC8-DVB-S2 checksum using the lookup table.
///
/// # Examples
///
/// ```
/// use fpv_link_rx::crc::crc8_dvb_s2;
///
/// assert_eq!(crc8_dvb_s2(&[]), 0x00);
/// assert_ne!(crc8_dvb_s2(&[0x18, 0x16]), 0x00);
/// ```
pub fn crc8_dvb_s2(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |crc, &byte| CRC8_TABLE[(crc ^ byte) as usize])
}

/// Checksum of an RF frame body with the additive offset applied.
///
/// The offset only keeps differently-bound links from accepting each other's
/// frames by accident. It adds no integrity beyond the CRC itself.
///
/// # Arguments
///
/// * `body` - First seven bytes of the frame (header + payload)
/// * `offset` - Per-device additive constant
#[inline]
pub fn frame_checksum(body: &[u8], offset: u8) -> u8 {
    crc8_dvb_s2(body).wrapping_add(offset)
}

/// Bitwise reference implementation, used to cross-check the table.
#[cfg(test)]
fn crc8_dvb_s2_slow(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;

    for &byte in data {
        crc ^= byte;

        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_empty() {
        assert_eq!(crc8_dvb_s2(&[]), 0x00);
    }

    #[test]
    fn test_crc8_lookup_table_matches_slow() {
        let test_data = [
            vec![0x01, 0x02, 0x03],
            vec![0xFF, 0xFE, 0xFD],
            vec![0x18, 0x16, 0xE0, 0x03],
            vec![0x00; 24],
            vec![0xFF; 10],
            vec![0x9A, 0x10, 0x20, 0x30, 0x40, 0xE0, 0x00],
        ];

        for data in test_data.iter() {
            assert_eq!(
                crc8_dvb_s2(data),
                crc8_dvb_s2_slow(data),
                "CRC mismatch for data: {:?}",
                data
            );
        }
    }

    #[test]
    fn test_frame_checksum_applies_offset() {
        let body = [0x9A, 0x10, 0x20, 0x30, 0x40, 0xE0, 0x00];
        let plain = crc8_dvb_s2(&body);
        assert_eq!(frame_checksum(&body, 0), plain);
        assert_eq!(frame_checksum(&body, 0x50), plain.wrapping_add(0x50));
        assert_eq!(frame_checksum(&body, 0xFF), plain.wrapping_sub(1));
    }

    #[test]
    fn test_every_single_bit_flip_changes_checksum() {
        let body = [0x9A, 0x10, 0x20, 0x30, 0x40, 0xE0, 0x00];
        let reference = frame_checksum(&body, 0x37);

        for byte in 0..body.len() {
            for bit in 0..8 {
                let mut corrupted = body;
                corrupted[byte] ^= 1 << bit;
                assert_ne!(
                    frame_checksum(&corrupted, 0x37),
                    reference,
                    "flip of byte {} bit {} went undetected",
                    byte,
                    bit
                );
            }
        }
    }
}
