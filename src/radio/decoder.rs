/// Bresser 5-in-1 payload validation and decoding
use thiserror::Error;

use crate::models::Reading;
use crate::radio::{RawFrame, SYNC_BYTE};

// Protocol layout constants
const PAYLOAD_LEN: usize = 26;
const CHECK_LEN: usize = 13; // First half is the bitwise complement of the second
const CHECKSUM_OFFSET: usize = 13;
const WIND_SECTOR_DEG: f32 = 22.5; // 16 compass points

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("sync byte mismatch: got {0:#04x}")]
    SyncMismatch(u8),
    #[error("parity wrong at payload byte {offset}")]
    Parity { offset: usize },
    #[error("checksum wrong: actual {actual:#04x} != expected {expected:#04x}")]
    Checksum { actual: u8, expected: u8 },
    #[error("nibble {nibble:#x} at payload byte {offset} is not a decimal digit")]
    InvalidBcd { offset: usize, nibble: u8 },
}

/// Decode a received frame into a reading
///
/// The first byte must be the trailing sync byte; the remaining 26 bytes are
/// the payload handed to [`decode_payload`].
pub fn decode_frame(frame: &RawFrame) -> Result<Reading, DecodeError> {
    if frame[0] != SYNC_BYTE {
        return Err(DecodeError::SyncMismatch(frame[0]));
    }
    let mut payload = [0u8; PAYLOAD_LEN];
    payload.copy_from_slice(&frame[1..]);
    decode_payload(&payload)
}

/// Validate and decode a Bresser 5-in-1 payload
///
/// Payload layout (26 bytes, nibbles named high/low):
/// - Bytes 0-12: Bitwise complement of bytes 13-25
/// - Byte 13: Checksum, number of set bits in bytes 14-25
/// - Byte 14: Station ID
/// - Byte 15: Sensor type (low nibble)
/// - Byte 16: Wind gust, low 8 bits (1/10 m/s, binary)
/// - Byte 17: Wind direction (high nibble, 22.5° steps), wind gust high 4 bits (low nibble)
/// - Bytes 18-19: Wind average, BCD tens/units in byte 18, hundreds in low nibble of 19 (1/10 m/s)
/// - Bytes 20-21: Temperature, same BCD arrangement (1/10 °C)
/// - Byte 22: Humidity, two BCD digits (%)
/// - Bytes 23-24: Rain, same BCD arrangement as wind average (1/10 mm)
/// - Byte 25: Battery low (bit 7), temperature sign (low nibble, negative when non-zero)
///
/// # Arguments
/// * `payload` - The 26 payload bytes following the sync byte
///
/// # Returns
/// The decoded reading with pressure left at 0, or the first check that failed
pub fn decode_payload(payload: &[u8; PAYLOAD_LEN]) -> Result<Reading, DecodeError> {
    for offset in 0..CHECK_LEN {
        if payload[offset] ^ payload[offset + CHECK_LEN] != 0xFF {
            return Err(DecodeError::Parity { offset });
        }
    }

    let expected = payload[CHECKSUM_OFFSET];
    let actual = payload[CHECKSUM_OFFSET + 1..]
        .iter()
        .map(|b| b.count_ones())
        .sum::<u32>() as u8;
    if actual != expected {
        return Err(DecodeError::Checksum { actual, expected });
    }

    let mut temperature_raw = bcd3(payload, 20)? as i32;
    if payload[25] & 0x0F != 0 {
        temperature_raw = -temperature_raw;
    }

    let humidity = bcd2(payload, 22)? as u8;
    let wind_avg_raw = bcd3(payload, 18)?;
    let rain_raw = bcd3(payload, 23)?;

    // Gust MSBs sit in the low nibble of the direction byte, after the LSB byte
    let gust_raw = (u16::from(payload[17] & 0x0F) << 8) | u16::from(payload[16]);

    Ok(Reading {
        sensor_id: payload[14],
        sensor_type: payload[15] & 0x0F,
        temperature_c: temperature_raw as f32 / 10.0,
        humidity,
        wind_direction_deg: f32::from(payload[17] >> 4) * WIND_SECTOR_DEG,
        wind_gust_ms: f32::from(gust_raw) / 10.0,
        wind_avg_ms: f32::from(wind_avg_raw) / 10.0,
        rain_mm: f32::from(rain_raw) / 10.0,
        battery_low: payload[25] & 0x80 != 0,
        pressure_hpa: 0.0,
    })
}

fn digit(offset: usize, nibble: u8) -> Result<u16, DecodeError> {
    if nibble > 9 {
        return Err(DecodeError::InvalidBcd { offset, nibble });
    }
    Ok(u16::from(nibble))
}

/// Two BCD digits packed in one byte.
fn bcd2(payload: &[u8], offset: usize) -> Result<u16, DecodeError> {
    let byte = payload[offset];
    Ok(digit(offset, byte & 0x0F)? + digit(offset, byte >> 4)? * 10)
}

/// Two BCD digits at `offset` plus the hundreds digit in the low nibble of the next byte.
fn bcd3(payload: &[u8], offset: usize) -> Result<u16, DecodeError> {
    let hundreds = digit(offset + 1, payload[offset + 1] & 0x0F)?;
    Ok(bcd2(payload, offset)? + hundreds * 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::EXAMPLE_PAYLOAD as EXAMPLE;

    /// Recompute checksum and complement half after editing bytes 14-25.
    fn seal(mut payload: [u8; PAYLOAD_LEN]) -> [u8; PAYLOAD_LEN] {
        payload[CHECKSUM_OFFSET] = payload[14..].iter().map(|b| b.count_ones()).sum::<u32>() as u8;
        for i in 0..CHECK_LEN {
            payload[i] = !payload[i + CHECK_LEN];
        }
        payload
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn decodes_example_payload() {
        let reading = decode_payload(&EXAMPLE).unwrap();

        assert_eq!(reading.sensor_id, EXAMPLE[14]);
        assert_eq!(reading.sensor_type, 0);
        assert!(close(reading.temperature_c, 10.5));
        assert_eq!(reading.humidity, 89);
        assert!(close(reading.wind_direction_deg, 225.0));
        assert!(close(reading.wind_gust_ms, 2.0));
        assert!(close(reading.wind_avg_ms, 1.1));
        assert!(close(reading.rain_mm, 54.4));
        assert!(!reading.battery_low);
        assert_eq!(reading.pressure_hpa, 0.0);
    }

    #[test]
    fn decode_frame_checks_sync_byte() {
        let mut frame = [0u8; 27];
        frame[1..].copy_from_slice(&EXAMPLE);

        frame[0] = 0xAA;
        assert_eq!(decode_frame(&frame), Err(DecodeError::SyncMismatch(0xAA)));

        frame[0] = SYNC_BYTE;
        assert_eq!(decode_frame(&frame).unwrap().humidity, 89);
    }

    #[test]
    fn parity_error_reports_first_bad_offset() {
        for offset in 0..CHECK_LEN {
            let mut payload = EXAMPLE;
            payload[offset] ^= 0x01;
            assert_eq!(decode_payload(&payload), Err(DecodeError::Parity { offset }));
        }
    }

    #[test]
    fn parity_is_checked_before_checksum() {
        // Corrupt the mirrored data byte: both checks would fail, parity wins
        let mut payload = EXAMPLE;
        payload[20] ^= 0x10;
        assert_eq!(
            decode_payload(&payload),
            Err(DecodeError::Parity { offset: 7 })
        );
    }

    #[test]
    fn checksum_error_reports_counts() {
        let mut payload = EXAMPLE;
        payload[CHECKSUM_OFFSET] = 0x16;
        payload[0] = !0x16;

        assert_eq!(
            decode_payload(&payload),
            Err(DecodeError::Checksum {
                actual: 0x15,
                expected: 0x16
            })
        );
    }

    #[test]
    fn negative_temperature_and_low_battery() {
        let mut payload = EXAMPLE;
        payload[20] = 0x73; // 7.3
        payload[21] = 0x01; // 17.3
        payload[25] = 0x88; // battery low, sign set
        let reading = decode_payload(&seal(payload)).unwrap();

        assert!(close(reading.temperature_c, -17.3));
        assert!(reading.battery_low);
    }

    #[test]
    fn gust_uses_out_of_sequence_msb() {
        let mut payload = EXAMPLE;
        payload[16] = 0x76;
        payload[17] = 0x31; // ENE sector, gust MSB 1
        let reading = decode_payload(&seal(payload)).unwrap();

        assert!(close(reading.wind_gust_ms, 37.4));
        assert!(close(reading.wind_direction_deg, 67.5));
    }

    #[test]
    fn rejects_non_decimal_nibbles() {
        let mut payload = EXAMPLE;
        payload[22] = 0x8A;
        assert_eq!(
            decode_payload(&seal(payload)),
            Err(DecodeError::InvalidBcd {
                offset: 22,
                nibble: 0xA
            })
        );

        let mut payload = EXAMPLE;
        payload[24] = 0x0C;
        assert_eq!(
            decode_payload(&seal(payload)),
            Err(DecodeError::InvalidBcd {
                offset: 24,
                nibble: 0xC
            })
        );
    }
}
