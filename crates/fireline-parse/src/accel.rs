//! Accelerometer frame parser.
//!
//! Fixed 20-byte frame: header `0x55 0x61`, then nine signed little-endian
//! 16-bit integers in the order (acc x, acc y, acc z, gyro x, gyro y,
//! gyro z, roll, pitch, yaw). Scaling: `acc = raw/32768 * 16`,
//! `gyro = raw/32768 * 2000`, `angle = raw/32768 * 180`. Rounded once here
//! (3dp acc, 2dp gyro/angle) so the rounding policy lives in exactly one
//! place.

use fireline_protocol::Triple;

use crate::ParseError;

pub const FRAME_LEN: usize = 20;
const HEADER: [u8; 2] = [0x55, 0x61];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelFrame {
    pub acc: Triple,
    pub gyro: Triple,
    pub angle: Triple,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn raw_i16_le(bytes: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

/// Parse one fixed-length 20-byte accelerometer frame.
pub fn parse_accel_frame(frame: &[u8]) -> Result<AccelFrame, ParseError> {
    if frame.len() != FRAME_LEN {
        return Err(ParseError::BadLength {
            expected: FRAME_LEN,
            actual: frame.len(),
        });
    }
    if frame[0..2] != HEADER {
        return Err(ParseError::BadHeader);
    }

    let raws: [i16; 9] = core::array::from_fn(|i| raw_i16_le(frame, 2 + i * 2));

    let scale = |raw: i16, range: f64, decimals: i32| -> f64 {
        round_to(raw as f64 / 32768.0 * range, decimals)
    };

    let acc = Triple::new(
        scale(raws[0], 16.0, 3),
        scale(raws[1], 16.0, 3),
        scale(raws[2], 16.0, 3),
    );
    let gyro = Triple::new(
        scale(raws[3], 2000.0, 2),
        scale(raws[4], 2000.0, 2),
        scale(raws[5], 2000.0, 2),
    );
    let angle = Triple::new(
        scale(raws[6], 180.0, 2),
        scale(raws[7], 180.0, 2),
        scale(raws[8], 180.0, 2),
    );

    Ok(AccelFrame { acc, gyro, angle })
}
