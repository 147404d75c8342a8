//! Shared test fixtures: reference encoders (the parsers' inverse) and
//! synthetic reading generators, used only from `[dev-dependencies]`.
//!
//! A small crate of fixture helpers shared across the workspace's test
//! suites rather than duplicated per-crate.

use fireline_protocol::{reading::FOOT_VALUES_LEN, Device};

/// Encode a foot frame the way a reference sensor firmware would, laying
/// 18 active values back onto the 24-slot grid with the excluded slots
/// filled with a sentinel (0.0, since foot pressure can't be negative in
/// practice and the parser does not special-case it either way).
pub fn encode_foot_frame(device: Device, values: &[f64; FOOT_VALUES_LEN]) -> String {
    const EXCLUDED: [usize; 6] = [8, 12, 16, 19, 20, 23];
    let mut grid = [0.0f64; 24];
    let mut active_i = 0;
    for i in 0..24 {
        if EXCLUDED.contains(&i) {
            continue;
        }
        grid[i] = values[active_i];
        active_i += 1;
    }
    let prefix = match device {
        Device::LeftFoot => "L_",
        Device::RightFoot => "R_",
        Device::Accelerometer => panic!("accelerometer has no foot frame encoding"),
    };
    let groups: Vec<String> = grid
        .chunks(4)
        .map(|chunk| {
            format!(
                "[{}]",
                chunk
                    .iter()
                    .map(format_decimal)
                    .collect::<Vec<_>>()
                    .join(",")
            )
        })
        .collect();
    format!("{prefix}[{}]", groups.join(","))
}

fn format_decimal(v: &f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", *v as i64)
    } else {
        format!("{v}")
    }
}

/// Encode a 20-byte accelerometer frame from physical units, inverting the
/// parser's `raw/32768 * range` scaling.
pub fn encode_accel_frame(acc: [f64; 3], gyro: [f64; 3], angle: [f64; 3]) -> [u8; 20] {
    let mut frame = [0u8; 20];
    frame[0] = 0x55;
    frame[1] = 0x61;

    let unscale = |v: f64, range: f64| -> i16 { ((v / range) * 32768.0).round() as i16 };

    let raws = [
        unscale(acc[0], 16.0),
        unscale(acc[1], 16.0),
        unscale(acc[2], 16.0),
        unscale(gyro[0], 2000.0),
        unscale(gyro[1], 2000.0),
        unscale(gyro[2], 2000.0),
        unscale(angle[0], 180.0),
        unscale(angle[1], 180.0),
        unscale(angle[2], 180.0),
    ];

    for (i, raw) in raws.iter().enumerate() {
        let bytes = raw.to_le_bytes();
        frame[2 + i * 2] = bytes[0];
        frame[2 + i * 2 + 1] = bytes[1];
    }

    frame
}

/// A deterministic synthetic foot reading for tests that don't care about
/// exact values, only shape.
pub fn synthetic_foot_values(fill: f64) -> [f64; FOOT_VALUES_LEN] {
    [fill; FOOT_VALUES_LEN]
}

#[cfg(test)]
mod tests {
    use super::*;
    use fireline_parse::{parse_accel_frame, parse_foot_frame};

    #[test]
    fn foot_frame_parse_inverts_encode() {
        let values: [f64; FOOT_VALUES_LEN] = core::array::from_fn(|i| i as f64);
        let encoded = encode_foot_frame(Device::LeftFoot, &values);
        let parsed = parse_foot_frame(&encoded).unwrap();
        assert_eq!(parsed.values, values);
    }

    #[test]
    fn accel_frame_parse_inverts_encode_modulo_rounding() {
        let acc = [1.0, -2.0, 8.0];
        let gyro = [10.0, -20.0, 30.0];
        let angle = [90.0, -45.0, 0.0];
        let encoded = encode_accel_frame(acc, gyro, angle);
        let parsed = parse_accel_frame(&encoded).unwrap();
        assert_eq!(parsed.acc.as_array(), acc);
        assert_eq!(parsed.gyro.as_array(), gyro);
        assert_eq!(parsed.angle.as_array(), angle);
    }
}
