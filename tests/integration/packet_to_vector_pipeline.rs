//! Cross-crate pipeline: raw BLE bytes (`fireline-parse`) through typed
//! readings (`fireline-protocol`) into the fixed 270-dim window vector.
//!
//! Exercises spec.md §8 S1/S2 (parser scenarios) and the §6.3 vector
//! layout end to end, the way a real Sensor Session -> Windowing Engine
//! handoff would, without any BLE transport or async runtime involved.

use fireline_parse::{parse_accel_frame, parse_foot_frame};
use fireline_protocol::reading::{AccelReading, Device, FootReading, FOOT_VALUES_LEN};
use fireline_protocol::vector::{materialize, VECTOR_LEN};
use fireline_test_support::{encode_accel_frame, encode_foot_frame};

#[test]
fn s1_all_zero_right_foot_frame_parses_to_zero_reading() {
    let frame =
        parse_foot_frame("R_[[0,0,0,0],[0,0,0,0],[0,0,0,0],[0,0,0,0],[0,0,0,0],[0,0,0,0]]").unwrap();
    assert_eq!(frame.device, Device::RightFoot);
    assert_eq!(frame.values, [0.0; FOOT_VALUES_LEN]);
    assert_eq!(frame.max, 0.0);
    assert_eq!(frame.avg, 0.0);
    assert_eq!(frame.active_count, 0);
}

#[test]
fn s2_accel_frame_scales_raw_16384_to_8g_on_z_axis() {
    let bytes: [u8; 20] = [
        0x55, 0x61, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    let frame = parse_accel_frame(&bytes).unwrap();
    assert_eq!(frame.acc.as_array(), [0.0, 0.0, 8.0]);
    assert_eq!(frame.gyro.as_array(), [0.0, 0.0, 0.0]);
    assert_eq!(frame.angle.as_array(), [0.0, 0.0, 0.0]);
}

/// One reading of each kind, parsed from raw bytes, lands in the exact
/// slots the §6.3 layout reserves for it once materialized.
#[test]
fn parsed_readings_land_in_their_reserved_vector_slots() {
    let left_digits: Vec<String> = (0..24).map(|i| i.to_string()).collect();
    let left_line = format!("L_[[{}]]", left_digits.join(","));
    let left_frame = parse_foot_frame(&left_line).unwrap();

    let right_line = left_line.replacen("L_", "R_", 1);
    let right_frame = parse_foot_frame(&right_line).unwrap();

    let accel_bytes: [u8; 20] = [
        0x55, 0x61, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    let accel_frame = parse_accel_frame(&accel_bytes).unwrap();

    let left_reading = FootReading {
        timestamp: "2026-01-01T00:00:00.000Z".to_owned(),
        device: left_frame.device,
        values: left_frame.values,
        max: left_frame.max,
        avg: left_frame.avg,
        active_count: left_frame.active_count,
    };
    let right_reading = FootReading {
        timestamp: "2026-01-01T00:00:00.000Z".to_owned(),
        device: right_frame.device,
        values: right_frame.values,
        max: right_frame.max,
        avg: right_frame.avg,
        active_count: right_frame.active_count,
    };
    let accel_reading = AccelReading {
        timestamp: "2026-01-01T00:00:00.000Z".to_owned(),
        acc: accel_frame.acc,
        gyro: accel_frame.gyro,
        angle: accel_frame.angle,
    };

    let vector = materialize(&[left_reading], &[right_reading], &[accel_reading]);

    assert_eq!(vector.len(), VECTOR_LEN);
    // Left foot occupies [0..18), right foot [90..108); both readings used
    // the same 18-value grid subsequence, so the two blocks are identical.
    assert_eq!(&vector[0..FOOT_VALUES_LEN], &vector[90..90 + FOOT_VALUES_LEN]);
    // Accel acc.x lands at [180..183).
    assert_eq!(vector[180], 8.0);
    assert_eq!(vector[181], 0.0);
    assert_eq!(vector[182], 0.0);
    // Everything past the single accel reading's slot stays zero-padded.
    assert!(vector[183..210].iter().all(|&v| v == 0.0));
}

/// P3: for every frame produced by the reference encoder, parsing it back
/// reproduces the original reading, modulo the documented rounding.
#[test]
fn p3_parser_round_trips_through_the_reference_encoder() {
    let values: [f64; FOOT_VALUES_LEN] = core::array::from_fn(|i| (i % 5) as f64);
    let encoded = encode_foot_frame(Device::LeftFoot, &values);
    let frame = parse_foot_frame(&encoded).unwrap();
    assert_eq!(frame.device, Device::LeftFoot);
    assert_eq!(frame.values, values);

    // Values chosen so the 16-bit raw round-trips exactly at the
    // documented precision (3dp acc, 2dp gyro/angle) -- not every
    // physical value survives the quantization losslessly.
    let acc = [1.0, -1.0, 8.0];
    let gyro = [250.0, -500.0, 1000.0];
    let angle = [90.0, -45.0, 30.0];
    let bytes = encode_accel_frame(acc, gyro, angle);
    let frame = parse_accel_frame(&bytes).unwrap();
    assert_eq!(frame.acc.as_array(), acc);
    assert_eq!(frame.gyro.as_array(), gyro);
    assert_eq!(frame.angle.as_array(), angle);
}
