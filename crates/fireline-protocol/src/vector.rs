//! The fixed 270-dimension window vector layout.
//!
//! ```text
//! [  0 ..  90) left foot:  5 readings x 18 pressure values
//! [ 90 .. 180) right foot: 5 readings x 18 pressure values
//! [180 .. 210) accel:      10 readings x (acc.x, acc.y, acc.z)
//! [210 .. 240) accel:      10 readings x (gyro.x, gyro.y, gyro.z)
//! [240 .. 270) accel:      10 readings x (roll, pitch, yaw)
//! ```
//! Missing slots are zero-filled. This layout is pinned; do not reorder.

use crate::reading::{AccelReading, FootReading};

pub const FOOT_SLOTS: usize = 5;
pub const ACCEL_SLOTS: usize = 10;
pub const VECTOR_LEN: usize = 270;

const FOOT_BLOCK_LEN: usize = FOOT_SLOTS * crate::reading::FOOT_VALUES_LEN; // 90
const ACCEL_BLOCK_LEN: usize = ACCEL_SLOTS * 3; // 30

const LEFT_FOOT_START: usize = 0;
const RIGHT_FOOT_START: usize = FOOT_BLOCK_LEN; // 90
const ACC_START: usize = 2 * FOOT_BLOCK_LEN; // 180
const GYRO_START: usize = ACC_START + ACCEL_BLOCK_LEN; // 210
const ANGLE_START: usize = GYRO_START + ACCEL_BLOCK_LEN; // 240

const _: () = assert!(ANGLE_START + ACCEL_BLOCK_LEN == VECTOR_LEN);

/// Materialize the 270-dim vector for one window.
///
/// Takes the first [`FOOT_SLOTS`] readings per foot (in time order) and the
/// first [`ACCEL_SLOTS`] accel readings; fewer readings than the slot count
/// zero-pad the remaining positions. Extra readings beyond the slot count
/// are ignored by the caller's bucket-closure logic, not here -- this
/// function only lays out whatever slice it is given.
pub fn materialize(
    left_foot: &[FootReading],
    right_foot: &[FootReading],
    accel: &[AccelReading],
) -> [f64; VECTOR_LEN] {
    let mut v = [0.0f64; VECTOR_LEN];

    write_foot_block(&mut v, LEFT_FOOT_START, left_foot);
    write_foot_block(&mut v, RIGHT_FOOT_START, right_foot);

    for (i, r) in accel.iter().take(ACCEL_SLOTS).enumerate() {
        let acc = r.acc.as_array();
        let gyro = r.gyro.as_array();
        let angle = r.angle.as_array();
        v[ACC_START + i * 3..ACC_START + i * 3 + 3].copy_from_slice(&acc);
        v[GYRO_START + i * 3..GYRO_START + i * 3 + 3].copy_from_slice(&gyro);
        v[ANGLE_START + i * 3..ANGLE_START + i * 3 + 3].copy_from_slice(&angle);
    }

    v
}

fn write_foot_block(v: &mut [f64; VECTOR_LEN], start: usize, readings: &[FootReading]) {
    for (i, r) in readings.iter().take(FOOT_SLOTS).enumerate() {
        let base = start + i * crate::reading::FOOT_VALUES_LEN;
        v[base..base + crate::reading::FOOT_VALUES_LEN].copy_from_slice(&r.values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::{Device, Triple};

    fn foot(device: Device, fill: f64) -> FootReading {
        FootReading {
            timestamp: "2026-01-01T00:00:00.000Z".to_owned(),
            device,
            values: [fill; crate::reading::FOOT_VALUES_LEN],
            max: fill,
            avg: fill,
            active_count: if fill > 0.0 { 18 } else { 0 },
        }
    }

    fn accel(fill: f64) -> AccelReading {
        AccelReading {
            timestamp: "2026-01-01T00:00:00.000Z".to_owned(),
            acc: Triple::new(fill, fill, fill),
            gyro: Triple::new(fill, fill, fill),
            angle: Triple::new(fill, fill, fill),
        }
    }

    #[test]
    fn empty_window_is_all_zero_and_right_length() {
        let v = materialize(&[], &[], &[]);
        assert_eq!(v.len(), VECTOR_LEN);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn partial_left_foot_only_fills_its_slots_and_leaves_rest_zero() {
        let readings = vec![foot(Device::LeftFoot, 1.0), foot(Device::LeftFoot, 2.0)];
        let v = materialize(&readings, &[], &[]);
        assert_eq!(v[0], 1.0);
        assert_eq!(v[crate::reading::FOOT_VALUES_LEN], 2.0);
        // Third left-foot slot and everything else is zero.
        assert_eq!(v[2 * crate::reading::FOOT_VALUES_LEN], 0.0);
        assert!(v[RIGHT_FOOT_START..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn accel_block_ordering_is_acc_then_gyro_then_angle() {
        let readings = vec![accel(7.0)];
        let v = materialize(&[], &[], &readings);
        assert_eq!(&v[ACC_START..ACC_START + 3], &[7.0, 7.0, 7.0]);
        assert_eq!(&v[GYRO_START..GYRO_START + 3], &[7.0, 7.0, 7.0]);
        assert_eq!(&v[ANGLE_START..ANGLE_START + 3], &[7.0, 7.0, 7.0]);
    }

    #[test]
    fn excess_readings_beyond_slot_count_are_ignored() {
        let readings: Vec<FootReading> = (0..8).map(|i| foot(Device::RightFoot, i as f64)).collect();
        let v = materialize(&[], &readings, &[]);
        // Only the first 5 make it in; slot 5 isn't position 5*18 from readings[5].
        assert_eq!(v[RIGHT_FOOT_START], 0.0);
        assert_eq!(v[RIGHT_FOOT_START + 4 * crate::reading::FOOT_VALUES_LEN], 4.0);
    }
}
