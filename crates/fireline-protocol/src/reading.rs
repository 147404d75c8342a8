//! Typed sensor readings.
//!
//! `Reading` is the tagged variant the rest of the system passes around
//! internally, in place of dynamically-typed dictionaries.

use serde::{Deserialize, Serialize};

/// Which physical sensor produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Device {
    LeftFoot,
    RightFoot,
    Accelerometer,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::LeftFoot => "LEFT_FOOT",
            Device::RightFoot => "RIGHT_FOOT",
            Device::Accelerometer => "ACCELEROMETER",
        }
    }
}

/// Number of active pressure positions per foot frame.
pub const FOOT_VALUES_LEN: usize = 18;

/// A parsed foot-pressure reading.
///
/// Invariants (enforced by the parser, not re-checked here): `max =
/// max(values)`, `avg = mean(values)`, `0 <= active_count <= 18`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootReading {
    pub timestamp: String,
    pub device: Device,
    pub values: [f64; FOOT_VALUES_LEN],
    pub max: f64,
    pub avg: f64,
    pub active_count: u8,
}

/// A three-axis triple (shared shape for acc/gyro/angle).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Triple {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Triple { x, y, z }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// A parsed 9-axis IMU reading.
///
/// `acc` ranges ±16g, `gyro` ranges ±2000 deg/s, `angle` ranges ±180 deg.
/// Rounding (3dp acc, 2dp gyro/angle) is applied once, by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccelReading {
    pub timestamp: String,
    pub acc: Triple,
    pub gyro: Triple,
    pub angle: Triple,
}

/// A reading from any of the three sensors, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Reading {
    Foot(FootReading),
    Accel(AccelReading),
}

impl Reading {
    pub fn device(&self) -> Device {
        match self {
            Reading::Foot(f) => f.device,
            Reading::Accel(_) => Device::Accelerometer,
        }
    }

    pub fn timestamp(&self) -> &str {
        match self {
            Reading::Foot(f) => &f.timestamp,
            Reading::Accel(a) => &a.timestamp,
        }
    }
}
