//! Edge -> server Socket.IO event payloads.
//!
//! Namespace `/iot`. `authenticate` must precede any data event; the server
//! replies `auth_success` or `auth_error`. Event names are frozen strings
//! used by both the edge's Socket.IO client and the server's Socket.IO
//! ingress router.

use serde::{Deserialize, Serialize};

pub const NAMESPACE: &str = "/iot";
pub const EVENT_AUTHENTICATE: &str = "authenticate";
pub const EVENT_AUTH_SUCCESS: &str = "auth_success";
pub const EVENT_AUTH_ERROR: &str = "auth_error";
pub const EVENT_FOOT_PRESSURE: &str = "foot_pressure_data";
pub const EVENT_ACCELEROMETER: &str = "accelerometer_data";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatePayload {
    pub device_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FootSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootPressureInner {
    pub foot: FootSide,
    pub max: f64,
    pub avg: f64,
    pub active_count: u8,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootPressureEvent {
    pub timestamp: String,
    pub device: String,
    pub data: FootPressureInner,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TripleJson {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AngleJson {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccelerometerInner {
    pub acc: TripleJson,
    pub gyro: TripleJson,
    pub angle: AngleJson,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccelerometerEvent {
    pub timestamp: String,
    pub device: String,
    pub data: AccelerometerInner,
}

impl From<&crate::reading::FootReading> for FootPressureEvent {
    fn from(r: &crate::reading::FootReading) -> Self {
        let side = match r.device {
            crate::reading::Device::LeftFoot => FootSide::Left,
            crate::reading::Device::RightFoot => FootSide::Right,
            crate::reading::Device::Accelerometer => {
                unreachable!("foot event built from non-foot reading")
            }
        };
        FootPressureEvent {
            timestamp: r.timestamp.clone(),
            device: r.device.as_str().to_owned(),
            data: FootPressureInner {
                foot: side,
                max: r.max,
                avg: r.avg,
                active_count: r.active_count,
                values: r.values.to_vec(),
            },
        }
    }
}

impl From<&crate::reading::AccelReading> for AccelerometerEvent {
    fn from(r: &crate::reading::AccelReading) -> Self {
        AccelerometerEvent {
            timestamp: r.timestamp.clone(),
            device: crate::reading::Device::Accelerometer.as_str().to_owned(),
            data: AccelerometerInner {
                acc: TripleJson {
                    x: r.acc.x,
                    y: r.acc.y,
                    z: r.acc.z,
                },
                gyro: TripleJson {
                    x: r.gyro.x,
                    y: r.gyro.y,
                    z: r.gyro.z,
                },
                angle: AngleJson {
                    roll: r.angle.x,
                    pitch: r.angle.y,
                    yaw: r.angle.z,
                },
            },
        }
    }
}
