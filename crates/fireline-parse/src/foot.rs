//! Foot pressure frame parser.
//!
//! Frame shape: `^[LR]_\[\[.*?\]\]\n$` -- prefix selects the device, the
//! remainder (brackets stripped) is exactly 24 comma-separated decimals laid
//! out on a 6x4 grid. 18 of those 24 positions are "active"; the other six
//! (indices 8, 12, 16, 19, 20, 23) are hardcoded dead slots on the hardware
//! and are dropped, in grid order.

use fireline_protocol::Device;

use crate::ParseError;

const GRID_LEN: usize = 24;
const EXCLUDED: [usize; 6] = [8, 12, 16, 19, 20, 23];

/// The 18 grid indices that carry real pressure values, in output order.
const fn active_indices() -> [usize; fireline_protocol::reading::FOOT_VALUES_LEN] {
    let mut out = [0usize; fireline_protocol::reading::FOOT_VALUES_LEN];
    let mut out_i = 0;
    let mut i = 0;
    while i < GRID_LEN {
        let mut excluded = false;
        let mut j = 0;
        while j < EXCLUDED.len() {
            if EXCLUDED[j] == i {
                excluded = true;
            }
            j += 1;
        }
        if !excluded {
            out[out_i] = i;
            out_i += 1;
        }
        i += 1;
    }
    out
}

const ACTIVE_INDICES: [usize; fireline_protocol::reading::FOOT_VALUES_LEN] = active_indices();

/// The parsed numeric content of a foot frame, with derived aggregates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootFrame {
    pub device: Device,
    pub values: [f64; fireline_protocol::reading::FOOT_VALUES_LEN],
    pub max: f64,
    pub avg: f64,
    pub active_count: u8,
}

/// Parse one complete foot-sensor text frame.
///
/// `line` must already have any trailing `\n` stripped by the caller (the
/// Sensor Session's fragmentation buffer splits on `\n` before calling
/// this). This function performs no I/O and holds no state.
pub fn parse_foot_frame(line: &str) -> Result<FootFrame, ParseError> {
    if let Some(rest) = line.strip_prefix("L_") {
        parse_body(Device::LeftFoot, rest)
    } else if let Some(rest) = line.strip_prefix("R_") {
        parse_body(Device::RightFoot, rest)
    } else {
        Err(ParseError::BadPrefix)
    }
}

fn parse_body(device: Device, rest: &str) -> Result<FootFrame, ParseError> {
    let stripped: String = rest.chars().filter(|c| *c != '[' && *c != ']').collect();
    let fields: Vec<&str> = stripped.split(',').map(str::trim).collect();
    if fields.len() != GRID_LEN {
        return Err(ParseError::BadFieldCount {
            expected: GRID_LEN,
            actual: fields.len(),
        });
    }

    let mut grid = [0.0f64; GRID_LEN];
    for (i, f) in fields.iter().enumerate() {
        grid[i] = f.parse::<f64>().map_err(|_| ParseError::BadDecimal(f.to_string()))?;
    }

    let mut values = [0.0f64; fireline_protocol::reading::FOOT_VALUES_LEN];
    for (out_i, &grid_i) in ACTIVE_INDICES.iter().enumerate() {
        values[out_i] = grid[grid_i];
    }

    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let sum: f64 = values.iter().sum();
    let avg = sum / values.len() as f64;
    let active_count = values.iter().filter(|&&v| v > 0.0).count() as u8;

    Ok(FootFrame {
        device,
        values,
        max,
        avg,
        active_count,
    })
}
