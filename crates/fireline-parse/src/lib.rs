//! Pure packet parsers.
//!
//! Total functions: raw bytes/text in, a typed frame or a rejection out.
//! No state, no I/O -- the Sensor Session attaches timestamps and wraps
//! these into [`fireline_protocol::Reading`] values.

mod accel;
mod foot;

pub use accel::{parse_accel_frame, AccelFrame, FRAME_LEN as ACCEL_FRAME_LEN};
pub use foot::{parse_foot_frame, FootFrame};

use thiserror::Error;

/// Why a frame was rejected; always counted and dropped by the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("frame does not start with L_ or R_")]
    BadPrefix,
    #[error("expected {expected} comma-separated fields, got {actual}")]
    BadFieldCount { expected: usize, actual: usize },
    #[error("field is not a decimal: {0}")]
    BadDecimal(String),
    #[error("expected frame length {expected}, got {actual}")]
    BadLength { expected: usize, actual: usize },
    #[error("frame header does not match 0x55 0x61")]
    BadHeader,
}
