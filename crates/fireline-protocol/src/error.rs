//! The frozen, engine-neutral error taxonomy.
//!
//! Every component maps its internal failures onto one of these six kinds
//! at its public boundary. HTTP handlers map `Conflict`/`NotFound`/
//! `SchemaMismatch` to 4xx and `Transient` to 5xx.

use thiserror::Error;

/// One of the six frozen error categories.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FirelineErrorKind {
    /// A parser rejected a frame; counted and dropped, never fatal.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    /// Expected to recover on retry (BLE I/O, network I/O, store I/O).
    #[error("transient failure: {0}")]
    Transient(String),
    /// Unrecoverable for the affected component; peers continue.
    #[error("fatal: {0}")]
    Fatal(String),
    /// A session-state invariant would be violated (e.g. two recordings).
    #[error("conflict: {0}")]
    Conflict(String),
    /// Referenced session or window does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Vector length or payload shape disagreement.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
}
