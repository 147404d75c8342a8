//! Frozen HTTP error envelope used by every non-2xx response the
//! telemetry server returns.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl crate::FirelineErrorKind {
    /// Maps a frozen error kind onto its `(code, http_status)` pair:
    /// Conflict/NotFound/SchemaMismatch map to 4xx, Transient to 5xx.
    pub fn http_code(&self) -> (&'static str, u16) {
        match self {
            crate::FirelineErrorKind::MalformedFrame(_) => ("MALFORMED_FRAME", 400),
            crate::FirelineErrorKind::Transient(_) => ("TRANSIENT", 503),
            crate::FirelineErrorKind::Fatal(_) => ("INTERNAL_ERROR", 500),
            crate::FirelineErrorKind::Conflict(_) => ("CONFLICT", 409),
            crate::FirelineErrorKind::NotFound(_) => ("NOT_FOUND", 404),
            crate::FirelineErrorKind::SchemaMismatch(_) => ("SCHEMA_MISMATCH", 400),
        }
    }
}
