//! `/health` response shape.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub store_ok: bool,
    pub vector_store_ok: bool,
    pub active_session_id: Option<Uuid>,
    pub version: &'static str,
    pub uptime_secs: u64,
}
