//! Vector Store query DTOs for `POST /api/query/similar`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct SimilarQueryRequest {
    pub window_id: Uuid,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub filter: QueryFilter,
}

fn default_limit() -> u32 {
    10
}

/// Equality filter on payload fields: session_id and/or label.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryFilter {
    pub session_id: Option<Uuid>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarQueryResult {
    pub window_id: Uuid,
    pub session_id: Uuid,
    pub score: f32,
    pub start_time: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarQueryResponse {
    pub results: Vec<SimilarQueryResult>,
}
