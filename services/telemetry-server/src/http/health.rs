use axum::{extract::State, response::IntoResponse, Json};
use fireline_protocol::health::HealthResponse;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let store_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let vector_store_ok = state.vectors.ensure_collection().await.is_ok();
    let active_session_id = state.sessions.active_session_id().await.unwrap_or(None);

    Json(HealthResponse {
        store_ok,
        vector_store_ok,
        active_session_id,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
