use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use fireline_protocol::query::{SimilarQueryRequest, SimilarQueryResponse};

use crate::http::response::error_response;
use crate::state::AppState;

pub async fn similar(
    State(state): State<AppState>,
    Json(req): Json<SimilarQueryRequest>,
) -> impl IntoResponse {
    match state
        .vectors
        .search(req.window_id, req.limit, &req.filter)
        .await
    {
        Ok(results) => (StatusCode::OK, Json(SimilarQueryResponse { results })).into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}
