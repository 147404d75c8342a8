use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use fireline_protocol::query::QueryFilter;
use fireline_protocol::session::{CreateSessionRequest, SessionDetail, UpdateSessionRequest};
use fireline_protocol::FirelineErrorKind;
use uuid::Uuid;

use crate::http::response::error_response;
use crate::session_registry::SessionRegistryError;
use crate::state::AppState;

pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> impl IntoResponse {
    match state.sessions.create(&body.name, body.activity_type).await {
        Ok(summary) => {
            // Register the new session's created_at with the Windowing
            // Engine so it starts bucketing readings for it immediately.
            if let Ok(created_at) = summary.created_at.parse() {
                state.windowing.session_started(summary.id, created_at);
            }
            (StatusCode::CREATED, Json(summary)).into_response()
        }
        Err(e) => error_response(e.into()).into_response(),
    }
}

pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    match state.sessions.list().await {
        Ok(sessions) => (StatusCode::OK, Json(sessions)).into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}

/// Composes the session's Postgres-backed metadata with window/reading
/// counts scrolled out of the Vector Store Facade -- `window_labels` only
/// holds explicitly labeled windows, so the registry alone cannot answer
/// this (spec §6.4 session-detail counts).
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let summary = match state.sessions.get_summary(id).await {
        Ok(summary) => summary,
        Err(e) => return error_response(e.into()).into_response(),
    };

    let counts = match state.vectors.count_windows(id).await {
        Ok(counts) => counts,
        Err(e) => return error_response(FirelineErrorKind::from(e)).into_response(),
    };

    let detail = SessionDetail {
        summary,
        window_count: counts.window_count,
        foot_reading_count: counts.foot_reading_count,
        accel_reading_count: counts.accel_reading_count,
    };
    (StatusCode::OK, Json(detail)).into_response()
}

/// `PUT /api/sessions/{id}`: updates name/activity_type and, when present,
/// attaches window labels -- the single endpoint spec §6.4 lists for both.
/// Labels are written through to both the Postgres `window_labels` table
/// and the matching Qdrant points' `label` payload field, since `scroll`
/// and `search` read `label` from the vector store, not Postgres.
pub async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateSessionRequest>,
) -> impl IntoResponse {
    let summary = match state
        .sessions
        .update(id, body.name.as_deref(), body.activity_type)
        .await
    {
        Ok(summary) => summary,
        Err(e) => return error_response(e.into()).into_response(),
    };

    let Some(labels) = body.labels else {
        return (StatusCode::OK, Json(summary)).into_response();
    };
    let labels: Vec<(Uuid, String)> = labels
        .into_iter()
        .map(|l| (l.window_id, l.label))
        .collect();

    if let Err(e) = state.sessions.update_labels(id, &labels).await {
        return error_response(e.into()).into_response();
    }
    for (window_id, label) in &labels {
        if let Err(e) = state.vectors.set_label(*window_id, label).await {
            return error_response(FirelineErrorKind::from(e)).into_response();
        }
    }

    (StatusCode::OK, Json(summary)).into_response()
}

pub async fn stop_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.sessions.stop(id).await {
        Ok(summary) => {
            state.windowing.session_stopped(id);
            (StatusCode::OK, Json(summary)).into_response()
        }
        Err(e) => error_response(e.into()).into_response(),
    }
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err(e) = state
        .vectors
        .delete_by(&QueryFilter {
            session_id: Some(id),
            label: None,
        })
        .await
    {
        return error_response(FirelineErrorKind::from(e)).into_response();
    }

    match state.sessions.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e @ SessionRegistryError::NotFound(_)) => error_response(e.into()).into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}
