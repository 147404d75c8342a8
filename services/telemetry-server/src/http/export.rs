use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use fireline_protocol::query::QueryFilter;
use serde::Deserialize;
use uuid::Uuid;

use crate::http::response::error_response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub include_raw: bool,
}

fn default_format() -> String {
    "json".to_owned()
}

/// `GET /api/sessions/{id}/export?format={json|csv}[&include_raw={true|false}]`
///
/// Streams every window recorded for the session (spec §6.4). `include_raw`
/// is accepted for forward compatibility with a future raw-reading export;
/// today only windows are persisted past session close.
pub async fn export(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<ExportParams>,
) -> impl IntoResponse {
    if let Err(resp) = state.sessions.get_summary(session_id).await {
        return error_response(resp.into()).into_response();
    }

    let filter = QueryFilter {
        session_id: Some(session_id),
        label: None,
    };

    let mut all = Vec::new();
    let mut cursor = None;
    loop {
        match state.vectors.scroll(&filter, 256, cursor.clone()).await {
            Ok((mut page, next)) => {
                let done = page.is_empty() || next.is_none();
                all.append(&mut page);
                if done {
                    break;
                }
                cursor = next;
            }
            Err(e) => return error_response(e.into()).into_response(),
        }
    }

    match params.format.as_str() {
        "csv" => {
            let mut buf = String::from("window_id,session_id,start_time,label\n");
            for w in &all {
                buf.push_str(&csv_field(&w.window_id.to_string()));
                buf.push(',');
                buf.push_str(&csv_field(&w.session_id.to_string()));
                buf.push(',');
                buf.push_str(&csv_field(&w.start_time));
                buf.push(',');
                buf.push_str(&csv_field(w.label.as_deref().unwrap_or("")));
                buf.push('\n');
            }
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
                .body(Body::from(buf))
                .unwrap()
                .into_response()
        }
        "json" => (StatusCode::OK, Json(all)).into_response(),
        other => crate::http::response::bad_request(format!("unknown export format {other}"))
            .into_response(),
    }
}

fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_owned()
    }
}
