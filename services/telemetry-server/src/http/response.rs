use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fireline_protocol::{FirelineErrorKind, HttpErrorEnvelope};
use std::fmt::Display;

pub type HttpResult<T> = Result<T, Response>;

fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(HttpErrorEnvelope {
            code: code.to_owned(),
            message: message.into(),
            details: None,
        }),
    )
        .into_response()
}

pub fn bad_request(message: impl Into<String>) -> Response {
    json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
}

pub fn internal_error(err: impl Display) -> Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", err.to_string())
}

/// Maps the frozen error taxonomy onto the HTTP status/code pair used by
/// every route in this service (spec §7).
pub fn error_response(kind: FirelineErrorKind) -> Response {
    let (code, status) = kind.http_code();
    let message = kind.to_string();
    json_error(
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        code,
        message,
    )
}
