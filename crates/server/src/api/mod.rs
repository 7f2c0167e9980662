//! Route handlers and shared error helpers.

pub mod health;
pub mod runs;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use runq_queue::QueueError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

pub(crate) fn internal_error(e: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

pub(crate) fn conflict(msg: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::CONFLICT,
        Json(ErrorResponse { error: msg.into() }),
    )
}

/// Illegal transitions are the caller's fault; everything else is ours.
pub(crate) fn queue_error(e: QueueError) -> (StatusCode, Json<ErrorResponse>) {
    match e {
        QueueError::IllegalTransition { .. } => conflict(e.to_string()),
        other => {
            tracing::error!(error = %other, "Queue operation failed");
            internal_error(other)
        }
    }
}
