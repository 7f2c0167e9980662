//! Health and queue status endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use runq_core::QueueCounts;
use runq_queue::QueueHealth;

use crate::state::AppState;

use super::{internal_error, ApiResult};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub profile: String,
    pub queue: QueueHealth,
    /// Active configuration with secrets left out.
    pub config: serde_json::Value,
}

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let queue = state.scheduler.health().await.map_err(internal_error)?;
    Ok(Json(HealthResponse {
        status: if queue.connected { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        profile: state.config.profile_label().to_string(),
        queue,
        config: state.config.redacted_summary(),
    }))
}

pub async fn queue_status(State(state): State<Arc<AppState>>) -> ApiResult<Json<QueueCounts>> {
    state
        .scheduler
        .counts()
        .await
        .map(Json)
        .map_err(internal_error)
}
