//! Run submission and run task status endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use runq_core::{JobId, JobStatus, RunSubmission, StatusChange, StatusInfo};
use runq_queue::ProcessRunResult;

use crate::state::AppState;

use super::{queue_error, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusRequest {
    pub status: JobStatus,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusesRequest {
    pub ids: Vec<JobId>,
}

/// Enqueue a run.
pub async fn process_run(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<RunSubmission>,
) -> ApiResult<Json<ProcessRunResult>> {
    state
        .scheduler
        .process_run(submission)
        .await
        .map(Json)
        .map_err(queue_error)
}

/// Move a run task to a new status. Unknown ids answer `{"success": false}`.
pub async fn change_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
    Json(req): Json<ChangeStatusRequest>,
) -> ApiResult<Json<StatusChange>> {
    state
        .scheduler
        .change_run_task_status(&id, req.status, &req.user_id)
        .await
        .map(Json)
        .map_err(queue_error)
}

pub async fn statuses(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StatusesRequest>,
) -> ApiResult<Json<Vec<StatusInfo>>> {
    state
        .scheduler
        .get_run_task_statuses(&req.ids)
        .await
        .map(Json)
        .map_err(queue_error)
}
