//! HTTP contract tests for runq-server.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use runq_core::{Config, Job, JobDescriptor, JobId, JobStatus, QueueCounts};
use runq_queue::{
    BackingQueue, InMemoryQueue, InMemoryRunRegistry, QueueError, QueueHealth, RunScheduler,
    TransitionPolicy, WorkerQueue,
};
use runq_server::{build_router, AppState};

fn app_with(queue: Arc<dyn WorkerQueue>, policy: TransitionPolicy) -> Router {
    let registry = Arc::new(InMemoryRunRegistry::new());
    let scheduler = RunScheduler::new(queue, registry).with_policy(policy);
    let state = Arc::new(AppState {
        scheduler,
        config: Config::for_profile("apitest"),
    });
    build_router(state)
}

fn app() -> Router {
    app_with(Arc::new(InMemoryQueue::default()), TransitionPolicy::Permissive)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn submission(run_id: &str, run_from: &str) -> Value {
    json!({
        "runId": run_id,
        "routineId": "routine-1",
        "routineVersionId": "rv-1",
        "isNewRun": true,
        "runFrom": run_from,
        "userData": { "id": "user-1", "hasPremium": false },
        "config": { "isTimeSensitive": false }
    })
}

async fn enqueue(app: &Router, run_id: &str) -> String {
    let (status, body) = send(app, "POST", "/runs", Some(submission(run_id, "RunView"))).await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["id"].as_str().unwrap().to_string()
}

struct DownQueue;

#[async_trait]
impl BackingQueue for DownQueue {
    async fn submit(&self, _descriptor: JobDescriptor) -> Result<JobId, QueueError> {
        Err(QueueError::Connection("connection refused".into()))
    }

    async fn get_job(&self, _job_id: &str) -> Result<Option<Job>, QueueError> {
        Err(QueueError::Connection("connection refused".into()))
    }

    async fn set_status(
        &self,
        _namespace: &str,
        _job_id: &str,
        _status: JobStatus,
        _actor_id: &str,
    ) -> Result<bool, QueueError> {
        Err(QueueError::Connection("connection refused".into()))
    }

    async fn counts(&self) -> Result<QueueCounts, QueueError> {
        Err(QueueError::Connection("connection refused".into()))
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        Ok(QueueHealth {
            connected: false,
            provider: "down".into(),
            pending: None,
        })
    }
}

#[async_trait]
impl WorkerQueue for DownQueue {
    async fn claim_next(&self, _namespace: &str) -> Result<Option<Job>, QueueError> {
        Ok(None)
    }

    async fn complete(&self, _job_id: &str) -> Result<Option<JobStatus>, QueueError> {
        Ok(None)
    }

    async fn fail(&self, _job_id: &str, _error: &str) -> Result<Option<JobStatus>, QueueError> {
        Ok(None)
    }
}

// ── Health ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["queue"]["provider"], "memory");
    assert_eq!(body["profile"], "APITEST");
    assert_eq!(body["config"]["queue"]["backend"], "memory");
    assert!(body["config"]["postgres"].get("password").is_none());
}

#[tokio::test]
async fn test_health_reports_degraded_backend() {
    let app = app_with(Arc::new(DownQueue), TransitionPolicy::Permissive);
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
}

// ── Runs ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_process_run_and_queue_status() {
    let app = app();
    let (status, body) = send(&app, "POST", "/runs", Some(submission("run-1", "Api"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["data"]["id"].is_string());

    let (status, counts) = send(&app, "GET", "/queue/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(counts["scheduled"], 1);
}

#[tokio::test]
async fn test_process_run_rejected_is_500() {
    let app = app_with(Arc::new(DownQueue), TransitionPolicy::Permissive);
    let (status, body) = send(&app, "POST", "/runs", Some(submission("run-1", "Api"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_change_status() {
    let app = app();
    let id = enqueue(&app, "run-1").await;

    let uri = format!("/runs/tasks/{id}/status");
    let (status, body) = send(
        &app,
        "PUT",
        &uri,
        Some(json!({ "status": "Paused", "userId": "user-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
}

#[tokio::test]
async fn test_change_status_unknown_id_is_not_an_error() {
    let (status, body) = send(
        &app(),
        "PUT",
        "/runs/tasks/invalid-id/status",
        Some(json!({ "status": "Running", "userId": "user-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": false }));
}

#[tokio::test]
async fn test_change_status_unknown_status_is_422() {
    let app = app();
    let id = enqueue(&app, "run-1").await;
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/runs/tasks/{id}/status"),
        Some(json!({ "status": "Exploded", "userId": "user-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_strict_transition_is_409() {
    let app = app_with(Arc::new(InMemoryQueue::default()), TransitionPolicy::Strict);
    let id = enqueue(&app, "run-1").await;
    let uri = format!("/runs/tasks/{id}/status");

    let (status, _) = send(
        &app,
        "PUT",
        &uri,
        Some(json!({ "status": "Cancelled", "userId": "user-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "PUT",
        &uri,
        Some(json!({ "status": "Running", "userId": "user-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_statuses_batch() {
    let app = app();
    let id = enqueue(&app, "run-1").await;

    let (status, body) = send(
        &app,
        "POST",
        "/runs/tasks/statuses",
        Some(json!({ "ids": [id, "invalid-id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            { "id": id, "queueName": "run", "status": "Scheduled" },
            { "id": "invalid-id", "queueName": "run", "status": null }
        ])
    );

    let (status, body) = send(&app, "POST", "/runs/tasks/statuses", Some(json!({ "ids": [] }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}
