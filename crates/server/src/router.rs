//! HTTP router construction.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/health", get(api::health::health))
        .route("/queue/status", get(api::health::queue_status))
        .route("/runs", post(api::runs::process_run))
        .route("/runs/tasks/statuses", post(api::runs::statuses))
        .route("/runs/tasks/{id}/status", put(api::runs::change_status))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::permissive().allow_origin(value),
        Err(e) => {
            warn!(origin, error = %e, "Invalid CORS_ORIGIN, allowing any origin");
            CorsLayer::permissive()
        }
    }
}
