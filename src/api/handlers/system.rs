//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::HEALTH_PATH;
use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: String,
    version: &'static str,
    actions: usize,
    pages: usize,
    streams: usize,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, current timestamp and the size of the registry.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = &state.registry;
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: if state.shutdown.is_cancelled() {
                "draining"
            } else {
                "healthy"
            },
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
            actions: registry.action_names().len(),
            pages: registry.pages().len(),
            streams: registry.stream_names().len(),
        }),
    )
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route(HEALTH_PATH, get(health_handler))
}
