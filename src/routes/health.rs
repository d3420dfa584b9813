use crate::error::WebhookResult;
use crate::state::EngineState;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use std::time::SystemTime;

/// Global server start time for uptime calculation
static SERVER_START_TIME: once_cell::sync::Lazy<SystemTime> =
    once_cell::sync::Lazy::new(SystemTime::now);

fn uptime_seconds() -> u64 {
    SERVER_START_TIME
        .elapsed()
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Health check endpoint (liveness)
/// Returns 200 if server is running
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "presspilot-engage",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
    }))
}

/// Readiness check endpoint
/// Returns 200 if server is ready to accept requests
pub async fn readiness_check(
    State(state): State<Arc<EngineState>>,
) -> WebhookResult<impl IntoResponse> {
    // A probe read proves the store is reachable; the key never exists.
    state.store.get("orgs/_probe/events/_probe").await?;

    Ok(Json(json!({
        "status": "ready",
        "service": "presspilot-engage",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
        "components": {
            "api": "ready",
            "store": "ready",
        }
    })))
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<EngineState>>) -> Response {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => Json(json!({
            "uptime_seconds": uptime_seconds(),
        }))
        .into_response(),
    }
}
