//! API route handlers
//!
//! - `webhook`: the inbound email-engagement intake endpoint
//! - `health`: health checks, readiness, and metrics

pub mod health;
pub mod webhook;

use crate::error::{WebhookError, WebhookResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// API version and base info
///
/// This is the root endpoint (GET /) and requires no authentication.
pub async fn api_info() -> WebhookResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "PressPilot Engage",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/webhooks/email-events",
            "/health",
            "/ready",
            "/metrics"
        ]
    })))
}

/// 404 Not Found handler
///
/// Returns a standardized error response for undefined routes.
pub async fn not_found() -> WebhookError {
    WebhookError::NotFound
}
