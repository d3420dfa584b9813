use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::store::StoreError;

pub type WebhookResult<T> = Result<T, WebhookError>;

/// Request-level error types
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Invalid webhook signature")]
    SignatureRejected,

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Not found")]
    NotFound,
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl WebhookError {
    /// Get HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::SignatureRejected => StatusCode::FORBIDDEN,
            WebhookError::NotFound => StatusCode::NOT_FOUND,
            WebhookError::Persistence(_) | WebhookError::Config(_) | WebhookError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get error code string
    fn error_code(&self) -> &'static str {
        match self {
            WebhookError::SignatureRejected => "SIGNATURE_REJECTED",
            WebhookError::Persistence(_) => "PERSISTENCE_ERROR",
            WebhookError::Config(_) => "CONFIG_ERROR",
            WebhookError::Internal(_) => "INTERNAL_ERROR",
            WebhookError::NotFound => "NOT_FOUND",
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code().to_string();
        let message = self.to_string();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<std::net::AddrParseError> for WebhookError {
    fn from(err: std::net::AddrParseError) -> Self {
        WebhookError::Config(format!("Invalid address: {err}"))
    }
}

impl From<std::io::Error> for WebhookError {
    fn from(err: std::io::Error) -> Self {
        WebhookError::Internal(format!("IO error: {err}"))
    }
}

impl From<anyhow::Error> for WebhookError {
    fn from(err: anyhow::Error) -> Self {
        WebhookError::Internal(err.to_string())
    }
}
