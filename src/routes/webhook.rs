//! Inbound email-engagement webhook endpoint.
//!
//! `POST /webhooks/email-events` receives a batch of engagement events
//! from the email provider. Flow: signature gate over the raw body, then
//! lenient parse (single object or array), per-event normalization with
//! failure isolation, and chunked atomic persistence. The only non-2xx
//! outcomes are 403 (signature) and 500 (a persistence chunk failed);
//! dropped events are not errors from the provider's point of view.

use crate::error::{WebhookError, WebhookResult};
use crate::normalize::normalize_batch;
use crate::persist::persist_events;
use crate::state::EngineState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Signature header set by the provider's event webhook.
pub const SIGNATURE_HEADER: &str = "x-twilio-email-event-webhook-signature";

/// Timestamp header covered by the signature.
pub const TIMESTAMP_HEADER: &str = "x-twilio-email-event-webhook-timestamp";

/// Response for an accepted batch
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Events that survived normalization and were committed
    pub processed: usize,
}

/// Receive a provider event batch.
pub async fn receive_events(
    State(state): State<Arc<EngineState>>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult<impl IntoResponse> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let timestamp = headers.get(TIMESTAMP_HEADER).and_then(|v| v.to_str().ok());

    // The signature covers the exact raw bytes; verify before any parsing.
    if !state.policy.allows(signature, timestamp, &body) {
        tracing::error!("Rejected webhook delivery with invalid signature");
        metrics::counter!("engage_signature_rejections").increment(1);
        return Err(WebhookError::SignatureRejected);
    }

    metrics::counter!("engage_batches").increment(1);
    let ingested_at = Utc::now();

    // The provider sends a single event object or an array of them. A
    // body that is neither is treated as an empty batch: dropped input
    // is an attribution/parse failure, not a fault worth a retry.
    let elements: Vec<Value> = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Array(items)) => items,
        Ok(object @ Value::Object(_)) => vec![object],
        Ok(_) | Err(_) => {
            tracing::warn!("Webhook body is not a JSON object or array; nothing to process");
            Vec::new()
        }
    };

    tracing::info!(events = elements.len(), "Processing webhook batch");

    let events = normalize_batch(elements, ingested_at);
    let processed = persist_events(state.store.as_ref(), &events).await?;

    tracing::info!(processed, "Webhook batch committed");
    Ok(Json(WebhookResponse { processed }))
}
