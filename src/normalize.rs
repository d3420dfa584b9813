//! Per-event normalization and validation.
//!
//! Each batch element is normalized independently. An element that cannot
//! be normalized is skipped with a named reason; it never aborts its
//! siblings and never surfaces as an HTTP error. Absence of persisted
//! events is a normal outcome, not a failure.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::dedup::dedup_key;
use crate::event::{validate_timestamp, EngagementEvent, EventType, InboundEvent};

/// Why a batch element was skipped instead of persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The element did not deserialize as a provider event at all.
    MalformedElement,
    /// No recipient email.
    MissingEmail,
    /// No provider event label.
    MissingEventType,
    /// Neither top-level nor `custom_args` attribution resolved.
    UnresolvedAttribution,
    /// The provider label is outside the canonical vocabulary.
    UnrecognizedEventType,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MalformedElement => "malformed_element",
            SkipReason::MissingEmail => "missing_email",
            SkipReason::MissingEventType => "missing_event_type",
            SkipReason::UnresolvedAttribution => "unresolved_attribution",
            SkipReason::UnrecognizedEventType => "unrecognized_event_type",
        }
    }
}

/// Treat empty strings as absent, matching what the provider echoes back
/// when a send carried blank attribution.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Resolve `(tenant_id, campaign_id)`: top-level fields win, then the
/// `custom_args` echo. Both must resolve or the event is unattributable.
fn resolve_attribution(event: &InboundEvent) -> Option<(String, String)> {
    let custom = event.custom_args.as_ref();
    let tenant = non_empty(event.org_id.as_deref())
        .or_else(|| custom.and_then(|c| non_empty(c.org_id.as_deref())))?;
    let campaign = non_empty(event.release_id.as_deref())
        .or_else(|| custom.and_then(|c| non_empty(c.release_id.as_deref())))?;
    Some((tenant.to_string(), campaign.to_string()))
}

/// Normalize one raw batch element into a canonical event.
pub fn normalize_element(
    element: Value,
    ingested_at: DateTime<Utc>,
) -> Result<EngagementEvent, SkipReason> {
    let inbound: InboundEvent = match serde_json::from_value(element) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(error = %err, "Skipping malformed batch element");
            return Err(SkipReason::MalformedElement);
        }
    };

    let Some(email) = non_empty(inbound.email.as_deref()) else {
        tracing::warn!("Skipping event without recipient email");
        return Err(SkipReason::MissingEmail);
    };

    let Some(label) = non_empty(inbound.event.as_deref()) else {
        tracing::warn!(email, "Skipping event without event label");
        return Err(SkipReason::MissingEventType);
    };

    let Some((tenant_id, campaign_id)) = resolve_attribution(&inbound) else {
        tracing::warn!(event = label, "Skipping event without resolvable attribution");
        return Err(SkipReason::UnresolvedAttribution);
    };

    let Some(event_type) = EventType::from_provider(label) else {
        tracing::debug!(event = label, "Skipping unrecognized provider event type");
        return Err(SkipReason::UnrecognizedEventType);
    };

    let timestamp = validate_timestamp(inbound.timestamp_secs(), ingested_at);

    Ok(EngagementEvent {
        id: dedup_key(&inbound),
        tenant_id,
        campaign_id,
        recipient_email: email.to_string(),
        event_type,
        timestamp,
        metadata: inbound.metadata(),
    })
}

/// Normalize a whole batch, dropping unusable elements with per-reason
/// metrics. Order is preserved for the survivors.
pub fn normalize_batch(elements: Vec<Value>, ingested_at: DateTime<Utc>) -> Vec<EngagementEvent> {
    let mut events = Vec::with_capacity(elements.len());
    for element in elements {
        match normalize_element(element, ingested_at) {
            Ok(event) => events.push(event),
            Err(reason) => {
                metrics::counter!("engage_events_skipped", "reason" => reason.as_str())
                    .increment(1);
            }
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_event() -> Value {
        json!({
            "event": "open",
            "email": "reporter@example.com",
            "timestamp": 1700000000,
            "sg_event_id": "ev-1",
            "sg_message_id": "msg-1",
            "orgId": "org-1",
            "releaseId": "rel-1",
            "useragent": "Mozilla/5.0"
        })
    }

    #[test]
    fn well_formed_event_normalizes() {
        let event = normalize_element(full_event(), Utc::now()).unwrap();
        assert_eq!(event.tenant_id, "org-1");
        assert_eq!(event.campaign_id, "rel-1");
        assert_eq!(event.recipient_email, "reporter@example.com");
        assert_eq!(event.event_type, EventType::Open);
        assert_eq!(event.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(event.metadata["user_agent"], "Mozilla/5.0");
    }

    #[test]
    fn missing_email_is_skipped() {
        let mut value = full_event();
        value.as_object_mut().unwrap().remove("email");
        assert_eq!(
            normalize_element(value, Utc::now()),
            Err(SkipReason::MissingEmail)
        );

        let mut blank = full_event();
        blank["email"] = json!("");
        assert_eq!(
            normalize_element(blank, Utc::now()),
            Err(SkipReason::MissingEmail)
        );
    }

    #[test]
    fn missing_event_label_is_skipped() {
        let mut value = full_event();
        value.as_object_mut().unwrap().remove("event");
        assert_eq!(
            normalize_element(value, Utc::now()),
            Err(SkipReason::MissingEventType)
        );
    }

    #[test]
    fn unrecognized_event_type_is_skipped() {
        let mut value = full_event();
        value["event"] = json!("unknown_type_xyz");
        assert_eq!(
            normalize_element(value, Utc::now()),
            Err(SkipReason::UnrecognizedEventType)
        );
    }

    #[test]
    fn dropped_maps_to_bounce() {
        let mut value = full_event();
        value["event"] = json!("dropped");
        let event = normalize_element(value, Utc::now()).unwrap();
        assert_eq!(event.event_type, EventType::Bounce);
    }

    #[test]
    fn attribution_falls_back_to_custom_args() {
        let value = json!({
            "event": "click",
            "email": "a@b.c",
            "custom_args": { "orgId": "org-2", "releaseId": "rel-2" }
        });
        let event = normalize_element(value, Utc::now()).unwrap();
        assert_eq!(event.tenant_id, "org-2");
        assert_eq!(event.campaign_id, "rel-2");
    }

    #[test]
    fn empty_top_level_attribution_is_treated_as_absent() {
        let value = json!({
            "event": "click",
            "email": "a@b.c",
            "orgId": "",
            "releaseId": "",
            "custom_args": { "orgId": "org-3", "releaseId": "rel-3" }
        });
        let event = normalize_element(value, Utc::now()).unwrap();
        assert_eq!(event.tenant_id, "org-3");
        assert_eq!(event.campaign_id, "rel-3");
    }

    #[test]
    fn unresolvable_attribution_is_skipped() {
        let value = json!({ "event": "open", "email": "a@b.c" });
        assert_eq!(
            normalize_element(value, Utc::now()),
            Err(SkipReason::UnresolvedAttribution)
        );

        // One half resolving is not enough.
        let partial = json!({
            "event": "open",
            "email": "a@b.c",
            "orgId": "org-1"
        });
        assert_eq!(
            normalize_element(partial, Utc::now()),
            Err(SkipReason::UnresolvedAttribution)
        );
    }

    #[test]
    fn malformed_element_is_skipped() {
        assert_eq!(
            normalize_element(json!("not an object"), Utc::now()),
            Err(SkipReason::MalformedElement)
        );
        assert_eq!(
            normalize_element(json!({ "email": 42 }), Utc::now()),
            Err(SkipReason::MalformedElement)
        );
    }

    #[test]
    fn junk_timestamp_substitutes_ingestion_time() {
        let ingested = Utc::now();
        let mut value = full_event();
        value["timestamp"] = json!("garbage");
        let event = normalize_element(value, ingested).unwrap();
        assert_eq!(event.timestamp, ingested);

        let mut negative = full_event();
        negative["timestamp"] = json!(-1);
        let event = normalize_element(negative, ingested).unwrap();
        assert_eq!(event.timestamp, ingested);
    }

    #[test]
    fn batch_isolates_bad_elements() {
        let batch = vec![
            full_event(),
            json!({ "event": "open" }),
            json!(17),
            {
                let mut click = full_event();
                click["event"] = json!("click");
                click["sg_event_id"] = json!("ev-2");
                click
            },
        ];

        let events = normalize_batch(batch, Utc::now());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::Open);
        assert_eq!(events[1].event_type, EventType::Click);
    }
}
