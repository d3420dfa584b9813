//! Engagement event types.
//!
//! Two representations, mirroring trust level: [`InboundEvent`] is the
//! untrusted wire shape where every field is optional and unknown provider
//! fields are ignored, and [`EngagementEvent`] is the canonical record that
//! gets persisted. Validation lives in normalization, not deserialization,
//! so one odd field never fails an otherwise usable event.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Earliest provider timestamp treated as plausible (2000-01-01T00:00:00Z).
pub const MIN_EVENT_TIMESTAMP_SECS: i64 = 946_684_800;

/// Maximum seconds an event may claim past its ingestion time (ten years).
pub const MAX_FUTURE_SKEW_SECS: i64 = 315_576_000;

/// One element of a provider webhook batch, as received.
///
/// The `timestamp` stays a raw JSON value: the provider nominally sends
/// epoch seconds but junk has been observed, and a junk timestamp must
/// not cost us the event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundEvent {
    pub event: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    pub sg_event_id: Option<String>,
    pub sg_message_id: Option<String>,
    #[serde(rename = "orgId")]
    pub org_id: Option<String>,
    #[serde(rename = "releaseId")]
    pub release_id: Option<String>,
    #[serde(default)]
    pub custom_args: Option<CustomArgs>,
    pub useragent: Option<String>,
    pub ip: Option<String>,
    pub url: Option<String>,
    pub reason: Option<String>,
}

/// Attribution echoed back by the provider from the original send.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomArgs {
    #[serde(rename = "orgId")]
    pub org_id: Option<String>,
    #[serde(rename = "releaseId")]
    pub release_id: Option<String>,
}

impl InboundEvent {
    /// Render the raw timestamp exactly as the dedup key consumes it:
    /// numbers as their JSON text, strings verbatim, anything else empty.
    pub fn raw_timestamp(&self) -> String {
        match &self.timestamp {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        }
    }

    /// The claimed epoch seconds, if the timestamp is numeric at all.
    pub fn timestamp_secs(&self) -> Option<i64> {
        match &self.timestamp {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    /// Collect the diagnostic fields that are actually present. Absent
    /// fields are omitted entirely, never stored as nulls.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        let fields = [
            ("user_agent", &self.useragent),
            ("ip", &self.ip),
            ("url", &self.url),
            ("reason", &self.reason),
        ];
        for (name, value) in fields {
            if let Some(v) = value {
                map.insert(name.to_string(), v.clone());
            }
        }
        map
    }
}

/// Canonical engagement event vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Delivered,
    Open,
    Click,
    Bounce,
    SpamReport,
    Unsubscribe,
}

impl EventType {
    /// Map a provider event label to the canonical vocabulary.
    ///
    /// `dropped` folds into `bounce`: both mean the message never reached
    /// the recipient. Unrecognized labels map to `None` and the event is
    /// skipped upstream.
    pub fn from_provider(label: &str) -> Option<Self> {
        match label {
            "delivered" => Some(EventType::Delivered),
            "open" => Some(EventType::Open),
            "click" => Some(EventType::Click),
            "bounce" | "dropped" => Some(EventType::Bounce),
            "spamreport" => Some(EventType::SpamReport),
            "unsubscribe" => Some(EventType::Unsubscribe),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Delivered => "delivered",
            EventType::Open => "open",
            EventType::Click => "click",
            EventType::Bounce => "bounce",
            EventType::SpamReport => "spam_report",
            EventType::Unsubscribe => "unsubscribe",
        }
    }

    /// The campaign counter this event type advances, if any.
    pub fn counter_field(&self) -> Option<&'static str> {
        match self {
            EventType::Open => Some("opens"),
            EventType::Click => Some("clicks"),
            _ => None,
        }
    }
}

/// Canonical, validated engagement event. Immutable once persisted: the
/// `id` is content-derived, so replaying the same provider payload lands
/// on the same document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub id: String,
    pub tenant_id: String,
    pub campaign_id: String,
    pub recipient_email: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl EngagementEvent {
    /// Document path for this event.
    pub fn document_key(&self) -> String {
        format!("orgs/{}/events/{}", self.tenant_id, self.id)
    }

    /// Document path for the campaign record this event attributes to.
    pub fn campaign_key(&self) -> String {
        format!("orgs/{}/releases/{}", self.tenant_id, self.campaign_id)
    }
}

/// Validate a claimed timestamp, substituting the ingestion time when the
/// claim is absent, non-numeric, or outside the plausible window.
pub fn validate_timestamp(claimed_secs: Option<i64>, ingested_at: DateTime<Utc>) -> DateTime<Utc> {
    let Some(secs) = claimed_secs else {
        return ingested_at;
    };
    if secs < MIN_EVENT_TIMESTAMP_SECS || secs > ingested_at.timestamp() + MAX_FUTURE_SKEW_SECS {
        return ingested_at;
    }
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(ingested_at)
}
