//! Deterministic dedup key derivation.
//!
//! The provider delivers at least once, so the event identifier must be a
//! pure function of event content. The key hashes the provider identifiers
//! plus the event label and raw timestamp with `0x00` separators so field
//! boundaries cannot alias:
//!
//! ```text
//! SHA-256(sg_event_id || 0x00 || sg_message_id || 0x00 || event || 0x00 || raw_timestamp)
//! ```
//!
//! hex-encoded and truncated to 32 characters. Missing fields contribute
//! empty segments.
//!
//! Known approximation, inherited deliberately: when the provider omits
//! both `sg_event_id` and `sg_message_id`, distinct events sharing a label
//! and a second collide and the later write overwrites the earlier one.

use sha2::{Digest, Sha256};

use crate::event::InboundEvent;

/// Length of the derived key in hex characters (128 bits of the digest).
pub const DEDUP_KEY_LEN: usize = 32;

/// Derive the deterministic document id for an inbound event.
pub fn dedup_key(event: &InboundEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.sg_event_id.as_deref().unwrap_or("").as_bytes());
    hasher.update([0]);
    hasher.update(event.sg_message_id.as_deref().unwrap_or("").as_bytes());
    hasher.update([0]);
    hasher.update(event.event.as_deref().unwrap_or("").as_bytes());
    hasher.update([0]);
    hasher.update(event.raw_timestamp().as_bytes());

    let digest = hex::encode(hasher.finalize());
    digest[..DEDUP_KEY_LEN].to_string()
}
