//! Chunked batched persistence.
//!
//! Each event stages a blind upsert of its document plus, for counted
//! types, one commutative counter increment on the campaign record. Both
//! ops for a given event always land in the same atomic commit, so a
//! crash cannot increment a counter without its matching event record.
//!
//! Increments are staged only when the event document does not already
//! exist: redelivered payloads overwrite byte-identical records and leave
//! the counters alone. Two concurrent deliveries of the same payload can
//! still both observe the event as new; the provider retries sequentially,
//! so the window is accepted rather than locked against.

use std::collections::HashSet;

use crate::event::EngagementEvent;
use crate::store::{DocumentStore, StoreError, StoreResult, WriteOp};

/// Events per chunk: each event contributes up to two operations, so the
/// chunk size is half the store's per-commit ceiling.
fn chunk_size(store: &dyn DocumentStore) -> usize {
    (store.max_ops_per_commit() / 2).max(1)
}

/// Persist normalized events in sequential atomic chunks.
///
/// Returns the number of distinct events committed. A failed chunk
/// propagates immediately; previously committed chunks stay in place,
/// which is safe because every write here is idempotent and the provider
/// retries the whole batch on a non-2xx response.
pub async fn persist_events(
    store: &dyn DocumentStore,
    events: &[EngagementEvent],
) -> StoreResult<usize> {
    if events.is_empty() {
        return Ok(0);
    }

    let mut persisted = 0usize;
    let mut staged_ids: HashSet<&str> = HashSet::with_capacity(events.len());

    for chunk in events.chunks(chunk_size(store)) {
        let mut ops = Vec::with_capacity(chunk.len() * 2);
        for event in chunk {
            // The same logical event twice in one batch stages once.
            if !staged_ids.insert(event.id.as_str()) {
                continue;
            }

            let value = serde_json::to_value(event)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            ops.push(WriteOp::Set {
                key: event.document_key(),
                value,
            });

            if let Some(field) = event.event_type.counter_field() {
                // First ingestion of this id advances the counter;
                // redelivery only rewrites the identical document.
                let already_persisted = store.get(&event.document_key()).await?.is_some();
                if !already_persisted {
                    ops.push(WriteOp::Increment {
                        key: event.campaign_key(),
                        field: field.to_string(),
                        delta: 1,
                    });
                }
            }

            persisted += 1;
        }

        if ops.is_empty() {
            continue;
        }

        let committed = ops.len();
        store.commit(ops).await?;
        metrics::counter!("engage_commit_chunks").increment(1);
        tracing::debug!(ops = committed, "Committed persistence chunk");
    }

    metrics::counter!("engage_events_persisted").increment(persisted as u64);
    Ok(persisted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(id: &str, event_type: EventType) -> EngagementEvent {
        EngagementEvent {
            id: id.into(),
            tenant_id: "org-1".into(),
            campaign_id: "rel-1".into(),
            recipient_email: "a@b.c".into(),
            event_type,
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn open_event_writes_record_and_counter() {
        let store = MemoryStore::new();
        let n = persist_events(&store, &[event("e1", EventType::Open)])
            .await
            .unwrap();

        assert_eq!(n, 1);
        assert!(store.get("orgs/org-1/events/e1").await.unwrap().is_some());
        let release = store.get("orgs/org-1/releases/rel-1").await.unwrap().unwrap();
        assert_eq!(release["opens"], 1);
    }

    #[tokio::test]
    async fn uncounted_types_touch_no_campaign_record() {
        let store = MemoryStore::new();
        persist_events(&store, &[event("e1", EventType::Delivered)])
            .await
            .unwrap();

        assert!(store.get("orgs/org-1/events/e1").await.unwrap().is_some());
        assert!(store.get("orgs/org-1/releases/rel-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replay_does_not_double_increment() {
        let store = MemoryStore::new();
        let events = [event("e1", EventType::Open), event("e2", EventType::Click)];

        let first = persist_events(&store, &events).await.unwrap();
        let second = persist_events(&store, &events).await.unwrap();
        assert_eq!(first, 2);
        assert_eq!(second, 2);

        let release = store.get("orgs/org-1/releases/rel-1").await.unwrap().unwrap();
        assert_eq!(release["opens"], 1);
        assert_eq!(release["clicks"], 1);
    }

    #[tokio::test]
    async fn duplicate_within_batch_stages_once() {
        let store = MemoryStore::new();
        let n = persist_events(
            &store,
            &[event("e1", EventType::Open), event("e1", EventType::Open)],
        )
        .await
        .unwrap();

        assert_eq!(n, 1);
        let release = store.get("orgs/org-1/releases/rel-1").await.unwrap().unwrap();
        assert_eq!(release["opens"], 1);
    }

    struct TinyStore {
        inner: MemoryStore,
        commits: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for TinyStore {
        async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
            self.inner.get(key).await
        }

        async fn commit(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
            assert!(ops.len() <= self.max_ops_per_commit());
            self.commits.fetch_add(1, Ordering::SeqCst);
            self.inner.commit(ops).await
        }

        fn max_ops_per_commit(&self) -> usize {
            4
        }
    }

    #[tokio::test]
    async fn large_batch_commits_in_multiple_chunks() {
        let store = TinyStore {
            inner: MemoryStore::new(),
            commits: AtomicUsize::new(0),
        };

        // Ceiling 4 → 2 events per chunk → 5 events need 3 commits.
        let events: Vec<_> = (0..5)
            .map(|i| event(&format!("e{i}"), EventType::Open))
            .collect();
        let n = persist_events(&store, &events).await.unwrap();

        assert_eq!(n, 5);
        assert_eq!(store.commits.load(Ordering::SeqCst), 3);
        let release = store.get("orgs/org-1/releases/rel-1").await.unwrap().unwrap();
        assert_eq!(release["opens"], 5);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let store = MemoryStore::new();
        assert_eq!(persist_events(&store, &[]).await.unwrap(), 0);
        assert!(store.is_empty());
    }
}
