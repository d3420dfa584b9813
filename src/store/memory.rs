//! In-memory document store for tests and development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use super::{apply_increment, DocumentStore, StoreError, StoreResult, WriteOp};

/// An in-memory store using a `RwLock` around a `HashMap`.
///
/// Commits hold the write lock for the whole operation list, so a commit
/// is atomic with respect to concurrent readers and other commits.
pub struct MemoryStore {
    records: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of documents currently stored. Test helper.
    pub fn len(&self) -> usize {
        self.records.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let guard = self
            .records
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(guard.get(key).cloned())
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        let limit = self.max_ops_per_commit();
        if ops.len() > limit {
            return Err(StoreError::CommitTooLarge(ops.len(), limit));
        }

        // A single write lock is held for the entire commit.
        let mut guard = self
            .records
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        for op in ops {
            match op {
                WriteOp::Set { key, value } => {
                    guard.insert(key, value);
                }
                WriteOp::Increment { key, field, delta } => {
                    let existing = guard.get(&key).cloned();
                    guard.insert(key, apply_increment(existing, &field, delta));
                }
            }
        }
        Ok(())
    }
}
