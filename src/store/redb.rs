//! Redb (Rust embedded database) document store.
//!
//! Redb is a pure Rust embedded key-value store that provides ACID
//! transactions without external dependencies. One write transaction is
//! opened per commit, so the whole operation list lands atomically.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde_json::Value;

use super::{apply_increment, DocumentStore, StoreError, StoreResult, WriteOp};

/// Table definition for engagement documents
const ENGAGE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("engage_docs");

/// Redb-backed document store.
///
/// # Thread Safety
/// The `Arc<Database>` wrapper allows safe sharing across threads.
/// Redb handles its own internal locking and MVCC. Transactions block,
/// so they run under `spawn_blocking` to keep the async runtime free.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = Database::create(path).map_err(|e| StoreError::backend(e.to_string()))?;

        // Initialize the table if it doesn't exist
        let write_txn = db
            .begin_write()
            .map_err(|e| StoreError::backend(e.to_string()))?;
        {
            // Accessing the table creates it if it doesn't exist
            let _table = write_txn
                .open_table(ENGAGE_TABLE)
                .map_err(|e| StoreError::backend(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| StoreError::backend(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn read_doc(db: &Database, key: &str) -> StoreResult<Option<Value>> {
        let read_txn = db
            .begin_read()
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let table = read_txn
            .open_table(ENGAGE_TABLE)
            .map_err(|e| StoreError::backend(e.to_string()))?;

        match table
            .get(key)
            .map_err(|e| StoreError::backend(e.to_string()))?
        {
            Some(bytes) => {
                let value = serde_json::from_slice(bytes.value())
                    .map_err(|e| StoreError::backend(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn apply_ops(db: &Database, ops: Vec<WriteOp>) -> StoreResult<()> {
        let write_txn = db
            .begin_write()
            .map_err(|e| StoreError::backend(e.to_string()))?;

        {
            let mut table = write_txn
                .open_table(ENGAGE_TABLE)
                .map_err(|e| StoreError::backend(e.to_string()))?;

            for op in ops {
                let (key, doc) = match op {
                    WriteOp::Set { key, value } => (key, value),
                    WriteOp::Increment { key, field, delta } => {
                        let existing = match table
                            .get(key.as_str())
                            .map_err(|e| StoreError::backend(e.to_string()))?
                        {
                            Some(bytes) => Some(
                                serde_json::from_slice(bytes.value())
                                    .map_err(|e| StoreError::backend(e.to_string()))?,
                            ),
                            None => None,
                        };
                        (key, apply_increment(existing, &field, delta))
                    }
                };

                let bytes =
                    serde_json::to_vec(&doc).map_err(|e| StoreError::backend(e.to_string()))?;
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| StoreError::backend(e.to_string()))?;
            }
        }

        write_txn
            .commit()
            .map_err(|e| StoreError::backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for RedbStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || Self::read_doc(&db, &key))
            .await
            .map_err(|e| StoreError::backend(e.to_string()))?
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        let limit = self.max_ops_per_commit();
        if ops.len() > limit {
            return Err(StoreError::CommitTooLarge(ops.len(), limit));
        }

        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || Self::apply_ops(&db, ops))
            .await
            .map_err(|e| StoreError::backend(e.to_string()))?
    }
}
