//! Document store abstraction over the engagement database.
//!
//! The engine never talks to a concrete database directly. All persistence
//! goes through the [`DocumentStore`] trait: point reads plus atomic
//! multi-operation commits with a bounded operation count per commit.
//! Two backends ship: an in-memory map for tests and development, and a
//! redb file for embedded deployments.

use async_trait::async_trait;
use serde_json::Value;

pub mod memory;
pub mod redb;

pub use memory::MemoryStore;
pub use redb::RedbStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Maximum number of write operations a single commit may carry.
///
/// Matches the per-batch ceiling of the hosted document databases this
/// engine models, so a backend swap never changes chunking behavior.
pub const MAX_OPS_PER_COMMIT: usize = 500;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Commit of {0} ops exceeds per-commit limit of {1}")]
    CommitTooLarge(usize, usize),
}

impl StoreError {
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        StoreError::Backend(msg.into())
    }
}

/// A single staged write inside an atomic commit.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Blind upsert of a full document at `key`.
    Set { key: String, value: Value },
    /// Atomic numeric increment of `field` on the document at `key`.
    /// Creates the document or the field when absent; a non-numeric
    /// existing field is replaced by the delta.
    Increment {
        key: String,
        field: String,
        delta: i64,
    },
}

/// Trait for a document storage backend.
/// This allows for different storage implementations (e.g., in-memory, redb).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Retrieve a document by key.
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Apply all operations atomically: either every op in the list takes
    /// effect or none do. Rejects lists longer than [`max_ops_per_commit`].
    ///
    /// [`max_ops_per_commit`]: DocumentStore::max_ops_per_commit
    async fn commit(&self, ops: Vec<WriteOp>) -> StoreResult<()>;

    /// Upper bound on the number of operations per commit.
    fn max_ops_per_commit(&self) -> usize {
        MAX_OPS_PER_COMMIT
    }
}

/// Configuration for selecting and building a store backend.
///
/// # Example
/// ```
/// use engage::store::StoreConfig;
///
/// // In-memory (for testing)
/// let config = StoreConfig::in_memory();
///
/// // Redb (embedded file)
/// let config = StoreConfig::redb("/data/engage.redb");
/// ```
#[derive(Clone, Debug, Default)]
pub enum StoreConfig {
    /// Use redb for storage. The `path` is the file path for the database.
    Redb { path: String },
    /// Use an in-memory HashMap for storage. This is useful for testing.
    #[default]
    InMemory,
}

impl StoreConfig {
    /// Create an in-memory store configuration.
    pub fn in_memory() -> Self {
        StoreConfig::InMemory
    }

    /// Create a redb store configuration.
    pub fn redb<P: Into<String>>(path: P) -> Self {
        StoreConfig::Redb { path: path.into() }
    }

    /// Build the store based on the configuration.
    pub fn build(&self) -> StoreResult<Box<dyn DocumentStore>> {
        match self {
            StoreConfig::InMemory => Ok(Box::new(MemoryStore::new())),
            StoreConfig::Redb { path } => Ok(Box::new(RedbStore::open(path)?)),
        }
    }
}

/// Apply an increment to a document, creating the document or field when
/// absent. Shared by both backends so increment semantics cannot diverge.
pub(crate) fn apply_increment(existing: Option<Value>, field: &str, delta: i64) -> Value {
    let mut doc = match existing {
        Some(Value::Object(map)) => Value::Object(map),
        // A non-object document (or none at all) is replaced by a fresh
        // object holding only the counter.
        _ => Value::Object(serde_json::Map::new()),
    };

    let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);

    if let Some(map) = doc.as_object_mut() {
        map.insert(field.to_string(), Value::from(current + delta));
    }

    doc
}
