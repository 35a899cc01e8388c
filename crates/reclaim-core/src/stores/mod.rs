//! Store seams
//!
//! The engine talks to its persistence collaborators through three traits:
//! the document-shaped item store, the append-mostly match store, and a
//! TTL key-value cache. Production deployments put a real backend behind
//! each trait; [`memory`] ships in-process implementations used by the
//! server default wiring and the tests. Upserts are idempotent and no
//! transactions are assumed.

mod memory;

pub use memory::{MemoryCacheStore, MemoryItemStore, MemoryMatchStore};

use std::time::Duration;

use async_trait::async_trait;

use crate::item::{Collection, Item, ItemStatus, MatchRecord};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Store error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be reached (or its lock is poisoned)
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A payload could not be encoded or decoded
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Store result type
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ============================================================================
// ITEM STORE
// ============================================================================

/// Document store holding item reports keyed by (collection, item id)
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Health probe
    async fn ping(&self) -> bool;

    /// Fetch one item
    async fn get(&self, collection: Collection, item_id: &str) -> StoreResult<Option<Item>>;

    /// Upsert with merge semantics: provided embedding channels overwrite,
    /// absent channels keep the stored embedding. Last write wins.
    async fn upsert(&self, item: Item) -> StoreResult<()>;

    /// Items of a collection in the given status, bounded by `limit`
    async fn list_by_status(
        &self,
        collection: Collection,
        status: ItemStatus,
        limit: usize,
    ) -> StoreResult<Vec<Item>>;

    /// Update one item's lifecycle status
    async fn set_status(
        &self,
        collection: Collection,
        item_id: &str,
        status: ItemStatus,
    ) -> StoreResult<()>;

    /// Point-in-time copy of a whole collection
    async fn snapshot(&self, collection: Collection) -> StoreResult<Vec<Item>>;

    /// Number of items in a collection
    async fn count(&self, collection: Collection) -> StoreResult<usize>;
}

// ============================================================================
// MATCH STORE
// ============================================================================

/// Append-mostly store of persisted match records
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Health probe
    async fn ping(&self) -> bool;

    /// Insert a record, returning its id
    async fn insert(&self, record: MatchRecord) -> StoreResult<String>;

    /// Most recent records, newest first
    async fn recent(&self, limit: usize) -> StoreResult<Vec<MatchRecord>>;
}

// ============================================================================
// CACHE STORE
// ============================================================================

/// TTL key-value cache for embeddings and match results
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Health probe
    async fn ping(&self) -> bool;

    /// Fetch an unexpired value
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store a value with a TTL
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()>;

    /// Drop a key
    async fn delete(&self, key: &str) -> StoreResult<()>;
}
