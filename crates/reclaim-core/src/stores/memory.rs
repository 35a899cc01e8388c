//! In-process store implementations
//!
//! Used as the server's default wiring and as the substitute stores in
//! tests. The cache store reproduces the deployed eviction policy:
//! per-entry TTL plus a bounded live-entry count that is cleared wholesale
//! when a write would exceed it.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::item::{Collection, Item, ItemStatus, MatchRecord};

use super::{CacheStore, ItemStore, MatchStore, StoreError, StoreResult};

/// Default live-entry capacity of the in-memory cache
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

fn poisoned(what: &str) -> StoreError {
    StoreError::Unavailable(format!("{what} lock poisoned"))
}

// ============================================================================
// ITEM STORE
// ============================================================================

/// HashMap-backed document store keyed by (collection, item id)
#[derive(Default)]
pub struct MemoryItemStore {
    items: RwLock<HashMap<(Collection, String), Item>>,
}

impl MemoryItemStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn ping(&self) -> bool {
        self.items.read().is_ok()
    }

    async fn get(&self, collection: Collection, item_id: &str) -> StoreResult<Option<Item>> {
        let items = self.items.read().map_err(|_| poisoned("item store"))?;
        Ok(items.get(&(collection, item_id.to_string())).cloned())
    }

    async fn upsert(&self, item: Item) -> StoreResult<()> {
        let mut items = self.items.write().map_err(|_| poisoned("item store"))?;
        let key = (item.collection, item.id.clone());
        match items.get_mut(&key) {
            Some(existing) => {
                let incoming = item;
                existing.embeddings.merge(incoming.embeddings);
                existing.status = incoming.status;
                existing.name = incoming.name;
                existing.description = incoming.description;
                existing.category = incoming.category;
                if incoming.image_ref.is_some() {
                    existing.image_ref = incoming.image_ref;
                }
                if incoming.processed_at.is_some() {
                    existing.processed_at = incoming.processed_at;
                }
            }
            None => {
                items.insert(key, item);
            }
        }
        Ok(())
    }

    async fn list_by_status(
        &self,
        collection: Collection,
        status: ItemStatus,
        limit: usize,
    ) -> StoreResult<Vec<Item>> {
        let items = self.items.read().map_err(|_| poisoned("item store"))?;
        let mut selected: Vec<Item> = items
            .values()
            .filter(|item| item.collection == collection && item.status == status)
            .cloned()
            .collect();
        // Deterministic order for bounded listings
        selected.sort_by(|a, b| a.id.cmp(&b.id));
        selected.truncate(limit);
        Ok(selected)
    }

    async fn set_status(
        &self,
        collection: Collection,
        item_id: &str,
        status: ItemStatus,
    ) -> StoreResult<()> {
        let mut items = self.items.write().map_err(|_| poisoned("item store"))?;
        if let Some(item) = items.get_mut(&(collection, item_id.to_string())) {
            item.status = status;
        }
        Ok(())
    }

    async fn snapshot(&self, collection: Collection) -> StoreResult<Vec<Item>> {
        let items = self.items.read().map_err(|_| poisoned("item store"))?;
        Ok(items
            .values()
            .filter(|item| item.collection == collection)
            .cloned()
            .collect())
    }

    async fn count(&self, collection: Collection) -> StoreResult<usize> {
        let items = self.items.read().map_err(|_| poisoned("item store"))?;
        Ok(items
            .values()
            .filter(|item| item.collection == collection)
            .count())
    }
}

// ============================================================================
// MATCH STORE
// ============================================================================

/// Append-only in-memory match store
#[derive(Default)]
pub struct MemoryMatchStore {
    records: RwLock<Vec<MatchRecord>>,
}

impl MemoryMatchStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// True when no record has been stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MatchStore for MemoryMatchStore {
    async fn ping(&self) -> bool {
        self.records.read().is_ok()
    }

    async fn insert(&self, record: MatchRecord) -> StoreResult<String> {
        let mut records = self.records.write().map_err(|_| poisoned("match store"))?;
        let id = record.id.clone();
        records.push(record);
        Ok(id)
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<MatchRecord>> {
        let records = self.records.read().map_err(|_| poisoned("match store"))?;
        let mut out: Vec<MatchRecord> = records.clone();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        Ok(out)
    }
}

// ============================================================================
// CACHE STORE
// ============================================================================

struct CacheSlot {
    value: Vec<u8>,
    expires_at: Instant,
}

/// TTL key-value cache with a bounded live-entry count.
///
/// Eviction is wholesale: when an insert of a new key would exceed the
/// capacity, every entry is dropped first. This mirrors the deployed
/// cache behavior; an LRU policy would evict less aggressively but is
/// deliberately not what runs in production.
pub struct MemoryCacheStore {
    slots: Mutex<HashMap<String, CacheSlot>>,
    capacity: usize,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCacheStore {
    /// Create a cache with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Create a cache bounded to `capacity` live entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Number of unexpired entries
    pub fn live_entries(&self) -> usize {
        let now = Instant::now();
        self.slots
            .lock()
            .map(|slots| slots.values().filter(|s| s.expires_at > now).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn ping(&self) -> bool {
        self.slots.lock().is_ok()
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut slots = self.slots.lock().map_err(|_| poisoned("cache store"))?;
        match slots.get(key) {
            Some(slot) if slot.expires_at > Instant::now() => Ok(Some(slot.value.clone())),
            Some(_) => {
                slots.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        let mut slots = self.slots.lock().map_err(|_| poisoned("cache store"))?;
        let now = Instant::now();
        slots.retain(|_, slot| slot.expires_at > now);

        if !slots.contains_key(key) && slots.len() >= self.capacity {
            warn!(
                capacity = self.capacity,
                "cache capacity reached, clearing all entries"
            );
            slots.clear();
        }

        debug!(key, ttl_secs = ttl.as_secs(), "cache set");
        slots.insert(
            key.to_string(),
            CacheSlot {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut slots = self.slots.lock().map_err(|_| poisoned("cache store"))?;
        slots.remove(key);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Embedding, Modality};
    use chrono::Utc;

    fn item_with_text(id: &str, collection: Collection) -> Item {
        let mut item = Item::new(id, collection);
        item.name = format!("item {id}");
        item.embeddings
            .set(Modality::TextClip, Embedding::unit(vec![1.0, 0.0]));
        item
    }

    #[tokio::test]
    async fn test_item_store_round_trip() {
        let store = MemoryItemStore::new();
        store
            .upsert(item_with_text("lost-1", Collection::Lost))
            .await
            .unwrap();

        let fetched = store.get(Collection::Lost, "lost-1").await.unwrap();
        assert!(fetched.is_some());
        assert!(store
            .get(Collection::Found, "lost-1")
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.count(Collection::Lost).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_item_store_upsert_merges_embeddings() {
        let store = MemoryItemStore::new();
        store
            .upsert(item_with_text("lost-1", Collection::Lost))
            .await
            .unwrap();

        let mut update = Item::new("lost-1", Collection::Lost);
        update.name = "renamed".to_string();
        update
            .embeddings
            .set(Modality::TextSentence, Embedding::unit(vec![0.0, 1.0]));
        update.processed_at = Some(Utc::now());
        store.upsert(update).await.unwrap();

        let merged = store.get(Collection::Lost, "lost-1").await.unwrap().unwrap();
        assert_eq!(merged.name, "renamed");
        assert!(merged.embeddings.has(Modality::TextClip));
        assert!(merged.embeddings.has(Modality::TextSentence));
        assert!(merged.processed_at.is_some());
    }

    #[tokio::test]
    async fn test_item_store_list_by_status() {
        let store = MemoryItemStore::new();
        for i in 0..4 {
            store
                .upsert(item_with_text(&format!("lost-{i}"), Collection::Lost))
                .await
                .unwrap();
        }
        store
            .set_status(Collection::Lost, "lost-0", ItemStatus::HasMatches)
            .await
            .unwrap();

        let active = store
            .list_by_status(Collection::Lost, ItemStatus::Active, 10)
            .await
            .unwrap();
        assert_eq!(active.len(), 3);

        let bounded = store
            .list_by_status(Collection::Lost, ItemStatus::Active, 2)
            .await
            .unwrap();
        assert_eq!(bounded.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_round_trip_and_delete() {
        let cache = MemoryCacheStore::new();
        cache
            .set("k1", vec![1, 2, 3], Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("k1").await.unwrap(), Some(vec![1, 2, 3]));
        cache.delete("k1").await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cache_ttl_expiry() {
        let cache = MemoryCacheStore::new();
        cache.set("k1", vec![9], Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cache_clears_wholesale_at_capacity() {
        let cache = MemoryCacheStore::with_capacity(3);
        for i in 0..3 {
            cache
                .set(&format!("k{i}"), vec![i as u8], Duration::from_secs(60))
                .await
                .unwrap();
        }
        assert_eq!(cache.live_entries(), 3);

        // Fourth distinct key exceeds capacity: everything is dropped first
        cache
            .set("k3", vec![3], Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.live_entries(), 1);
        assert_eq!(cache.get("k0").await.unwrap(), None);
        assert_eq!(cache.get("k3").await.unwrap(), Some(vec![3]));
    }

    #[tokio::test]
    async fn test_cache_overwrite_does_not_clear() {
        let cache = MemoryCacheStore::with_capacity(2);
        cache.set("a", vec![1], Duration::from_secs(60)).await.unwrap();
        cache.set("b", vec![2], Duration::from_secs(60)).await.unwrap();
        cache.set("a", vec![3], Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("a").await.unwrap(), Some(vec![3]));
        assert_eq!(cache.get("b").await.unwrap(), Some(vec![2]));
    }

    #[tokio::test]
    async fn test_match_store_recent_order() {
        use crate::item::{ComponentScores, MatchKind};

        let store = MemoryMatchStore::new();
        for i in 0..3 {
            let record = MatchRecord {
                id: format!("m-{i}"),
                source_item_id: "lost-1".to_string(),
                target_item_id: format!("found-{i}"),
                target_collection: Collection::Found,
                components: ComponentScores::default(),
                total: 0.9,
                kind: MatchKind::Hybrid,
                created_at: Utc::now() + chrono::Duration::seconds(i),
            };
            store.insert(record).await.unwrap();
        }

        let recent = store.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "m-2");
        assert_eq!(recent[1].id, "m-1");
    }
}
