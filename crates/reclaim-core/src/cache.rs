//! Embedding memoization over the cache store
//!
//! Keys follow the deployed layout: `img_emb:{id}`, `txt_clip_emb:{id}`,
//! `txt_st_emb:{id}` for embeddings and `match:{collection}:{id}` for
//! instant-match results. Embeddings round-trip through the byte encoding
//! of [`Embedding::to_bytes`], so a hit returns bit-identical vectors.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::item::{Collection, Embedding, Modality};
use crate::stores::{CacheStore, StoreResult};

/// Cache key for one (modality, item) embedding
pub fn embedding_key(modality: Modality, item_id: &str) -> String {
    let class = match modality {
        Modality::Image => "img_emb",
        Modality::TextClip => "txt_clip_emb",
        Modality::TextSentence => "txt_st_emb",
    };
    format!("{class}:{item_id}")
}

/// Cache key for one instant-match result
pub fn match_key(collection: Collection, item_id: &str) -> String {
    format!("match:{}:{item_id}", collection.as_str())
}

// ============================================================================
// EMBEDDING CACHE
// ============================================================================

/// Per-(item, modality) embedding memoization
pub struct EmbeddingCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl EmbeddingCache {
    /// Wrap a cache store with the embedding TTL
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Fetch a cached embedding. Returns the exact vector that was stored.
    pub async fn get(&self, item_id: &str, modality: Modality) -> StoreResult<Option<Embedding>> {
        let key = embedding_key(modality, item_id);
        match self.store.get(&key).await? {
            Some(bytes) => match Embedding::from_bytes(&bytes) {
                Some(embedding) => Ok(Some(embedding)),
                None => {
                    warn!(key, "cached embedding is corrupt, dropping");
                    self.store.delete(&key).await?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Store an embedding under (item, modality)
    pub async fn set(
        &self,
        item_id: &str,
        modality: Modality,
        embedding: &Embedding,
    ) -> StoreResult<()> {
        let key = embedding_key(modality, item_id);
        self.store.set(&key, embedding.to_bytes(), self.ttl).await
    }

    /// Drop every modality cached for an item
    pub async fn invalidate(&self, item_id: &str) -> StoreResult<()> {
        for modality in Modality::ALL {
            self.store.delete(&embedding_key(modality, item_id)).await?;
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryCacheStore;

    fn cache() -> EmbeddingCache {
        EmbeddingCache::new(Arc::new(MemoryCacheStore::new()), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_round_trip_is_bit_identical() {
        let cache = cache();
        let embedding = Embedding::unit(vec![0.3, -0.7, 0.64, 0.01]);

        cache
            .set("item-1", Modality::TextClip, &embedding)
            .await
            .unwrap();

        for _ in 0..3 {
            let fetched = cache
                .get("item-1", Modality::TextClip)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(fetched.vector.len(), embedding.vector.len());
            for (a, b) in fetched.vector.iter().zip(embedding.vector.iter()) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }

    #[tokio::test]
    async fn test_modalities_are_separate_keys() {
        let cache = cache();
        cache
            .set("item-1", Modality::TextClip, &Embedding::unit(vec![1.0]))
            .await
            .unwrap();

        assert!(cache
            .get("item-1", Modality::TextSentence)
            .await
            .unwrap()
            .is_none());
        assert!(cache.get("item-2", Modality::TextClip).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_clears_all_modalities() {
        let cache = cache();
        for modality in Modality::ALL {
            cache
                .set("item-1", modality, &Embedding::unit(vec![1.0, 2.0]))
                .await
                .unwrap();
        }

        cache.invalidate("item-1").await.unwrap();
        for modality in Modality::ALL {
            assert!(cache.get("item-1", modality).await.unwrap().is_none());
        }
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(embedding_key(Modality::Image, "i1"), "img_emb:i1");
        assert_eq!(embedding_key(Modality::TextClip, "i1"), "txt_clip_emb:i1");
        assert_eq!(embedding_key(Modality::TextSentence, "i1"), "txt_st_emb:i1");
        assert_eq!(match_key(Collection::Lost, "i1"), "match:lost:i1");
    }
}
