//! Background matching sweep
//!
//! Periodic batch pass over both collections: picks up active items with
//! missing or stale embeddings, matches them against the opposite
//! collection, persists the strongest matches, and flips item status.
//! One bad item never aborts the sweep. Safe to run alongside instant
//! matches; running two sweeps concurrently needs external mutual
//! exclusion, which the engine does not provide.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cache::EmbeddingCache;
use crate::config::{validate_limit, validate_threshold, MatchingConfig};
use crate::error::{MatchingError, Result};
use crate::index::CandidateIndex;
use crate::item::{Collection, Item, ItemStatus, MatchRecord};

use super::{gather_embeddings, ServiceContext};

// ============================================================================
// PARAMETERS / SUMMARY
// ============================================================================

/// Sweep parameters
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepParams {
    /// Maximum items per run across both collections
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Minimum similarity for a reported match
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_limit() -> usize {
    100
}

fn default_threshold() -> f32 {
    crate::config::DEFAULT_THRESHOLD
}

impl Default for SweepParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            threshold: default_threshold(),
        }
    }
}

/// What one sweep run did
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    /// Items processed across both collections
    pub processed: usize,
    /// Match records persisted
    pub new_matches: usize,
    /// Threshold applied
    pub threshold_used: f32,
    /// Lost-collection size at sweep start
    pub total_lost_items: usize,
    /// Found-collection size at sweep start
    pub total_found_items: usize,
}

// ============================================================================
// SWEEP
// ============================================================================

/// Batch matcher over both collections
pub struct BackgroundSweep {
    services: Arc<ServiceContext>,
    embedding_cache: EmbeddingCache,
    config: MatchingConfig,
}

impl BackgroundSweep {
    /// Create a sweep over the shared services
    pub fn new(services: Arc<ServiceContext>, config: MatchingConfig) -> Self {
        let embedding_cache =
            EmbeddingCache::new(Arc::clone(&services.cache), config.embedding_ttl);
        Self {
            services,
            embedding_cache,
            config,
        }
    }

    /// Run one sweep over both collections
    pub async fn run(&self, params: SweepParams) -> Result<SweepSummary> {
        validate_limit(params.limit)?;
        validate_threshold(params.threshold)?;

        if !self.services.embedder.is_ready().await {
            return Err(MatchingError::ModelUnavailable(
                "embedding backend is not ready".to_string(),
            ));
        }
        if !self.services.items.ping().await {
            return Err(MatchingError::StoreUnavailable(
                "item store is unreachable".to_string(),
            ));
        }

        let total_lost_items = self.services.items.count(Collection::Lost).await?;
        let total_found_items = self.services.items.count(Collection::Found).await?;
        info!(
            limit = params.limit,
            threshold = params.threshold,
            lost = total_lost_items,
            found = total_found_items,
            "background sweep starting"
        );

        let per_collection = (params.limit / 2).max(1);
        let mut processed = 0_usize;
        let mut new_matches = 0_usize;

        for collection in [Collection::Lost, Collection::Found] {
            let eligible = self.select_eligible(collection, per_collection).await?;
            if eligible.is_empty() {
                debug!(collection = collection.as_str(), "no eligible items");
                continue;
            }

            // One snapshot index per pass; queries are read-only against it
            let snapshot = self.services.items.snapshot(collection.opposite()).await?;
            let index = CandidateIndex::build(snapshot);

            for item in eligible {
                let item_id = item.id.clone();
                match self
                    .process_item(item, collection, &index, params.threshold)
                    .await
                {
                    Ok(persisted) => {
                        processed += 1;
                        new_matches += persisted;
                    }
                    Err(err) => {
                        error!(item_id = %item_id, collection = collection.as_str(), error = %err, "sweep item failed, continuing");
                    }
                }

                if !self.config.sweep_pacing.is_zero() {
                    tokio::time::sleep(self.config.sweep_pacing).await;
                }
            }
        }

        let summary = SweepSummary {
            processed,
            new_matches,
            threshold_used: params.threshold,
            total_lost_items,
            total_found_items,
        };
        info!(
            processed = summary.processed,
            new_matches = summary.new_matches,
            "background sweep completed"
        );
        Ok(summary)
    }

    /// Active items with missing embeddings or stale processing timestamps
    async fn select_eligible(&self, collection: Collection, limit: usize) -> Result<Vec<Item>> {
        let active = self
            .services
            .items
            .list_by_status(collection, ItemStatus::Active, crate::config::MAX_LIMIT)
            .await?;

        let stale_before = Utc::now() - self.config.sweep_stale_after;
        let eligible: Vec<Item> = active
            .into_iter()
            .filter(|item| {
                item.embeddings.is_empty()
                    || item.processed_at.map(|t| t < stale_before).unwrap_or(true)
            })
            .take(limit)
            .collect();
        Ok(eligible)
    }

    /// Process one item: ensure embeddings, query, persist top matches.
    /// Returns the number of match records persisted.
    async fn process_item(
        &self,
        mut item: Item,
        collection: Collection,
        index: &CandidateIndex,
        threshold: f32,
    ) -> Result<usize> {
        debug!(item_id = %item.id, "sweep processing item");

        if item.embeddings.is_empty() {
            let text = item.text_payload();
            item.embeddings = gather_embeddings(
                &self.services,
                &self.embedding_cache,
                &item.id,
                &text,
                item.image_ref.as_deref(),
            )
            .await;
            if item.embeddings.is_empty() {
                return Err(MatchingError::EmbeddingGenerationFailed(item.id));
            }
            item.processed_at = Some(Utc::now());
            self.services.items.upsert(item.clone()).await?;
        }

        // Superset query, then keep the strongest few
        let mut ranked = index.query(&item.embeddings, threshold, self.config.sweep_search_limit);
        ranked.truncate(self.config.sweep_keep_limit);

        let mut persisted = 0_usize;
        for m in &ranked {
            let record = MatchRecord::from_ranked(&item.id, collection.opposite(), m);
            match self.services.matches.insert(record).await {
                Ok(id) => {
                    persisted += 1;
                    debug!(match_id = %id, item_id = %item.id, "sweep match persisted");
                }
                Err(err) => {
                    warn!(item_id = %item.id, error = %err, "failed to persist sweep match");
                }
            }
        }

        if persisted > 0 {
            self.services
                .items
                .set_status(collection, &item.id, ItemStatus::HasMatches)
                .await?;
        }

        Ok(persisted)
    }
}

// ============================================================================
// TESTS
// ============================================================================
