//! Instant-match coordinator
//!
//! Drives a single item end to end: result-cache probe, embedding
//! acquisition, persistence, candidate query against the opposite
//! collection, significant-match persistence, and result caching.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cache::{match_key, EmbeddingCache};
use crate::config::{validate_limit, validate_threshold, MatchingConfig};
use crate::error::{MatchingError, Result};
use crate::index::CandidateIndex;
use crate::item::{
    round4, Collection, ComponentScores, ConfidenceBucket, Item, MatchRecord, Modality,
    RankedMatch,
};
use crate::similarity::hybrid_similarity;

use super::{gather_embeddings, MatchPhase, ServiceContext};

// ============================================================================
// REQUEST / OUTCOME TYPES
// ============================================================================

/// One instant-match request from the reporting backend
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantMatchRequest {
    /// Unique item id assigned by the backend
    pub item_id: String,
    /// Item name
    pub item_name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Category label
    #[serde(default)]
    pub category: String,
    /// Reference to the item photo
    #[serde(default)]
    pub image_url: Option<String>,
    /// Which collection the item belongs to
    pub collection: Collection,
    /// Minimum similarity, defaults to the configured threshold
    #[serde(default)]
    pub threshold: Option<f32>,
    /// Result cap, defaults to the configured maximum
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Result of one instant match
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantMatchOutcome {
    /// The item the match ran for
    pub item_id: String,
    /// Ranked matches at or above the threshold
    pub matches: Vec<RankedMatch>,
    /// Number of ranked matches
    pub total_matches: usize,
    /// True when any match scores above the high-similarity mark
    pub has_high_similarity: bool,
    /// Collection that was searched
    pub search_collection: Collection,
    /// Threshold applied
    pub threshold_used: f32,
}

/// One side of a similarity report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRef {
    /// Item id
    pub id: String,
    /// Collection the item lives in
    pub collection: Collection,
    /// Item name
    pub name: String,
    /// Modalities with stored embeddings
    pub embeddings_available: Vec<Modality>,
}

/// Pairwise similarity between two stored items
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityReport {
    /// First item
    pub item_a: ItemRef,
    /// Second item
    pub item_b: ItemRef,
    /// Per-modality component scores
    pub per_modality: ComponentScores,
    /// Weighted total similarity
    pub total: f32,
    /// Confidence label for the total
    pub confidence: ConfidenceBucket,
    /// Strongest contributing modality, if any
    pub dominant_modality: Option<Modality>,
    /// Whether the pair clears the default matching threshold
    pub is_match: bool,
}

/// Score distribution over recent matches
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityDistribution {
    /// Matches scoring above 0.8
    pub high: usize,
    /// Matches scoring within [0.6, 0.8]
    pub medium: usize,
    /// Matches scoring below 0.6
    pub low: usize,
}

/// Aggregates over the most recent persisted matches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStatsReport {
    /// Number of records inspected
    pub total_recent_matches: usize,
    /// Count per match kind
    pub match_kinds: BTreeMap<String, usize>,
    /// Score distribution
    pub similarity_distribution: SimilarityDistribution,
    /// Mean total score, rounded to 4 decimals
    pub average_similarity: f32,
}

// ============================================================================
// COORDINATOR
// ============================================================================

/// Orchestrates instant matches and pairwise similarity lookups
pub struct MatchingCoordinator {
    services: Arc<ServiceContext>,
    embedding_cache: EmbeddingCache,
    config: MatchingConfig,
}

impl MatchingCoordinator {
    /// Create a coordinator over the shared services
    pub fn new(services: Arc<ServiceContext>, config: MatchingConfig) -> Self {
        let embedding_cache =
            EmbeddingCache::new(Arc::clone(&services.cache), config.embedding_ttl);
        Self {
            services,
            embedding_cache,
            config,
        }
    }

    /// Run one instant match end to end
    pub async fn instant_match(&self, request: InstantMatchRequest) -> Result<InstantMatchOutcome> {
        if let Some(threshold) = request.threshold {
            validate_threshold(threshold)?;
        }
        if let Some(max_results) = request.max_results {
            validate_limit(max_results)?;
        }
        let threshold = request.threshold.unwrap_or(self.config.default_threshold);
        let max_results = request
            .max_results
            .unwrap_or(self.config.default_max_results);

        debug!(
            item_id = %request.item_id,
            phase = MatchPhase::Received.as_str(),
            collection = request.collection.as_str(),
            "instant match"
        );

        // Step 1: unexpired cached result short-circuits everything
        let cache_key = match_key(request.collection, &request.item_id);
        match self.services.cache.get(&cache_key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<InstantMatchOutcome>(&bytes) {
                Ok(outcome) => {
                    info!(item_id = %request.item_id, "returning cached match result");
                    return Ok(outcome);
                }
                Err(err) => {
                    warn!(key = %cache_key, error = %err, "cached result is corrupt, recomputing");
                }
            },
            Ok(None) => {}
            Err(err) => {
                warn!(key = %cache_key, error = %err, "result cache read failed");
            }
        }

        // Fail fast before generating or writing anything
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

        // Step 2: embeddings from cache or generator, partial failures allowed
        debug!(
            item_id = %request.item_id,
            phase = MatchPhase::Embedding.as_str(),
            "obtaining embeddings"
        );
        let mut item = Item::new(request.item_id.clone(), request.collection);
        item.name = request.item_name.clone();
        item.description = request.description.clone();
        item.category = request.category.clone();
        item.image_ref = request.image_url.clone();

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

        // Step 3: persist under the item's own collection (upsert, last write wins)
        item.processed_at = Some(Utc::now());
        self.services.items.upsert(item.clone()).await?;
        debug!(
            item_id = %item.id,
            phase = MatchPhase::Persisted.as_str(),
            modalities = ?item.embeddings.present(),
            "item persisted"
        );

        // Step 4: query the opposite collection's snapshot index
        let search_collection = request.collection.opposite();
        let mut snapshot = self.services.items.snapshot(search_collection).await?;
        snapshot.retain(|candidate| candidate.id != item.id);
        let index = CandidateIndex::build(snapshot);
        debug!(
            item_id = %item.id,
            phase = MatchPhase::CandidatesFetched.as_str(),
            candidates = index.len(),
            collection = search_collection.as_str(),
            "candidate index ready"
        );

        let matches = index.query(&item.embeddings, threshold, max_results);
        debug!(
            item_id = %item.id,
            phase = MatchPhase::Scored.as_str(),
            matches = matches.len(),
            "candidates scored"
        );

        // Step 5: persist significant matches, fire-and-forget
        let significant: Vec<MatchRecord> = matches
            .iter()
            .filter(|m| m.score >= self.config.persist_threshold)
            .map(|m| MatchRecord::from_ranked(&item.id, search_collection, m))
            .collect();
        if !significant.is_empty() {
            let match_store = Arc::clone(&self.services.matches);
            tokio::spawn(async move {
                for record in significant {
                    let record_id = record.id.clone();
                    match match_store.insert(record).await {
                        Ok(id) => debug!(match_id = %id, "match persisted"),
                        Err(err) => error!(match_id = %record_id, error = %err, "failed to persist match"),
                    }
                }
            });
        }

        let outcome = InstantMatchOutcome {
            item_id: item.id.clone(),
            total_matches: matches.len(),
            has_high_similarity: matches
                .iter()
                .any(|m| m.score > self.config.high_similarity_threshold),
            matches,
            search_collection,
            threshold_used: threshold,
        };

        // Step 6: cache the full ranked result
        match serde_json::to_vec(&outcome) {
            Ok(bytes) => {
                if let Err(err) = self
                    .services
                    .cache
                    .set(&cache_key, bytes, self.config.result_ttl)
                    .await
                {
                    warn!(key = %cache_key, error = %err, "result cache write failed");
                }
            }
            Err(err) => warn!(error = %err, "result serialization failed"),
        }
        debug!(
            item_id = %outcome.item_id,
            phase = MatchPhase::ResultCached.as_str(),
            total = outcome.total_matches,
            "instant match complete"
        );

        Ok(outcome)
    }

    /// Similarity between two stored items
    pub async fn similarity(
        &self,
        item_a_id: &str,
        collection_a: Collection,
        item_b_id: &str,
        collection_b: Collection,
    ) -> Result<SimilarityReport> {
        if !self.services.items.ping().await {
            return Err(MatchingError::StoreUnavailable(
                "item store is unreachable".to_string(),
            ));
        }

        let item_a = self
            .services
            .items
            .get(collection_a, item_a_id)
            .await?
            .ok_or_else(|| MatchingError::NotFound(item_a_id.to_string()))?;
        let item_b = self
            .services
            .items
            .get(collection_b, item_b_id)
            .await?
            .ok_or_else(|| MatchingError::NotFound(item_b_id.to_string()))?;

        let score = hybrid_similarity(&item_a.embeddings, &item_b.embeddings, None);
        let total = round4(score.total);

        Ok(SimilarityReport {
            item_a: item_ref(&item_a),
            item_b: item_ref(&item_b),
            per_modality: score.components.rounded(),
            total,
            confidence: ConfidenceBucket::from_score(total),
            dominant_modality: score.components.dominant().map(|(m, _)| m),
            is_match: total >= self.config.default_threshold,
        })
    }

    /// Aggregate statistics over the most recent persisted matches
    pub async fn match_stats(&self, limit: usize) -> Result<MatchStatsReport> {
        validate_limit(limit)?;
        let recent = self.services.matches.recent(limit).await?;

        let mut match_kinds: BTreeMap<String, usize> = BTreeMap::new();
        let mut distribution = SimilarityDistribution::default();
        let mut score_sum = 0.0_f32;

        for record in &recent {
            *match_kinds.entry(record.kind.as_str().to_string()).or_default() += 1;
            score_sum += record.total;
            if record.total > 0.8 {
                distribution.high += 1;
            } else if record.total >= 0.6 {
                distribution.medium += 1;
            } else {
                distribution.low += 1;
            }
        }

        let average_similarity = if recent.is_empty() {
            0.0
        } else {
            round4(score_sum / recent.len() as f32)
        };

        Ok(MatchStatsReport {
            total_recent_matches: recent.len(),
            match_kinds,
            similarity_distribution: distribution,
            average_similarity,
        })
    }

    /// Drop cached embeddings for an item, e.g. after its report was edited
    pub async fn invalidate_item(&self, item_id: &str) -> Result<()> {
        self.embedding_cache.invalidate(item_id).await?;
        Ok(())
    }
}

fn item_ref(item: &Item) -> ItemRef {
    ItemRef {
        id: item.id.clone(),
        collection: item.collection,
        name: item.name.clone(),
        embeddings_available: item.embeddings.present(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
