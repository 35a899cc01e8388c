//! Matching engine
//!
//! The coordinator drives one item's instant match end to end; the sweep
//! batch-processes both collections in the background. Both receive their
//! collaborators through one [`ServiceContext`] constructed at process
//! start - no hidden global clients.

mod coordinator;
mod sweep;

pub use coordinator::{
    InstantMatchOutcome, InstantMatchRequest, ItemRef, MatchStatsReport, MatchingCoordinator,
    SimilarityDistribution, SimilarityReport,
};
pub use sweep::{BackgroundSweep, SweepParams, SweepSummary};

use std::sync::Arc;

use tracing::warn;

use crate::cache::EmbeddingCache;
use crate::embedder::Embedder;
use crate::error::MatchingError;
use crate::item::{EmbeddingSet, Modality};
use crate::stores::{CacheStore, ItemStore, MatchStore};

// ============================================================================
// SERVICE CONTEXT
// ============================================================================

/// The engine's external collaborators, constructed once and shared
pub struct ServiceContext {
    /// Embedding generator backend
    pub embedder: Arc<dyn Embedder>,
    /// Item document store
    pub items: Arc<dyn ItemStore>,
    /// Match record store
    pub matches: Arc<dyn MatchStore>,
    /// TTL key-value cache
    pub cache: Arc<dyn CacheStore>,
}

// ============================================================================
// REQUEST PHASES
// ============================================================================

/// Phases of one instant-match request, for log correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Received,
    Embedding,
    Persisted,
    CandidatesFetched,
    Scored,
    ResultCached,
}

impl MatchPhase {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchPhase::Received => "received",
            MatchPhase::Embedding => "embedding",
            MatchPhase::Persisted => "persisted",
            MatchPhase::CandidatesFetched => "candidates_fetched",
            MatchPhase::Scored => "scored",
            MatchPhase::ResultCached => "result_cached",
        }
    }
}

// ============================================================================
// SHARED EMBEDDING ACQUISITION
// ============================================================================

/// Obtain one modality's embedding: cache first, then the generator.
/// Cache trouble degrades to a miss; a generator failure surfaces as
/// [`MatchingError::PartialModalityFailure`] for the caller to log and
/// swallow.
pub(crate) async fn obtain_embedding(
    services: &ServiceContext,
    cache: &EmbeddingCache,
    item_id: &str,
    modality: Modality,
    payload: &str,
) -> Result<crate::item::Embedding, MatchingError> {
    match cache.get(item_id, modality).await {
        Ok(Some(embedding)) => {
            tracing::debug!(item_id, modality = modality.as_str(), "embedding cache hit");
            return Ok(embedding);
        }
        Ok(None) => {}
        Err(err) => {
            warn!(item_id, modality = modality.as_str(), error = %err, "embedding cache read failed");
        }
    }

    let embedding = services
        .embedder
        .generate(modality, payload)
        .await
        .map_err(|err| MatchingError::PartialModalityFailure {
            item_id: item_id.to_string(),
            modality,
            reason: err.to_string(),
        })?;

    if let Err(err) = cache.set(item_id, modality, &embedding).await {
        warn!(item_id, modality = modality.as_str(), error = %err, "embedding cache write failed");
    }
    Ok(embedding)
}

/// Gather embeddings for every modality the item's payloads allow.
/// Modalities that fail are logged and left absent.
pub(crate) async fn gather_embeddings(
    services: &ServiceContext,
    cache: &EmbeddingCache,
    item_id: &str,
    text: &str,
    image_ref: Option<&str>,
) -> EmbeddingSet {
    let mut set = EmbeddingSet::default();

    if !text.trim().is_empty() {
        for modality in [Modality::TextClip, Modality::TextSentence] {
            match obtain_embedding(services, cache, item_id, modality, text).await {
                Ok(embedding) => set.set(modality, embedding),
                Err(err) => warn!("{err}"),
            }
        }
    }

    if let Some(image_ref) = image_ref {
        match obtain_embedding(services, cache, item_id, Modality::Image, image_ref).await {
            Ok(embedding) => set.set(Modality::Image, embedding),
            Err(err) => warn!("{err}"),
        }
    }

    set
}
