//! # Reclaim Core
//!
//! Matching engine for a lost & found service. Compares item reports
//! across two pools (lost / found) through multimodal embeddings:
//!
//! - **Hybrid Similarity**: per-modality cosine scores (CLIP image, CLIP
//!   text, sentence-transformer text) fused under a dynamic weighting
//!   policy that adapts to which modalities a pair shares
//! - **Snapshot Index**: ephemeral in-memory candidate index with batched
//!   dot products, rebuilt from the item store per matching call
//! - **Instant Match**: per-item coordinator with embedding memoization,
//!   result caching, and fire-and-forget persistence of strong matches
//! - **Background Sweep**: periodic batch pass over both collections that
//!   tolerates per-item failure
//!
//! Embedding generation and persistence are trait seams
//! ([`Embedder`], [`ItemStore`], [`MatchStore`], [`CacheStore`]);
//! in-process implementations ship for development and tests.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use reclaim_core::{
//!     Collection, HashEmbedder, InstantMatchRequest, MatchingConfig,
//!     MatchingCoordinator, MemoryCacheStore, MemoryItemStore,
//!     MemoryMatchStore, ServiceContext,
//! };
//!
//! let services = Arc::new(ServiceContext {
//!     embedder: Arc::new(HashEmbedder::new()),
//!     items: Arc::new(MemoryItemStore::new()),
//!     matches: Arc::new(MemoryMatchStore::new()),
//!     cache: Arc::new(MemoryCacheStore::new()),
//! });
//! let coordinator = MatchingCoordinator::new(services, MatchingConfig::default());
//!
//! let outcome = coordinator.instant_match(InstantMatchRequest {
//!     item_id: "lost-42".into(),
//!     item_name: "Blue backpack".into(),
//!     description: "Nike, torn left strap".into(),
//!     category: "bags".into(),
//!     image_url: None,
//!     collection: Collection::Lost,
//!     threshold: None,
//!     max_results: None,
//! }).await?;
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod cache;
pub mod config;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod index;
pub mod item;
pub mod similarity;
pub mod stores;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Item types
pub use item::{
    Collection, ComponentScores, ConfidenceBucket, Embedding, EmbeddingSet, Item, ItemStatus,
    MatchKind, MatchRecord, Modality, RankedMatch,
};

// Similarity scoring
pub use similarity::{
    cosine, dot, dynamic_weights, hybrid_similarity, rank_candidates, HybridScore,
    ModalityWeights, BASE_IMAGE_WEIGHT, BASE_TEXT_WEIGHT, TEXT_AGREEMENT_THRESHOLD,
};

// Candidate index
pub use index::CandidateIndex;

// Embedding memoization
pub use cache::{embedding_key, match_key, EmbeddingCache};

// Generator seam
pub use embedder::{
    Embedder, EmbedderError, HashEmbedder, IMAGE_DIMENSIONS, TEXT_CLIP_DIMENSIONS,
    TEXT_SENTENCE_DIMENSIONS,
};

// Store seams and in-process implementations
pub use stores::{
    CacheStore, ItemStore, MatchStore, MemoryCacheStore, MemoryItemStore, MemoryMatchStore,
    StoreError, StoreResult,
};

// Engine
pub use engine::{
    BackgroundSweep, InstantMatchOutcome, InstantMatchRequest, ItemRef, MatchStatsReport,
    MatchingCoordinator, ServiceContext, SimilarityDistribution, SimilarityReport, SweepParams,
    SweepSummary,
};

// Configuration and errors
pub use config::{MatchingConfig, DEFAULT_MAX_RESULTS, DEFAULT_THRESHOLD};
pub use error::{MatchingError, Result};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
