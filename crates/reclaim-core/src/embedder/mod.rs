//! Embedding generation seam
//!
//! Vector production is external to the engine: CLIP for images and text,
//! a sentence transformer for the second text channel. The engine only
//! depends on the [`Embedder`] trait; [`HashEmbedder`] is the in-process
//! deterministic backend used for development and tests. Each modality
//! request is independent and partial failure is expected.

mod hash;

pub use hash::HashEmbedder;

use async_trait::async_trait;

use crate::item::{Embedding, Modality};

// ============================================================================
// CONSTANTS
// ============================================================================

/// CLIP visual embedding dimensions
pub const IMAGE_DIMENSIONS: usize = 512;

/// CLIP text embedding dimensions
pub const TEXT_CLIP_DIMENSIONS: usize = 512;

/// Sentence-transformer embedding dimensions
pub const TEXT_SENTENCE_DIMENSIONS: usize = 384;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Embedder error types
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EmbedderError {
    /// The backend is not ready to serve requests
    #[error("embedding model unavailable: {0}")]
    NotReady(String),
    /// Generation failed for this request
    #[error("embedding generation failed: {0}")]
    Failed(String),
    /// Invalid input (empty payload, unreadable image reference)
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

// ============================================================================
// EMBEDDER TRAIT
// ============================================================================

/// Produces unit-norm embedding vectors for one modality at a time.
///
/// The payload is the combined name + description text for the text
/// modalities, or an image reference (URL or path) for [`Modality::Image`].
/// Generation runs off the request path; callers await completion before
/// scoring.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Whether the backend can currently serve requests
    async fn is_ready(&self) -> bool;

    /// Vector dimensions produced for a modality
    fn dimensions(&self, modality: Modality) -> usize;

    /// Generate a unit-norm embedding
    async fn generate(&self, modality: Modality, payload: &str)
        -> Result<Embedding, EmbedderError>;
}
