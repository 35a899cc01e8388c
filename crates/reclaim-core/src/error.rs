//! Engine-level error taxonomy
//!
//! Per-candidate and per-item failures inside ranking loops are logged and
//! skipped by the engine; the variants here are the errors that cross the
//! public API boundary (plus [`MatchingError::PartialModalityFailure`],
//! which is produced per modality and swallowed by the caller).

use crate::item::Modality;
use crate::stores::StoreError;

/// Matching engine error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    /// The embedding backend is not ready to serve requests
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),
    /// A backing store (item, match, or cache) is unreachable
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// Requested item does not exist in its collection
    #[error("item not found: {0}")]
    NotFound(String),
    /// Caller-supplied threshold, limit, or collection is out of range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// No modality produced an embedding for the item
    #[error("could not generate any embeddings for item {0}")]
    EmbeddingGenerationFailed(String),
    /// One modality failed; the operation continues with the rest
    #[error("embedding generation failed for {modality} of item {item_id}: {reason}")]
    PartialModalityFailure {
        item_id: String,
        modality: Modality,
        reason: String,
    },
    /// Catch-all, logged with context and surfaced as a generic failure
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<StoreError> for MatchingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => MatchingError::StoreUnavailable(msg),
            StoreError::Serialization(msg) => MatchingError::Unexpected(msg),
        }
    }
}

/// Matching engine result type
pub type Result<T> = std::result::Result<T, MatchingError>;
