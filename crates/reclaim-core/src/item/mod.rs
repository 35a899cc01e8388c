//! Item module - core types for lost & found reports
//!
//! - Collections: the two disjoint pools (lost / found) matched against
//!   each other
//! - Modalities: the closed set of embedding channels
//! - Item records with per-modality embedding sets
//! - Match records and ranked query results

mod match_result;
mod record;

pub use match_result::{ComponentScores, ConfidenceBucket, MatchKind, MatchRecord, RankedMatch};
pub(crate) use match_result::round4;
pub use record::{Embedding, EmbeddingSet, Item};

use serde::{Deserialize, Serialize};

// ============================================================================
// COLLECTIONS
// ============================================================================

/// One of the two disjoint item pools. Each collection is matched against
/// the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Items reported lost by their owners
    Lost,
    /// Items handed in after being found
    Found,
}

impl Collection {
    /// The collection this one is matched against
    pub fn opposite(&self) -> Collection {
        match self {
            Collection::Lost => Collection::Found,
            Collection::Found => Collection::Lost,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Lost => "lost",
            Collection::Found => "found",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lost" | "lost_items" => Ok(Collection::Lost),
            "found" | "found_items" => Ok(Collection::Found),
            other => Err(format!("unknown collection: {other}")),
        }
    }
}

// ============================================================================
// MODALITIES
// ============================================================================

/// An embedding channel. The two text channels come from independent
/// encoders (CLIP text and a sentence transformer) and are never compared
/// to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// CLIP visual embedding of the item photo
    Image,
    /// CLIP text embedding of name + description
    TextClip,
    /// Sentence-transformer embedding of name + description
    TextSentence,
}

impl Modality {
    /// All modalities, in weighting order
    pub const ALL: [Modality; 3] = [Modality::Image, Modality::TextClip, Modality::TextSentence];

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Image => "image",
            Modality::TextClip => "text_clip",
            Modality::TextSentence => "text_sentence",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// ITEM LIFECYCLE
// ============================================================================

/// Lifecycle status of an item report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Open report, eligible for matching
    #[default]
    Active,
    /// At least one persisted match exists
    HasMatches,
    /// Owner and item reunited
    Resolved,
    /// Closed without resolution
    Archived,
}

impl ItemStatus {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Active => "active",
            ItemStatus::HasMatches => "has_matches",
            ItemStatus::Resolved => "resolved",
            ItemStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_collection_opposite() {
        assert_eq!(Collection::Lost.opposite(), Collection::Found);
        assert_eq!(Collection::Found.opposite(), Collection::Lost);
    }

    #[test]
    fn test_collection_parse() {
        assert_eq!(Collection::from_str("lost").unwrap(), Collection::Lost);
        assert_eq!(Collection::from_str("FOUND").unwrap(), Collection::Found);
        assert_eq!(
            Collection::from_str("found_items").unwrap(),
            Collection::Found
        );
        assert!(Collection::from_str("misplaced").is_err());
    }

    #[test]
    fn test_modality_names() {
        assert_eq!(Modality::Image.as_str(), "image");
        assert_eq!(Modality::TextClip.as_str(), "text_clip");
        assert_eq!(Modality::TextSentence.as_str(), "text_sentence");
    }
}
