//! Match records and ranked query results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Collection, Modality};

// ============================================================================
// COMPONENT SCORES
// ============================================================================

/// Per-modality similarity scores for one item pair. A component is only
/// present when both items carry that modality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentScores {
    /// Image-to-image similarity
    pub image: Option<f32>,
    /// CLIP text similarity
    pub text_clip: Option<f32>,
    /// Sentence-transformer text similarity
    pub text_sentence: Option<f32>,
}

impl ComponentScores {
    /// Get the score for a modality
    pub fn get(&self, modality: Modality) -> Option<f32> {
        match modality {
            Modality::Image => self.image,
            Modality::TextClip => self.text_clip,
            Modality::TextSentence => self.text_sentence,
        }
    }

    /// Store the score for a modality
    pub fn set(&mut self, modality: Modality, score: f32) {
        match modality {
            Modality::Image => self.image = Some(score),
            Modality::TextClip => self.text_clip = Some(score),
            Modality::TextSentence => self.text_sentence = Some(score),
        }
    }

    /// Number of contributing modalities
    pub fn len(&self) -> usize {
        Modality::ALL
            .into_iter()
            .filter(|m| self.get(*m).is_some())
            .count()
    }

    /// True when no modality contributed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over present (modality, score) pairs
    pub fn iter(&self) -> impl Iterator<Item = (Modality, f32)> + '_ {
        Modality::ALL
            .into_iter()
            .filter_map(|m| self.get(m).map(|s| (m, s)))
    }

    /// The modality with the strongest score, if any contributed
    pub fn dominant(&self) -> Option<(Modality, f32)> {
        self.iter().fold(None, |best, (modality, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((modality, score)),
        })
    }

    /// Copy with every score rounded to 4 decimal places
    pub fn rounded(&self) -> ComponentScores {
        let mut out = ComponentScores::default();
        for (modality, score) in self.iter() {
            out.set(modality, round4(score));
        }
        out
    }
}

/// Round a score to 4 decimal places for reporting
pub(crate) fn round4(score: f32) -> f32 {
    (score * 10_000.0).round() / 10_000.0
}

// ============================================================================
// MATCH CLASSIFICATION
// ============================================================================

/// How a match was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// More than one modality contributed
    Hybrid,
    /// Image similarity only
    Image,
    /// CLIP text similarity only
    TextClip,
    /// Sentence-transformer similarity only
    TextSentence,
}

impl MatchKind {
    /// Classify from the contributing component scores
    pub fn classify(components: &ComponentScores) -> MatchKind {
        if components.len() > 1 {
            return MatchKind::Hybrid;
        }
        match components.iter().next().map(|(m, _)| m) {
            Some(Modality::Image) => MatchKind::Image,
            Some(Modality::TextClip) => MatchKind::TextClip,
            Some(Modality::TextSentence) => MatchKind::TextSentence,
            // No shared modality; callers filter these out before persisting
            None => MatchKind::Hybrid,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Hybrid => "hybrid",
            MatchKind::Image => "image",
            MatchKind::TextClip => "text_clip",
            MatchKind::TextSentence => "text_sentence",
        }
    }
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// CONFIDENCE BUCKETS
// ============================================================================

/// Discrete confidence label derived from a total similarity score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBucket {
    /// Score at or above 0.95
    VeryHigh,
    /// Score at or above 0.8
    High,
    /// Score at or above 0.6
    Medium,
    /// Everything below
    Low,
}

impl ConfidenceBucket {
    /// Bucket a total similarity score
    pub fn from_score(score: f32) -> ConfidenceBucket {
        if score >= 0.95 {
            ConfidenceBucket::VeryHigh
        } else if score >= 0.8 {
            ConfidenceBucket::High
        } else if score >= 0.6 {
            ConfidenceBucket::Medium
        } else {
            ConfidenceBucket::Low
        }
    }
}

impl std::fmt::Display for ConfidenceBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConfidenceBucket::VeryHigh => "Very High",
            ConfidenceBucket::High => "High",
            ConfidenceBucket::Medium => "Medium",
            ConfidenceBucket::Low => "Low",
        };
        write!(f, "{label}")
    }
}

// ============================================================================
// MATCH RECORDS
// ============================================================================

/// A persisted match between two items from opposite collections.
/// Immutable once written; duplicates across repeated runs are acceptable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    /// Unique record id (UUID v4)
    pub id: String,
    /// The item the match was computed for
    pub source_item_id: String,
    /// The candidate it matched
    pub target_item_id: String,
    /// Collection the candidate lives in
    pub target_collection: Collection,
    /// Per-modality component scores
    pub components: ComponentScores,
    /// Weighted total similarity in [0, 1]
    pub total: f32,
    /// Classification of the match
    pub kind: MatchKind,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Build a record for a ranked match against `target_collection`
    pub fn from_ranked(
        source_item_id: impl Into<String>,
        target_collection: Collection,
        ranked: &RankedMatch,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_item_id: source_item_id.into(),
            target_item_id: ranked.item_id.clone(),
            target_collection,
            components: ranked.components,
            total: ranked.score,
            kind: ranked.kind,
            created_at: Utc::now(),
        }
    }
}

/// One row of a ranked candidate query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedMatch {
    /// Candidate item id
    pub item_id: String,
    /// Candidate item name
    pub name: String,
    /// Candidate category
    pub category: String,
    /// Weighted total similarity, rounded to 4 decimals
    pub score: f32,
    /// Per-modality component scores, rounded to 4 decimals
    pub components: ComponentScores,
    /// Classification of the match
    pub kind: MatchKind,
}

// ============================================================================
// TESTS
// ============================================================================
