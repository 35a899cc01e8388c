//! Hybrid similarity scoring
//!
//! Pure functions: cosine similarity, the dynamic modality weighting
//! policy, weighted hybrid scores for item pairs, and candidate ranking.
//! The snapshot index in [`crate::index`] batches the same computation;
//! both paths share [`weights_for`] and [`blend`] so their results are
//! identical candidate-by-candidate.

use tracing::warn;

use crate::item::{round4, ComponentScores, EmbeddingSet, Item, MatchKind, Modality, RankedMatch};

// ============================================================================
// WEIGHTING POLICY
// ============================================================================

/// Base weight for the image channel
pub const BASE_IMAGE_WEIGHT: f32 = 0.4;

/// Base weight for each text channel
pub const BASE_TEXT_WEIGHT: f32 = 0.3;

/// CLIP text similarity above which weight shifts toward the text channels
pub const TEXT_AGREEMENT_THRESHOLD: f32 = 0.8;

/// Per-modality weights used in one hybrid computation
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalityWeights {
    /// Weight of the image channel
    pub image: f32,
    /// Weight of the CLIP text channel
    pub text_clip: f32,
    /// Weight of the sentence-transformer channel
    pub text_sentence: f32,
}

impl ModalityWeights {
    /// Base weights before any availability adjustment
    pub const BASE: ModalityWeights = ModalityWeights {
        image: BASE_IMAGE_WEIGHT,
        text_clip: BASE_TEXT_WEIGHT,
        text_sentence: BASE_TEXT_WEIGHT,
    };

    /// Weight of one modality
    pub fn get(&self, modality: Modality) -> f32 {
        match modality {
            Modality::Image => self.image,
            Modality::TextClip => self.text_clip,
            Modality::TextSentence => self.text_sentence,
        }
    }
}

/// Derive the weights for a pair given modality availability and the
/// eagerly computed CLIP text similarity (when both items carry one).
///
/// - both items have an image embedding: image 0.5, each text 0.25
/// - neither has one: image 0, each text 0.5
/// - strong CLIP text agreement (> [`TEXT_AGREEMENT_THRESHOLD`]): shift
///   +0.1 to each text channel, taking up to 0.2 from image (floor 0)
pub(crate) fn adjusted_weights(
    both_have_image: bool,
    neither_has_image: bool,
    text_clip_score: Option<f32>,
) -> ModalityWeights {
    let mut weights = ModalityWeights::BASE;

    if both_have_image {
        weights = ModalityWeights {
            image: 0.5,
            text_clip: 0.25,
            text_sentence: 0.25,
        };
    } else if neither_has_image {
        weights = ModalityWeights {
            image: 0.0,
            text_clip: 0.5,
            text_sentence: 0.5,
        };
    }

    if let Some(score) = text_clip_score {
        if score > TEXT_AGREEMENT_THRESHOLD {
            let taken = weights.image.min(0.2);
            weights.image -= taken;
            weights.text_clip += 0.1;
            weights.text_sentence += 0.1;
        }
    }

    weights
}

/// Dynamic weights for an item pair
pub fn dynamic_weights(a: &EmbeddingSet, b: &EmbeddingSet) -> ModalityWeights {
    let text_clip_score = match (a.get(Modality::TextClip), b.get(Modality::TextClip)) {
        (Some(qa), Some(qb)) => Some(cosine(&qa.vector, &qb.vector).clamp(0.0, 1.0)),
        _ => None,
    };
    adjusted_weights(
        a.has(Modality::Image) && b.has(Modality::Image),
        !a.has(Modality::Image) && !b.has(Modality::Image),
        text_clip_score,
    )
}

/// Weights for a pair, reusing component scores already computed
pub(crate) fn weights_for(
    a: &EmbeddingSet,
    b: &EmbeddingSet,
    components: &ComponentScores,
) -> ModalityWeights {
    adjusted_weights(
        a.has(Modality::Image) && b.has(Modality::Image),
        !a.has(Modality::Image) && !b.has(Modality::Image),
        components.get(Modality::TextClip),
    )
}

// ============================================================================
// SIMILARITY FUNCTIONS
// ============================================================================

/// Compute cosine similarity between two vectors.
/// Returns 0.0 on dimension mismatch or when either norm is zero.
#[inline]
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot_product = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator > 0.0 {
        dot_product / denominator
    } else {
        0.0
    }
}

/// Compute dot product between two equal-length vectors
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// ============================================================================
// HYBRID SCORES
// ============================================================================

/// Result of one hybrid similarity computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridScore {
    /// Weighted total in [0, 1]; 0 when no modality is shared
    pub total: f32,
    /// Per-modality component scores (shared modalities only)
    pub components: ComponentScores,
    /// Normalized weights actually applied
    pub weights: ModalityWeights,
}

impl HybridScore {
    /// A score for a pair sharing no modality
    pub fn empty() -> Self {
        Self {
            total: 0.0,
            components: ComponentScores::default(),
            weights: ModalityWeights {
                image: 0.0,
                text_clip: 0.0,
                text_sentence: 0.0,
            },
        }
    }
}

/// Combine component scores under the given raw weights: restrict to
/// contributing modalities, renormalize to sum 1, and accumulate.
pub(crate) fn blend(components: &ComponentScores, weights: ModalityWeights) -> HybridScore {
    let used: f32 = components.iter().map(|(m, _)| weights.get(m)).sum();
    if components.is_empty() || used <= 0.0 {
        return HybridScore::empty();
    }

    let mut normalized = ModalityWeights {
        image: 0.0,
        text_clip: 0.0,
        text_sentence: 0.0,
    };
    let mut total = 0.0_f32;
    for (modality, score) in components.iter() {
        let weight = weights.get(modality) / used;
        match modality {
            Modality::Image => normalized.image = weight,
            Modality::TextClip => normalized.text_clip = weight,
            Modality::TextSentence => normalized.text_sentence = weight,
        }
        total += score * weight;
    }

    HybridScore {
        total: total.clamp(0.0, 1.0),
        components: *components,
        weights: normalized,
    }
}

/// Per-modality component scores for the modalities both sets carry.
/// Scores are clamped to [0, 1]; a dimension mismatch scores 0 and is
/// logged, not raised.
pub(crate) fn component_scores(a: &EmbeddingSet, b: &EmbeddingSet) -> ComponentScores {
    let mut components = ComponentScores::default();
    for modality in Modality::ALL {
        if let (Some(ea), Some(eb)) = (a.get(modality), b.get(modality)) {
            if ea.dimensions != eb.dimensions {
                warn!(
                    modality = modality.as_str(),
                    left = ea.dimensions,
                    right = eb.dimensions,
                    "embedding dimension mismatch, scoring 0"
                );
            }
            components.set(modality, cosine(&ea.vector, &eb.vector).clamp(0.0, 1.0));
        }
    }
    components
}

/// Weighted hybrid similarity across the modalities both items carry.
/// When `weights` is `None` they are derived via [`dynamic_weights`].
pub fn hybrid_similarity(
    a: &EmbeddingSet,
    b: &EmbeddingSet,
    weights: Option<ModalityWeights>,
) -> HybridScore {
    let components = component_scores(a, b);
    let weights = weights.unwrap_or_else(|| weights_for(a, b, &components));
    blend(&components, weights)
}

// ============================================================================
// CANDIDATE RANKING
// ============================================================================

/// Score every candidate against the query, keep those at or above the
/// threshold, and return at most `max_results`, sorted by descending score
/// with ascending-id tie-break.
pub fn rank_candidates(
    query: &EmbeddingSet,
    candidates: &[Item],
    threshold: f32,
    max_results: usize,
) -> Vec<RankedMatch> {
    let mut matches: Vec<RankedMatch> = candidates
        .iter()
        .filter_map(|candidate| {
            let score = hybrid_similarity(query, &candidate.embeddings, None);
            if score.total >= threshold && !score.components.is_empty() {
                Some(RankedMatch {
                    item_id: candidate.id.clone(),
                    name: candidate.name.clone(),
                    category: candidate.category.clone(),
                    score: round4(score.total),
                    components: score.components.rounded(),
                    kind: MatchKind::classify(&score.components),
                })
            } else {
                None
            }
        })
        .collect();

    finalize_ranking(&mut matches, max_results);
    matches
}

/// Shared tail of every ranking path: descending score, ascending-id
/// tie-break, truncate.
pub(crate) fn finalize_ranking(matches: &mut Vec<RankedMatch>, max_results: usize) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.item_id.cmp(&b.item_id))
    });
    matches.truncate(max_results);
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Collection, Embedding};

    fn set_with(pairs: &[(Modality, Vec<f32>)]) -> EmbeddingSet {
        let mut set = EmbeddingSet::default();
        for (modality, vector) in pairs {
            set.set(*modality, Embedding::unit(vector.clone()));
        }
        set
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine(&v, &v) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine(&a, &b).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_zero_norm() {
        let zero = vec![0.0, 0.0, 0.0];
        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine(&zero, &v), 0.0);
        assert_eq!(cosine(&zero, &zero), 0.0);
    }

    #[test]
    fn test_cosine_dimension_mismatch() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine(&a, &b), 0.0);
    }

    #[test]
    fn test_base_weights_when_one_side_has_image() {
        let weights = adjusted_weights(false, false, Some(0.5));
        assert_eq!(weights, ModalityWeights::BASE);
    }

    #[test]
    fn test_weights_both_images() {
        let weights = adjusted_weights(true, false, None);
        assert_eq!(weights.image, 0.5);
        assert_eq!(weights.text_clip, 0.25);
        assert_eq!(weights.text_sentence, 0.25);
    }

    #[test]
    fn test_weights_no_images() {
        let weights = adjusted_weights(false, true, None);
        assert_eq!(weights.image, 0.0);
        assert_eq!(weights.text_clip, 0.5);
        assert_eq!(weights.text_sentence, 0.5);
    }

    #[test]
    fn test_text_agreement_shifts_weight_off_image() {
        let weights = adjusted_weights(true, false, Some(0.9));
        assert!((weights.image - 0.3).abs() < 1e-6);
        assert!((weights.text_clip - 0.35).abs() < 1e-6);
        assert!((weights.text_sentence - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_text_agreement_floors_image_at_zero() {
        let weights = adjusted_weights(false, true, Some(0.95));
        assert_eq!(weights.image, 0.0);
        assert!((weights.text_clip - 0.6).abs() < 1e-6);
        assert!((weights.text_sentence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_hybrid_weights_sum_to_one_over_shared() {
        let a = set_with(&[
            (Modality::Image, vec![1.0, 0.0, 0.0]),
            (Modality::TextClip, vec![0.0, 1.0]),
        ]);
        let b = set_with(&[
            (Modality::Image, vec![1.0, 1.0, 0.0]),
            (Modality::TextClip, vec![0.0, 1.0]),
            (Modality::TextSentence, vec![1.0, 0.0, 0.0, 0.0]),
        ]);

        let score = hybrid_similarity(&a, &b, None);
        let sum = score.weights.image + score.weights.text_clip + score.weights.text_sentence;
        assert!((sum - 1.0).abs() < 1e-5);
        // sentence channel absent on one side, so it carries no weight
        assert_eq!(score.weights.text_sentence, 0.0);
        assert_eq!(score.components.len(), 2);
    }

    #[test]
    fn test_hybrid_no_shared_modality() {
        let a = set_with(&[(Modality::Image, vec![1.0, 0.0])]);
        let b = set_with(&[(Modality::TextSentence, vec![1.0, 0.0])]);

        let score = hybrid_similarity(&a, &b, None);
        assert_eq!(score.total, 0.0);
        assert!(score.components.is_empty());
    }

    #[test]
    fn test_hybrid_identical_text_both_channels() {
        // Same text through both encoders on both items, no image anywhere
        let a = set_with(&[
            (Modality::TextClip, vec![0.2, 0.4, 0.6]),
            (Modality::TextSentence, vec![0.9, 0.1]),
        ]);
        let b = a.clone();

        let score = hybrid_similarity(&a, &b, None);
        assert!(score.total >= 0.99);
        assert!((score.components.get(Modality::TextClip).unwrap() - 1.0).abs() < 1e-5);
        assert!((score.components.get(Modality::TextSentence).unwrap() - 1.0).abs() < 1e-5);
        assert_eq!(
            crate::item::ConfidenceBucket::from_score(score.total),
            crate::item::ConfidenceBucket::VeryHigh
        );
    }

    #[test]
    fn test_negative_cosine_clamped() {
        let a = set_with(&[(Modality::TextClip, vec![1.0, 0.0])]);
        let b = set_with(&[(Modality::TextClip, vec![-1.0, 0.0])]);

        let score = hybrid_similarity(&a, &b, None);
        assert_eq!(score.total, 0.0);
        assert_eq!(score.components.get(Modality::TextClip), Some(0.0));
    }

    #[test]
    fn test_rank_candidates_order_and_threshold() {
        let query = set_with(&[(Modality::TextClip, vec![1.0, 0.0])]);

        let mut near = Item::new("b-near", Collection::Found);
        near.embeddings = set_with(&[(Modality::TextClip, vec![1.0, 0.1])]);
        let mut exact_a = Item::new("a-exact", Collection::Found);
        exact_a.embeddings = set_with(&[(Modality::TextClip, vec![1.0, 0.0])]);
        let mut exact_c = Item::new("c-exact", Collection::Found);
        exact_c.embeddings = set_with(&[(Modality::TextClip, vec![2.0, 0.0])]);
        let mut far = Item::new("d-far", Collection::Found);
        far.embeddings = set_with(&[(Modality::TextClip, vec![0.0, 1.0])]);

        let candidates = vec![near, exact_a, exact_c, far];
        let ranked = rank_candidates(&query, &candidates, 0.75, 10);

        assert_eq!(ranked.len(), 3);
        // two exact matches tie at 1.0, broken by ascending id
        assert_eq!(ranked[0].item_id, "a-exact");
        assert_eq!(ranked[1].item_id, "c-exact");
        assert_eq!(ranked[2].item_id, "b-near");
        for window in ranked.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
        for m in &ranked {
            assert!(m.score >= 0.75);
            assert_eq!(m.kind, MatchKind::TextClip);
        }
    }

    #[test]
    fn test_rank_candidates_respects_max_results() {
        let query = set_with(&[(Modality::TextSentence, vec![1.0, 0.0])]);
        let candidates: Vec<Item> = (0..8)
            .map(|i| {
                let mut item = Item::new(format!("cand-{i}"), Collection::Found);
                item.embeddings = set_with(&[(Modality::TextSentence, vec![1.0, 0.0])]);
                item
            })
            .collect();

        let ranked = rank_candidates(&query, &candidates, 0.5, 3);
        assert_eq!(ranked.len(), 3);
    }
}
