//! Snapshot candidate index
//!
//! Ephemeral, query-scoped structure over a point-in-time copy of one
//! collection: a flattened unit-vector matrix per modality plus a parallel
//! metadata array. Queries batch the dot products per modality column and
//! then apply the exact weighting rule of [`crate::similarity`], so a
//! query returns the same rows as calling `hybrid_similarity` against
//! every candidate in turn. Rebuilt from the store on every matching call;
//! never persisted.

use tracing::{debug, warn};

use crate::item::{
    round4, ComponentScores, EmbeddingSet, Item, MatchKind, Modality, RankedMatch,
};
use crate::similarity::{blend, dot, finalize_ranking, weights_for};

// ============================================================================
// MODALITY COLUMNS
// ============================================================================

/// Unit vectors of one modality, flattened row-major
#[derive(Debug, Default)]
struct ModalityColumn {
    dimensions: usize,
    /// Row-major vector data, `owners.len() * dimensions` values
    data: Vec<f32>,
    /// Metadata index of each row's item
    owners: Vec<usize>,
    /// Rows whose dimensionality differs from the column's; scored
    /// individually so results stay identical to the pairwise path
    ragged: Vec<(usize, Vec<f32>)>,
}

impl ModalityColumn {
    fn push(&mut self, owner: usize, vector: &[f32]) {
        if self.owners.is_empty() && self.ragged.is_empty() {
            self.dimensions = vector.len();
        }
        if vector.len() != self.dimensions {
            warn!(
                expected = self.dimensions,
                got = vector.len(),
                "ragged embedding row, scoring it outside the matrix"
            );
            self.ragged.push((owner, vector.to_vec()));
            return;
        }
        self.data.extend_from_slice(vector);
        self.owners.push(owner);
    }

    fn rows(&self) -> usize {
        self.owners.len() + self.ragged.len()
    }

    /// Dot product of every row against the query, written into `scores`
    /// by owner index. The query must be unit-norm for the result to be a
    /// cosine; a dimension mismatch scores 0, exactly like `cosine`.
    fn accumulate(&self, query: &[f32], scores: &mut [Option<f32>]) {
        if query.len() == self.dimensions {
            for (row, owner) in self.owners.iter().enumerate() {
                let start = row * self.dimensions;
                let product = dot(query, &self.data[start..start + self.dimensions]);
                scores[*owner] = Some(product.clamp(0.0, 1.0));
            }
        } else if !self.owners.is_empty() {
            warn!(
                expected = self.dimensions,
                got = query.len(),
                "query dimension mismatch, scoring column 0"
            );
            for owner in &self.owners {
                scores[*owner] = Some(0.0);
            }
        }

        for (owner, vector) in &self.ragged {
            let product = if query.len() == vector.len() {
                dot(query, vector).clamp(0.0, 1.0)
            } else {
                0.0
            };
            scores[*owner] = Some(product);
        }
    }
}

// ============================================================================
// CANDIDATE INDEX
// ============================================================================

/// In-memory index over a collection snapshot
pub struct CandidateIndex {
    entries: Vec<Item>,
    image: ModalityColumn,
    text_clip: ModalityColumn,
    text_sentence: ModalityColumn,
}

impl CandidateIndex {
    /// Build from a snapshot, dropping items that carry no embedding at
    /// all and normalizing every vector (idempotent for unit vectors).
    pub fn build(snapshot: Vec<Item>) -> Self {
        let mut entries: Vec<Item> = snapshot
            .into_iter()
            .filter(|item| !item.embeddings.is_empty())
            .collect();

        let mut image = ModalityColumn::default();
        let mut text_clip = ModalityColumn::default();
        let mut text_sentence = ModalityColumn::default();

        for (idx, item) in entries.iter_mut().enumerate() {
            item.embeddings.normalize();
            if let Some(embedding) = item.embeddings.get(Modality::Image) {
                image.push(idx, &embedding.vector);
            }
            if let Some(embedding) = item.embeddings.get(Modality::TextClip) {
                text_clip.push(idx, &embedding.vector);
            }
            if let Some(embedding) = item.embeddings.get(Modality::TextSentence) {
                text_sentence.push(idx, &embedding.vector);
            }
        }

        debug!(
            candidates = entries.len(),
            image_rows = image.rows(),
            text_clip_rows = text_clip.rows(),
            text_sentence_rows = text_sentence.rows(),
            "candidate index built"
        );

        Self {
            entries,
            image,
            text_clip,
            text_sentence,
        }
    }

    /// Number of indexed candidates
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the snapshot held no usable candidate
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn column(&self, modality: Modality) -> &ModalityColumn {
        match modality {
            Modality::Image => &self.image,
            Modality::TextClip => &self.text_clip,
            Modality::TextSentence => &self.text_sentence,
        }
    }

    /// Rank the indexed candidates against the query embeddings.
    ///
    /// Batches one dot-product pass per modality the query carries, then
    /// combines per candidate with the dynamic weighting rule (weights
    /// differ per pair because modality availability differs).
    pub fn query(
        &self,
        query: &EmbeddingSet,
        threshold: f32,
        top_k: usize,
    ) -> Vec<RankedMatch> {
        if self.is_empty() || query.is_empty() {
            return Vec::new();
        }

        let mut query = query.clone();
        query.normalize();

        // One score lane per modality, indexed by candidate
        let mut lanes: [Vec<Option<f32>>; 3] = [
            vec![None; self.entries.len()],
            vec![None; self.entries.len()],
            vec![None; self.entries.len()],
        ];
        for (lane, modality) in lanes.iter_mut().zip(Modality::ALL) {
            if let Some(embedding) = query.get(modality) {
                self.column(modality).accumulate(&embedding.vector, lane);
            }
        }

        let mut matches: Vec<RankedMatch> = Vec::new();
        for (idx, candidate) in self.entries.iter().enumerate() {
            let mut components = ComponentScores::default();
            for (lane, modality) in lanes.iter().zip(Modality::ALL) {
                if let Some(score) = lane[idx] {
                    components.set(modality, score);
                }
            }
            if components.is_empty() {
                continue;
            }

            let weights = weights_for(&query, &candidate.embeddings, &components);
            let score = blend(&components, weights);
            if score.total >= threshold {
                matches.push(RankedMatch {
                    item_id: candidate.id.clone(),
                    name: candidate.name.clone(),
                    category: candidate.category.clone(),
                    score: round4(score.total),
                    components: score.components.rounded(),
                    kind: MatchKind::classify(&score.components),
                });
            }
        }

        finalize_ranking(&mut matches, top_k);
        matches
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Collection, Embedding};
    use crate::similarity::rank_candidates;

    fn candidate(id: &str, pairs: &[(Modality, Vec<f32>)]) -> Item {
        let mut item = Item::new(id, Collection::Found);
        item.name = format!("candidate {id}");
        for (modality, vector) in pairs {
            item.embeddings.set(*modality, Embedding::new(vector.clone()));
        }
        item
    }

    fn query_set(pairs: &[(Modality, Vec<f32>)]) -> EmbeddingSet {
        let mut set = EmbeddingSet::default();
        for (modality, vector) in pairs {
            set.set(*modality, Embedding::unit(vector.clone()));
        }
        set
    }

    #[test]
    fn test_empty_snapshot_returns_nothing() {
        let index = CandidateIndex::build(Vec::new());
        let query = query_set(&[(Modality::TextClip, vec![1.0, 0.0])]);

        assert!(index.is_empty());
        assert!(index.query(&query, 0.0, 10).is_empty());
    }

    #[test]
    fn test_items_without_embeddings_are_dropped() {
        let bare = Item::new("bare", Collection::Found);
        let with = candidate("with", &[(Modality::TextClip, vec![1.0, 0.0])]);

        let index = CandidateIndex::build(vec![bare, with]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_build_normalizes_vectors() {
        // Raw, unnormalized candidate vector still scores as a cosine
        let index = CandidateIndex::build(vec![candidate(
            "c1",
            &[(Modality::TextClip, vec![5.0, 0.0])],
        )]);
        let query = query_set(&[(Modality::TextClip, vec![1.0, 0.0])]);

        let results = index.query(&query, 0.9, 10);
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_query_matches_pairwise_hybrid_similarity() {
        let candidates = vec![
            candidate(
                "c1",
                &[
                    (Modality::Image, vec![1.0, 0.0, 0.2]),
                    (Modality::TextClip, vec![0.3, 0.8]),
                    (Modality::TextSentence, vec![0.5, 0.5, 0.1, 0.0]),
                ],
            ),
            candidate("c2", &[(Modality::TextClip, vec![0.9, 0.1])]),
            candidate(
                "c3",
                &[
                    (Modality::TextClip, vec![0.2, 0.9]),
                    (Modality::TextSentence, vec![0.1, 0.9, 0.2, 0.4]),
                ],
            ),
        ];
        let query = query_set(&[
            (Modality::TextClip, vec![0.25, 0.85]),
            (Modality::TextSentence, vec![0.4, 0.6, 0.1, 0.1]),
        ]);

        let from_index = CandidateIndex::build(candidates.clone()).query(&query, 0.0, 10);
        let pairwise = rank_candidates(&query, &candidates, 0.0, 10);

        assert_eq!(from_index.len(), pairwise.len());
        for (a, b) in from_index.iter().zip(pairwise.iter()) {
            assert_eq!(a.item_id, b.item_id);
            assert!((a.score - b.score).abs() < 1e-4, "{} vs {}", a.score, b.score);
            assert_eq!(a.kind, b.kind);
        }
    }

    #[test]
    fn test_threshold_and_top_k() {
        let candidates: Vec<Item> = (0..6)
            .map(|i| {
                let spread = i as f32 * 0.2;
                candidate(
                    &format!("c{i}"),
                    &[(Modality::TextSentence, vec![1.0, spread])],
                )
            })
            .collect();
        let query = query_set(&[(Modality::TextSentence, vec![1.0, 0.0])]);

        let index = CandidateIndex::build(candidates);
        let results = index.query(&query, 0.8, 3);

        assert!(results.len() <= 3);
        for m in &results {
            assert!(m.score >= 0.8);
        }
        for window in results.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
    }

    #[test]
    fn test_ragged_rows_match_pairwise_scoring() {
        // Two candidates carry TextClip vectors of different lengths; the
        // one matching the query's dimensionality must score normally
        let candidates = vec![
            candidate("c1", &[(Modality::TextClip, vec![1.0, 0.0, 0.0])]),
            candidate("c2", &[(Modality::TextClip, vec![1.0, 0.0])]),
        ];
        let query = query_set(&[(Modality::TextClip, vec![1.0, 0.0])]);

        let from_index = CandidateIndex::build(candidates.clone()).query(&query, 0.0, 10);
        let pairwise = rank_candidates(&query, &candidates, 0.0, 10);

        assert_eq!(from_index.len(), pairwise.len());
        for (a, b) in from_index.iter().zip(pairwise.iter()) {
            assert_eq!(a.item_id, b.item_id);
            assert!((a.score - b.score).abs() < 1e-4);
        }
    }

    #[test]
    fn test_dimension_mismatch_scores_zero() {
        let index = CandidateIndex::build(vec![candidate(
            "c1",
            &[(Modality::TextClip, vec![1.0, 0.0, 0.0])],
        )]);
        // Query vector has a different dimensionality
        let query = query_set(&[(Modality::TextClip, vec![1.0, 0.0])]);

        let results = index.query(&query, 0.0, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 0.0);
    }
}
