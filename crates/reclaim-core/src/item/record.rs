//! Embeddings and item records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Collection, ItemStatus, Modality};

// ============================================================================
// EMBEDDING TYPE
// ============================================================================

/// A fixed-dimension embedding vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// The embedding vector
    pub vector: Vec<f32>,
    /// Dimensions of the vector
    pub dimensions: usize,
}

impl Embedding {
    /// Create a new embedding from a vector
    pub fn new(vector: Vec<f32>) -> Self {
        let dimensions = vector.len();
        Self { vector, dimensions }
    }

    /// Create an embedding normalized to unit length
    pub fn unit(vector: Vec<f32>) -> Self {
        let mut embedding = Self::new(vector);
        embedding.normalize();
        embedding
    }

    /// Normalize the embedding vector to unit length.
    /// A zero vector is left untouched and scores 0 against everything.
    pub fn normalize(&mut self) {
        let norm = self.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut self.vector {
                *x /= norm;
            }
        }
    }

    /// Check if the embedding is normalized (unit length)
    pub fn is_normalized(&self) -> bool {
        let norm = self.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        (norm - 1.0).abs() < 0.001
    }

    /// Convert to bytes for caching. Little-endian f32, bit-exact.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.vector.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Create from bytes produced by [`Embedding::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 4 != 0 {
            return None;
        }
        let vector: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Some(Self::new(vector))
    }
}

// ============================================================================
// EMBEDDING SET
// ============================================================================

/// Per-modality embeddings of one item. Any subset of the three channels
/// may be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingSet {
    /// CLIP visual embedding
    pub image: Option<Embedding>,
    /// CLIP text embedding
    pub text_clip: Option<Embedding>,
    /// Sentence-transformer text embedding
    pub text_sentence: Option<Embedding>,
}

impl EmbeddingSet {
    /// Get the embedding for a modality
    pub fn get(&self, modality: Modality) -> Option<&Embedding> {
        match modality {
            Modality::Image => self.image.as_ref(),
            Modality::TextClip => self.text_clip.as_ref(),
            Modality::TextSentence => self.text_sentence.as_ref(),
        }
    }

    /// Store the embedding for a modality
    pub fn set(&mut self, modality: Modality, embedding: Embedding) {
        match modality {
            Modality::Image => self.image = Some(embedding),
            Modality::TextClip => self.text_clip = Some(embedding),
            Modality::TextSentence => self.text_sentence = Some(embedding),
        }
    }

    /// Whether the modality is present
    pub fn has(&self, modality: Modality) -> bool {
        self.get(modality).is_some()
    }

    /// Modalities present in this set
    pub fn present(&self) -> Vec<Modality> {
        Modality::ALL
            .into_iter()
            .filter(|m| self.has(*m))
            .collect()
    }

    /// True when no modality is present
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.text_clip.is_none() && self.text_sentence.is_none()
    }

    /// Normalize every present embedding in place (idempotent)
    pub fn normalize(&mut self) {
        for slot in [
            &mut self.image,
            &mut self.text_clip,
            &mut self.text_sentence,
        ] {
            if let Some(embedding) = slot {
                embedding.normalize();
            }
        }
    }

    /// Merge another set into this one: present channels of `other` win,
    /// absent channels keep the existing embedding.
    pub fn merge(&mut self, other: EmbeddingSet) {
        if other.image.is_some() {
            self.image = other.image;
        }
        if other.text_clip.is_some() {
            self.text_clip = other.text_clip;
        }
        if other.text_sentence.is_some() {
            self.text_sentence = other.text_sentence;
        }
    }
}

// ============================================================================
// ITEM RECORD
// ============================================================================

/// A lost or found item report with its embeddings and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique identifier, assigned by the reporting backend
    pub id: String,
    /// Which pool the item belongs to
    pub collection: Collection,
    /// Lifecycle status
    pub status: ItemStatus,
    /// Per-modality embeddings
    pub embeddings: EmbeddingSet,
    /// Item name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Category label
    pub category: String,
    /// Reference to the item photo, if any
    pub image_ref: Option<String>,
    /// When embeddings were last generated for this item
    pub processed_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Create a new active item without embeddings
    pub fn new(id: impl Into<String>, collection: Collection) -> Self {
        Self {
            id: id.into(),
            collection,
            status: ItemStatus::Active,
            embeddings: EmbeddingSet::default(),
            name: String::new(),
            description: String::new(),
            category: String::new(),
            image_ref: None,
            processed_at: None,
        }
    }

    /// Name and description joined for text embedding
    pub fn text_payload(&self) -> String {
        let mut text = self.name.trim().to_string();
        let description = self.description.trim();
        if !description.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(description);
        }
        text
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_normalize() {
        let mut embedding = Embedding::new(vec![3.0, 4.0]);
        embedding.normalize();

        assert!(embedding.is_normalized());
        assert!((embedding.vector[0] - 0.6).abs() < 0.0001);
        assert!((embedding.vector[1] - 0.8).abs() < 0.0001);
    }

    #[test]
    fn test_embedding_normalize_zero_vector() {
        let mut embedding = Embedding::new(vec![0.0, 0.0, 0.0]);
        embedding.normalize();
        assert_eq!(embedding.vector, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_embedding_bytes_bit_exact() {
        let original = Embedding::new(vec![0.1, -2.5, 3.75, f32::MIN_POSITIVE]);
        let restored = Embedding::from_bytes(&original.to_bytes()).unwrap();

        assert_eq!(original.vector.len(), restored.vector.len());
        for (a, b) in original.vector.iter().zip(restored.vector.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_embedding_from_bytes_rejects_ragged_input() {
        assert!(Embedding::from_bytes(&[1, 2, 3]).is_none());
    }

    #[test]
    fn test_embedding_set_accessors() {
        let mut set = EmbeddingSet::default();
        assert!(set.is_empty());

        set.set(Modality::TextClip, Embedding::new(vec![1.0, 0.0]));
        assert!(set.has(Modality::TextClip));
        assert!(!set.has(Modality::Image));
        assert_eq!(set.present(), vec![Modality::TextClip]);
    }

    #[test]
    fn test_embedding_set_merge_keeps_absent_channels() {
        let mut base = EmbeddingSet::default();
        base.set(Modality::Image, Embedding::new(vec![1.0]));

        let mut update = EmbeddingSet::default();
        update.set(Modality::TextClip, Embedding::new(vec![0.5]));

        base.merge(update);
        assert!(base.has(Modality::Image));
        assert!(base.has(Modality::TextClip));
    }

    #[test]
    fn test_item_text_payload() {
        let mut item = Item::new("item-1", Collection::Lost);
        item.name = "Blue backpack".to_string();
        item.description = "Nike, torn left strap".to_string();

        assert_eq!(item.text_payload(), "Blue backpack Nike, torn left strap");

        item.description.clear();
        assert_eq!(item.text_payload(), "Blue backpack");
    }
}
