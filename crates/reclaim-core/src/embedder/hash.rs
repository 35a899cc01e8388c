//! Deterministic hash-seeded embedding backend
//!
//! Maps a payload to a unit-norm vector by seeding a xorshift generator
//! with an FNV-1a hash of (modality, payload). Equal payloads always
//! produce equal vectors, which is exactly what matching needs from a
//! stand-in: identical descriptions score 1.0, unrelated ones score near
//! 0 at 384-512 dimensions. No model weights, no I/O.

use async_trait::async_trait;

use crate::item::{Embedding, Modality};

use super::{
    Embedder, EmbedderError, IMAGE_DIMENSIONS, TEXT_CLIP_DIMENSIONS, TEXT_SENTENCE_DIMENSIONS,
};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(seed: u64, bytes: &[u8]) -> u64 {
    let mut hash = seed;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn xorshift(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *state = x;
    x
}

/// Deterministic local embedding backend
#[derive(Debug, Clone, Default)]
pub struct HashEmbedder {
    _unused: (),
}

impl HashEmbedder {
    /// Create a new backend
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn is_ready(&self) -> bool {
        true
    }

    fn dimensions(&self, modality: Modality) -> usize {
        match modality {
            Modality::Image => IMAGE_DIMENSIONS,
            Modality::TextClip => TEXT_CLIP_DIMENSIONS,
            Modality::TextSentence => TEXT_SENTENCE_DIMENSIONS,
        }
    }

    async fn generate(
        &self,
        modality: Modality,
        payload: &str,
    ) -> Result<Embedding, EmbedderError> {
        if payload.trim().is_empty() {
            return Err(EmbedderError::InvalidInput(
                "payload cannot be empty".to_string(),
            ));
        }

        // Seed on (modality, payload) so the two text channels stay
        // independent encodings of the same text
        let mut state = fnv1a(
            fnv1a(FNV_OFFSET, modality.as_str().as_bytes()),
            payload.as_bytes(),
        );
        if state == 0 {
            state = FNV_OFFSET;
        }

        let dimensions = self.dimensions(modality);
        let mut vector = Vec::with_capacity(dimensions);
        for _ in 0..dimensions {
            let raw = xorshift(&mut state);
            // Map to [-1, 1]
            let value = (raw >> 11) as f32 / (1u64 << 53) as f32 * 2.0 - 1.0;
            vector.push(value);
        }

        Ok(Embedding::unit(vector))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine;

    #[tokio::test]
    async fn test_deterministic_and_unit_norm() {
        let embedder = HashEmbedder::new();
        let a = embedder
            .generate(Modality::TextClip, "blue backpack")
            .await
            .unwrap();
        let b = embedder
            .generate(Modality::TextClip, "blue backpack")
            .await
            .unwrap();

        assert_eq!(a.vector, b.vector);
        assert_eq!(a.dimensions, TEXT_CLIP_DIMENSIONS);
        assert!(a.is_normalized());
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let embedder = HashEmbedder::new();
        let clip = embedder
            .generate(Modality::TextClip, "blue backpack")
            .await
            .unwrap();
        let sentence = embedder
            .generate(Modality::TextSentence, "blue backpack")
            .await
            .unwrap();

        assert_ne!(clip.dimensions, sentence.dimensions);
    }

    #[tokio::test]
    async fn test_distinct_payloads_are_dissimilar() {
        let embedder = HashEmbedder::new();
        let a = embedder
            .generate(Modality::TextSentence, "blue backpack")
            .await
            .unwrap();
        let b = embedder
            .generate(Modality::TextSentence, "silver wristwatch")
            .await
            .unwrap();

        let similarity = cosine(&a.vector, &b.vector);
        assert!(similarity.abs() < 0.3, "got {similarity}");
    }

    #[tokio::test]
    async fn test_empty_payload_rejected() {
        let embedder = HashEmbedder::new();
        let result = embedder.generate(Modality::Image, "  ").await;
        assert!(matches!(result, Err(EmbedderError::InvalidInput(_))));
    }
}
