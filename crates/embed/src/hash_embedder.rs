//! Feature-hashing embedder.
//!
//! Each token is hashed (with the model identity as a prefix) into a bucket
//! and a sign, and the resulting vector is L2-normalized. Not semantically
//! deep, but deterministic across workers and good enough for overlap-style
//! similarity in tests and default wiring.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::Embedder;

pub const DEFAULT_DIMENSION: usize = 384;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    model_id: String,
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(model_id: impl Into<String>, dimension: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimension,
        }
    }

    fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|ch: char| !ch.is_alphanumeric())
            .filter(|t| t.len() >= 2)
            .map(|t| t.to_lowercase())
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];

        for token in Self::tokenize(text) {
            let mut hasher = Sha256::new();
            hasher.update(self.model_id.as_bytes());
            hasher.update(b":");
            hasher.update(token.as_bytes());
            let digest = hasher.finalize();

            let bucket = u64::from_le_bytes(digest[0..8].try_into().unwrap()) as usize
                % self.dimension;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new("hash-v1", DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosine_similarity;

    /// Fixed reference strings. Any change to the hashing scheme must be
    /// caught here, since stored embeddings depend on it.
    const REFERENCE: &str = "The quick brown fox jumps over the lazy dog";

    #[tokio::test]
    async fn embedding_is_deterministic_across_instances() {
        let a = HashEmbedder::default();
        let b = HashEmbedder::default();
        let va = a.embed(REFERENCE).await.unwrap();
        let vb = b.embed(REFERENCE).await.unwrap();
        // Byte-identical, not merely close.
        assert_eq!(va, vb);
    }

    #[tokio::test]
    async fn embedding_has_fixed_width_and_unit_norm() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed(REFERENCE).await.unwrap();
        assert_eq!(v.len(), DEFAULT_DIMENSION);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn different_model_identities_produce_different_vectors() {
        let a = HashEmbedder::new("hash-v1", 64);
        let b = HashEmbedder::new("hash-v2", 64);
        let va = a.embed(REFERENCE).await.unwrap();
        let vb = b.embed(REFERENCE).await.unwrap();
        assert_ne!(va, vb);
    }

    #[tokio::test]
    async fn overlapping_texts_are_more_similar_than_disjoint_ones() {
        let embedder = HashEmbedder::default();
        let base = embedder
            .embed("covenant faithfulness in the torah")
            .await
            .unwrap();
        let close = embedder
            .embed("torah teaching about covenant")
            .await
            .unwrap();
        let far = embedder
            .embed("asynchronous network socket buffering")
            .await
            .unwrap();

        assert!(cosine_similarity(&base, &close) > cosine_similarity(&base, &far));
    }

    #[tokio::test]
    async fn embed_many_matches_individual_embeds() {
        let embedder = HashEmbedder::default();
        let texts = vec!["alpha beta".to_string(), "gamma delta".to_string()];
        let batch = embedder.embed_many(&texts).await.unwrap();
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(&embedder.embed(text).await.unwrap(), vector);
        }
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
