//! Text embedding and vector search.
//!
//! Both halves are behind narrow traits: the real embedding model and the
//! real vector database are external collaborators. The shipped
//! implementations, a feature-hashing embedder and an in-memory cosine
//! store, are deterministic and self-contained, which is what the rest of
//! the core is tested against.

pub mod hash_embedder;
pub mod store;

use anyhow::Result;
use async_trait::async_trait;

pub use hash_embedder::HashEmbedder;
pub use store::{InMemoryVectorStore, PayloadFilter, ScoredPoint, VectorStore};

/// Deterministic text→vector mapping.
///
/// For a given model identity the same input must produce byte-identical
/// output on any worker.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Fixed output width.
    fn dimension(&self) -> usize;

    /// Identity of the underlying model; embeddings from different
    /// identities are not comparable.
    fn model_id(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Cosine similarity between two equal-length vectors, clamped to [0, 1].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a * mag_b)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::cosine_similarity;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3_f32, 0.5, 0.2];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0_f32, 0.0];
        let b = vec![0.0_f32, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn cosine_handles_mismatched_or_empty_inputs() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
