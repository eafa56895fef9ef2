//! Deterministic stub embedding provider.
//!
//! Generates embeddings from a content hash so tests are repeatable without
//! a model download:
//!
//! 1. Hash text with `DefaultHasher`
//! 2. Seed an LCG PRNG with the hash
//! 3. Generate `dimension` values in [-1, 1]
//! 4. Normalize to unit length
//!
//! Same text → same vector (determinism tests hold); different text →
//! different vector (similarity structure is non-trivial); unit norm
//! (cosine similarity is valid). Never returns a constant vector — a batch
//! of identical embeddings has a rank-zero covariance and tells the
//! calibrator nothing.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::{CoreError, CoreResult};
use crate::provider::EmbeddingProvider;

/// Hash-seeded deterministic embedding provider.
///
/// # Example
///
/// ```rust
/// use parallax_core::stubs::StubEmbeddingProvider;
/// use parallax_core::provider::EmbeddingProvider;
///
/// let provider = StubEmbeddingProvider::new();
/// assert_eq!(provider.dimension(), 384);
/// ```
pub struct StubEmbeddingProvider {
    dimension: usize,
    model_id: String,
}

impl Default for StubEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StubEmbeddingProvider {
    /// Create with the default 384-dimension output.
    pub fn new() -> Self {
        Self {
            dimension: 384,
            model_id: "stub-multilingual-v1".to_string(),
        }
    }

    /// Create with a custom output dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            model_id: format!("stub-multilingual-v1-d{}", dimension),
        }
    }

    /// Generate the deterministic vector for a text.
    ///
    /// LCG parameters are Knuth's MMIX constants; the multiplier/increment
    /// pair gives a full-period generator over u64.
    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut seed = hasher.finish();

        let mut vector = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            let value = (seed as f64 / u64::MAX as f64) * 2.0 - 1.0;
            vector.push(value as f32);
        }

        let magnitude: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for v in &mut vector {
                *v /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbeddingProvider {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        if text.is_empty() {
            return Err(CoreError::EmptyInput("text for stub embedding".to_string()));
        }
        Ok(self.generate_embedding(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_produces_configured_dimension() {
        let provider = StubEmbeddingProvider::new();
        let vector = provider.embed("Jenseits von Gut und Böse").await.unwrap();
        assert_eq!(vector.len(), 384);

        let small = StubEmbeddingProvider::with_dimension(16);
        let vector = small.embed("Jenseits von Gut und Böse").await.unwrap();
        assert_eq!(vector.len(), 16);
    }

    #[tokio::test]
    async fn test_stub_same_text_same_vector() {
        let provider = StubEmbeddingProvider::new();
        let a = provider.embed("der Wille zur Macht").await.unwrap();
        let b = provider.embed("der Wille zur Macht").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_stub_different_text_different_vector() {
        let provider = StubEmbeddingProvider::new();
        let a = provider.embed("the will to power").await.unwrap();
        let b = provider.embed("the will to truth").await.unwrap();
        assert_ne!(a, b);

        let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!(
            dot < 0.99,
            "different texts should not be near-identical, got dot={}",
            dot
        );
    }

    #[tokio::test]
    async fn test_stub_vector_is_unit_norm() {
        let provider = StubEmbeddingProvider::new();
        let vector = provider.embed("Moralische Vorurtheile").await.unwrap();
        let magnitude: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!(
            (magnitude - 1.0).abs() < 1e-3,
            "expected unit norm, got {}",
            magnitude
        );
    }

    #[tokio::test]
    async fn test_stub_empty_text_fails() {
        let provider = StubEmbeddingProvider::new();
        let result = provider.embed("").await;
        assert!(matches!(result, Err(CoreError::EmptyInput(_))));
    }

    #[tokio::test]
    async fn test_stub_batch_matches_single() {
        let provider = StubEmbeddingProvider::with_dimension(32);
        let texts = ["erste", "zweite", "dritte"];
        let batch = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 3);
        for (text, vector) in texts.iter().zip(&batch) {
            let single = provider.embed(text).await.unwrap();
            assert_eq!(&single, vector);
        }
    }

    #[tokio::test]
    async fn test_stub_consistent_across_instances() {
        let a = StubEmbeddingProvider::new();
        let b = StubEmbeddingProvider::new();
        let va = a.embed("Sternen-Freundschaft").await.unwrap();
        let vb = b.embed("Sternen-Freundschaft").await.unwrap();
        assert_eq!(va, vb);
    }

    #[tokio::test]
    async fn test_stub_unicode_distinct_from_ascii() {
        let provider = StubEmbeddingProvider::new();
        let german = provider.embed("Gedächtniss").await.unwrap();
        let ascii = provider.embed("Gedachtniss").await.unwrap();
        assert_ne!(german, ascii);
    }
}
