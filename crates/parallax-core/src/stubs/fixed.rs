//! Fixed-vector embedding provider.
//!
//! Returns hand-chosen vectors for exact texts. End-to-end tests use this
//! to pin the geometry of a scenario (e.g. two translators 8° and 90° from
//! the German) and assert on the divergence ranking that falls out, with no
//! hashing or model in the loop.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{CoreError, CoreResult};
use crate::provider::EmbeddingProvider;

/// Embedding provider backed by an explicit text → vector table.
///
/// # Example
///
/// ```rust
/// use parallax_core::stubs::FixedEmbeddingProvider;
/// use parallax_core::provider::EmbeddingProvider;
///
/// let mut provider = FixedEmbeddingProvider::new(2);
/// provider.insert("so sprach er", vec![1.0, 0.0]);
///
/// assert_eq!(provider.dimension(), 2);
/// assert_eq!(provider.len(), 1);
/// ```
pub struct FixedEmbeddingProvider {
    vectors: BTreeMap<String, Vec<f32>>,
    dimension: usize,
    model_id: String,
}

impl FixedEmbeddingProvider {
    /// Create an empty table for vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: BTreeMap::new(),
            dimension,
            model_id: format!("fixed-vectors-d{}", dimension),
        }
    }

    /// Register the vector for an exact text.
    ///
    /// Panics in the caller's face if the dimension is wrong; this is a
    /// test fixture and a wrong-length vector is a broken test, not a
    /// runtime condition.
    pub fn insert(&mut self, text: impl Into<String>, vector: Vec<f32>) {
        assert_eq!(
            vector.len(),
            self.dimension,
            "fixed vector has wrong dimension"
        );
        self.vectors.insert(text.into(), vector);
    }

    /// Number of registered texts.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// True when no vectors are registered.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbeddingProvider {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        if text.is_empty() {
            return Err(CoreError::EmptyInput("text for fixed embedding".to_string()));
        }
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| CoreError::Embedding(format!("no fixed vector registered for {:?}", text)))
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
    async fn test_fixed_returns_registered_vector() {
        let mut provider = FixedEmbeddingProvider::new(2);
        provider.insert("a", vec![0.0, 1.0]);
        assert_eq!(provider.embed("a").await.unwrap(), vec![0.0, 1.0]);
        assert_eq!(provider.len(), 1);
    }

    #[tokio::test]
    async fn test_fixed_unknown_text_errors() {
        let provider = FixedEmbeddingProvider::new(2);
        let err = provider.embed("missing").await.unwrap_err();
        assert!(matches!(err, CoreError::Embedding(_)));
        assert!(format!("{}", err).contains("missing"));
    }

    #[test]
    #[should_panic(expected = "wrong dimension")]
    fn test_fixed_rejects_wrong_dimension() {
        let mut provider = FixedEmbeddingProvider::new(2);
        provider.insert("a", vec![1.0, 0.0, 0.0]);
    }
}
