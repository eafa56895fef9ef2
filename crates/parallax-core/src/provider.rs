//! Embedding provider trait.
//!
//! The pipeline never talks to a concrete embedding backend; it talks to
//! [`EmbeddingProvider`]. The seam is deliberately narrow — embed text, get
//! a vector, know the dimension — so the calibration and divergence math can
//! be tested against a deterministic in-process provider while production
//! wires in a real multilingual model.
//!
//! ```text
//! EmbeddingProvider (trait)
//! ├── embed(&str) -> Vec<f32>            // single text
//! ├── embed_batch(&[&str]) -> Vec<Vec<f32>>  // default: loop over embed
//! ├── dimension() -> usize               // output dimension, fixed per model
//! └── model_id() -> &str                 // model identifier
//! ```

use async_trait::async_trait;

use crate::error::CoreResult;

/// Trait for sentence-embedding providers.
///
/// Implementations convert text to dense vectors of a fixed dimension.
/// Vectors are expected unit-normalized; callers re-validate and normalize
/// defensively since remote backends have been observed to drift.
///
/// Prompt prefixes (e.g. `"query: "` for E5-family models) are the caller's
/// concern: the pipeline composes its configured prefix with the passage
/// text before calling [`embed`](Self::embed), keeping this seam free of
/// model-family knowledge.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate the embedding for a single text.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Embedding`](crate::CoreError::Embedding) when
    /// the backend fails, and
    /// [`CoreError::EmptyInput`](crate::CoreError::EmptyInput) for empty
    /// text — an empty passage embeds to an arbitrary point and would
    /// silently poison the calibration batch.
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>>;

    /// Generate embeddings for multiple texts.
    ///
    /// Default implementation calls [`embed`](Self::embed) per text.
    /// Implementations backed by batching APIs may override.
    async fn embed_batch(&self, texts: &[&str]) -> CoreResult<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Output dimension, constant for the lifetime of the provider.
    fn dimension(&self) -> usize;

    /// Identifier of the underlying model.
    fn model_id(&self) -> &str;
}
