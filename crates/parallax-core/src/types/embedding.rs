//! Embedding record type.
//!
//! An [`EmbeddingRecord`] binds one passage/source pair to the vector a
//! specific model produced for it. Records are immutable once created;
//! calibration derives new records with [`EmbeddingRecord::with_vector`]
//! instead of mutating, because whitening statistics are defined over a
//! complete batch and in-place edits would let a half-transformed batch leak
//! into comparisons.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// One embedded passage/source pair.
///
/// Invariant: all records sharing a `model_id` share vector dimensionality.
/// The batch-level check lives with the consumers (pipeline, calibrator);
/// the record offers [`dimension`](Self::dimension) and
/// [`is_finite`](Self::is_finite) for them to check against.
///
/// # Example
///
/// ```rust
/// use parallax_core::types::EmbeddingRecord;
///
/// let record = EmbeddingRecord::new(68, "Zimmern", vec![0.6, 0.8], "fake-model");
/// assert_eq!(record.dimension(), 2);
/// assert!((record.magnitude() - 1.0).abs() < 1e-6);
/// assert!(record.is_unit_norm(1e-6));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Passage this vector embeds.
    pub passage_id: u32,

    /// Source (German original or a named translator).
    pub source_name: String,

    /// Fixed-length vector, L2-normalized by the producing stage.
    pub vector: Vec<f32>,

    /// Model that produced the vector.
    pub model_id: String,
}

impl EmbeddingRecord {
    /// Create a record from its parts.
    pub fn new(
        passage_id: u32,
        source_name: impl Into<String>,
        vector: Vec<f32>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            passage_id,
            source_name: source_name.into(),
            vector,
            model_id: model_id.into(),
        }
    }

    /// Vector length.
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    /// L2 norm of the vector.
    pub fn magnitude(&self) -> f32 {
        self.vector.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// True when the norm is within `tolerance` of 1.
    pub fn is_unit_norm(&self, tolerance: f32) -> bool {
        (self.magnitude() - 1.0).abs() <= tolerance
    }

    /// True when every component is a normal floating-point value.
    pub fn is_finite(&self) -> bool {
        self.vector.iter().all(|v| v.is_finite())
    }

    /// Scale the vector to unit L2 norm.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidVector`] for a zero or non-finite vector,
    /// which cannot be meaningfully normalized.
    pub fn normalized(mut self) -> CoreResult<Self> {
        if !self.is_finite() {
            return Err(CoreError::non_finite(format!(
                "passage {}, source '{}'",
                self.passage_id, self.source_name
            )));
        }
        let magnitude = self.magnitude();
        if magnitude <= f32::EPSILON {
            return Err(CoreError::InvalidVector {
                context: format!("passage {}, source '{}'", self.passage_id, self.source_name),
                reason: "zero magnitude".to_string(),
            });
        }
        for v in &mut self.vector {
            *v /= magnitude;
        }
        Ok(self)
    }

    /// Derive a new record with the same keys and a transformed vector.
    ///
    /// This is the calibration path: same `passage_id`/`source_name`/
    /// `model_id`, new vector.
    pub fn with_vector(&self, vector: Vec<f32>) -> Self {
        Self {
            passage_id: self.passage_id,
            source_name: self.source_name.clone(),
            vector,
            model_id: self.model_id.clone(),
        }
    }
}
