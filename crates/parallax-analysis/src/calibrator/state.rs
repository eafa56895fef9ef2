//! Frozen calibration state.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calibrator::diagnostics::EmbeddingDiagnostics;

/// Everything a fit produced, frozen.
///
/// A state is fitted once per cross-compared batch and then applied to
/// every vector in that batch. The `state_id` travels into exports so
/// downstream artifacts can name the fit that produced them; vectors
/// transformed under different states must never be compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationState {
    /// Identity of this fit.
    pub state_id: Uuid,

    /// Model whose vectors the state was fitted on. Transforming a
    /// vector from any other model is rejected.
    pub model_id: String,

    /// Vector dimensionality the state was fitted for.
    pub dimension: usize,

    /// Number of vectors in the fitted batch.
    pub sample_count: usize,

    /// Column mean of the fitted batch; subtracted before whitening.
    pub mean: Vec<f64>,

    /// Whitening matrix `W = V · diag(1/sqrt(λ+ε)) · Vᵗ`.
    pub whitening: Vec<Vec<f64>>,

    /// Mean of the whitened, renormalized batch. Component removal
    /// re-centers around this before projecting.
    pub component_mean: Vec<f64>,

    /// Unit directions projected out after whitening. May hold fewer
    /// entries than requested when batch rank ran out first.
    pub removed_components: Vec<Vec<f64>>,

    /// Orthogonal rotation into the shared comparison frame, when one
    /// was fitted.
    pub rotation: Option<Vec<Vec<f64>>>,

    /// Source names the rotation applies to.
    pub rotation_sources: BTreeSet<String>,

    /// Eigenvalue floor used by the fit.
    pub epsilon: f64,

    /// How many covariance eigenvalues sat at or below the floor.
    /// Nonzero means the batch was too small for its dimension.
    pub floored_eigenvalues: usize,

    /// Health metrics of the raw batch before any transform.
    pub input_diagnostics: EmbeddingDiagnostics,

    /// When the fit happened.
    pub fitted_at: DateTime<Utc>,
}

impl CalibrationState {
    /// Whether a rotation has been fitted into this state.
    pub fn has_rotation(&self) -> bool {
        self.rotation.is_some()
    }

    /// Whether vectors from `source` get rotated on transform.
    pub fn rotation_applies_to(&self, source: &str) -> bool {
        self.rotation.is_some() && self.rotation_sources.contains(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_state() -> CalibrationState {
        CalibrationState {
            state_id: Uuid::new_v4(),
            model_id: "m".to_string(),
            dimension: 2,
            sample_count: 4,
            mean: vec![0.0, 0.0],
            whitening: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            component_mean: vec![0.0, 0.0],
            removed_components: Vec::new(),
            rotation: None,
            rotation_sources: BTreeSet::new(),
            epsilon: 1e-6,
            floored_eigenvalues: 0,
            input_diagnostics: EmbeddingDiagnostics {
                sample_count: 4,
                dimension: 2,
                isotropy: 0.5,
                mean_similarity: 0.1,
                max_similarity: 0.3,
                hubness_max: 1,
            },
            fitted_at: Utc::now(),
        }
    }

    #[test]
    fn rotation_routing() {
        let mut state = minimal_state();
        assert!(!state.has_rotation());
        assert!(!state.rotation_applies_to("german"));

        state.rotation = Some(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        state.rotation_sources.insert("german".to_string());
        assert!(state.has_rotation());
        assert!(state.rotation_applies_to("german"));
        assert!(!state.rotation_applies_to("Kaufmann"));
    }

    #[test]
    fn state_round_trips_through_json() {
        let state = minimal_state();
        let json = serde_json::to_string(&state).unwrap();
        let back: CalibrationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.state_id, state.state_id);
        assert_eq!(back.dimension, 2);
        assert_eq!(back.whitening, state.whitening);
    }
}
