//! Error types for calibration, divergence scoring, and reporting.

use parallax_core::CoreError;
use thiserror::Error;

/// Errors raised by the analysis stages of the pipeline.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A vector's length does not match the dimension the batch was
    /// fitted (or is being fitted) with.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vectors embedded under a different model than the calibration
    /// state. Mixing model spaces silently corrupts every downstream
    /// similarity, so this is fatal.
    #[error("model mismatch: state fitted for '{expected}', batch embedded with '{actual}'")]
    ModelMismatch { expected: String, actual: String },

    /// An operation that needs at least one vector received none.
    #[error("empty batch: {context}")]
    EmptyBatch { context: String },

    /// A NaN or infinity surfaced where only finite values are valid.
    #[error("non-finite value in {context}")]
    NonFinite { context: String },

    /// The iterative eigendecomposition failed to converge. Should not
    /// happen for real covariance matrices; indicates corrupt input.
    #[error("eigendecomposition did not converge after {sweeps} sweeps")]
    EigenNonConvergence { sweeps: usize },

    /// The Procrustes rotation could not be fitted reliably, typically
    /// because the paired batch is too small or rank-deficient.
    #[error("procrustes rotation unstable: {reason}")]
    ProcrustesUnstable { reason: String },

    /// A transform was requested before the calibrator was fitted.
    #[error("calibrator has not been fitted")]
    NotFitted,

    /// A second fit was requested on an already-fitted calibrator.
    /// Refitting must be explicit so that mixed-state comparisons
    /// cannot happen by accident.
    #[error("calibrator already fitted (state {state_id}); use refit to replace the state")]
    AlreadyFitted { state_id: String },

    /// A passage reached the scorer with fewer than two sources.
    #[error("passage {passage_id} has {available} source(s); divergence needs at least 2")]
    InsufficientSources { passage_id: u32, available: usize },

    /// Invalid analysis configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error propagated from the core layer (providers, serialization).
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl AnalysisError {
    /// Build a [`AnalysisError::NonFinite`] with a formatted context.
    pub fn non_finite(context: impl Into<String>) -> Self {
        Self::NonFinite {
            context: context.into(),
        }
    }

    /// Build a [`AnalysisError::EmptyBatch`] with a formatted context.
    pub fn empty_batch(context: impl Into<String>) -> Self {
        Self::EmptyBatch {
            context: context.into(),
        }
    }

    /// Whether the pipeline may skip the offending unit and continue.
    ///
    /// Per-passage conditions (too few sources) and the optional
    /// rotation are skippable; state-level corruption is not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientSources { .. } | Self::ProcrustesUnstable { .. }
        )
    }
}

/// Convenience alias for analysis results.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_carry_context() {
        let err = AnalysisError::DimensionMismatch {
            expected: 384,
            actual: 768,
        };
        assert_eq!(
            err.to_string(),
            "dimension mismatch: expected 384, got 768"
        );

        let err = AnalysisError::InsufficientSources {
            passage_id: 71,
            available: 1,
        };
        assert!(err.to_string().contains("passage 71"));
        assert!(err.to_string().contains("at least 2"));
    }

    #[test]
    fn model_mismatch_names_both_models() {
        let err = AnalysisError::ModelMismatch {
            expected: "multilingual-e5-large".into(),
            actual: "stub-multilingual-v1".into(),
        };
        let text = err.to_string();
        assert!(text.contains("multilingual-e5-large"));
        assert!(text.contains("stub-multilingual-v1"));
    }

    #[test]
    fn recoverability_split() {
        assert!(AnalysisError::InsufficientSources {
            passage_id: 1,
            available: 1
        }
        .is_recoverable());
        assert!(AnalysisError::ProcrustesUnstable {
            reason: "rank deficient".into()
        }
        .is_recoverable());
        assert!(!AnalysisError::NotFitted.is_recoverable());
        assert!(!AnalysisError::EigenNonConvergence { sweeps: 64 }.is_recoverable());
        assert!(!AnalysisError::non_finite("covariance").is_recoverable());
    }

    #[test]
    fn core_errors_convert() {
        let core = CoreError::EmptyInput("no text".into());
        let err: AnalysisError = core.into();
        assert!(matches!(err, AnalysisError::Core(_)));
        assert!(err.to_string().contains("no text"));
    }
}
