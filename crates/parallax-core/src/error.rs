//! Core error types.
//!
//! This module defines the central error type [`CoreError`] shared by the
//! parallax crates, along with the [`CoreResult<T>`] type alias. Crate-local
//! failure modes (text normalization, calibration numerics) live in their own
//! crates' error types and wrap [`CoreError`] where they cross the boundary.

use thiserror::Error;

/// Top-level error type for core operations.
///
/// # Examples
///
/// ```rust
/// use parallax_core::CoreError;
///
/// let error = CoreError::DimensionMismatch {
///     expected: 1024,
///     actual: 768,
/// };
///
/// match &error {
///     CoreError::DimensionMismatch { expected, actual } => {
///         assert_eq!(*expected, 1024);
///         assert_eq!(*actual, 768);
///     }
///     _ => panic!("unexpected variant"),
/// }
///
/// assert!(error.to_string().contains("1024"));
/// ```
#[derive(Debug, Error)]
pub enum CoreError {
    /// Embedding provider failed to produce a vector.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Empty input where non-empty content is required.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Embedding vector length does not match the expected model dimension.
    ///
    /// Mixing vectors of different lengths in one batch makes every
    /// downstream statistic meaningless, so this aborts the batch rather
    /// than truncating or padding.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension reported by the provider for this model
        expected: usize,
        /// Dimension actually observed
        actual: usize,
    },

    /// A vector contains NaN or infinite components.
    #[error("Invalid vector for {context}: {reason}")]
    InvalidVector {
        /// Where the vector came from (source name, passage id)
        context: String,
        /// What was wrong with it
        reason: String,
    },

    /// Configuration rejected by validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Filesystem failure (rule tables, exports).
    #[error("I/O error: {0}")]
    Io(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Io(err.to_string())
    }
}

impl CoreError {
    /// Create an InvalidVector error for a non-finite component.
    pub fn non_finite(context: impl Into<String>) -> Self {
        CoreError::InvalidVector {
            context: context.into(),
            reason: "contains NaN or infinite components".to_string(),
        }
    }

    /// Check whether this error is recoverable by fixing the input.
    ///
    /// Recoverable errors can be retried with corrected content or
    /// configuration; the rest indicate environment or provider failures.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::EmptyInput(_)
                | CoreError::DimensionMismatch { .. }
                | CoreError::InvalidVector { .. }
                | CoreError::Config(_)
        )
    }
}
