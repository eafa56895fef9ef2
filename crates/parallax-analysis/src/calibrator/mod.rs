//! Embedding-space calibration.
//!
//! Multilingual sentence embeddings come out anisotropic: a few
//! directions carry most of the variance and every pair of texts looks
//! similar. The calibrator counteracts that with whitening, optional
//! removal of the top principal components, and an optional orthogonal
//! rotation aligning the source-language frame to the translations.
//!
//! The contract is fit-once, transform-many: one [`CalibrationState`]
//! is fitted per cross-compared batch and then applied uniformly.
//! Similarities between vectors transformed under different states are
//! undefined.

mod diagnostics;
mod engine;
mod state;

pub use diagnostics::{diagnose, EmbeddingDiagnostics};
pub use engine::EmbeddingCalibrator;
pub use state::CalibrationState;
