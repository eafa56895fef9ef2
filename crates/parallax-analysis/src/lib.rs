//! Parallax analysis: embedding calibration, divergence scoring, and
//! outlier reporting over a parallel translation corpus.
//!
//! This crate is the numerical half of the pipeline. `parallax-text`
//! turns raw sources into an aligned corpus; everything from vectors to
//! ranked divergence lives here:
//!
//! ```text
//! aligned passages
//!   │ embed (parallax-core provider seam)
//!   ▼
//! EmbeddingRecord batch
//!   │ calibrator: whitening → component removal → optional rotation
//!   ▼
//! calibrated batch
//!   │ divergence: pairwise cosine, consensus centroid, spread
//!   ▼
//! ranked DivergenceResults
//!   │ report: top-N, summary, covariate correlations
//!   ▼
//! OutlierReport
//! ```
//!
//! [`pipeline::DivergencePipeline`] drives the phases in order with a
//! hard barrier between embedding and fitting; the individual modules
//! stay usable on their own for methodological experiments.
//!
//! All statistics are computed in `f64` over hand-rolled dense kernels
//! ([`linalg`]); vectors cross module boundaries as `f32` in
//! [`parallax_core::EmbeddingRecord`].

pub mod calibrator;
pub mod divergence;
pub mod error;
pub mod linalg;
pub mod pipeline;
pub mod report;

// Re-exports for convenience
pub use calibrator::{diagnose, CalibrationState, EmbeddingCalibrator, EmbeddingDiagnostics};
pub use divergence::{rank_results, score_all, score_passage};
pub use error::{AnalysisError, AnalysisResult};
pub use pipeline::{
    CalibrationStateSummary, CalibrationSummary, DivergencePipeline, PipelineOutcome,
    ProcrustesStatus, RawCorpus,
};
pub use report::{build_report, top_n, CorrelationReport, OutlierReport, SpreadSummary};
