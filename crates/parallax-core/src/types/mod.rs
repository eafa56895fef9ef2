//! Core domain types.
//!
//! - [`Passage`]: one aligned unit of text across all sources
//! - [`EmbeddingRecord`]: one passage/source vector from one model
//! - [`DivergenceResult`]: per-passage divergence statistics
//! - [`AlignedCorpusExport`] / [`DivergenceExportRecord`]: stable boundary
//!   shapes consumed outside the pipeline

mod divergence;
mod embedding;
mod export;
mod passage;

pub use divergence::DivergenceResult;
pub use embedding::EmbeddingRecord;
pub use export::{AlignedCorpusExport, AlignedPassageExport, DivergenceExportRecord};
pub use passage::Passage;
