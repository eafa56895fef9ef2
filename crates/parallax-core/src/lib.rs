//! Parallax core library.
//!
//! Domain types, the embedding-provider seam, configuration, and shared
//! errors for the parallax translation-divergence pipeline.
//!
//! # Architecture
//!
//! This crate defines:
//! - Domain types ([`Passage`](types::Passage),
//!   [`EmbeddingRecord`](types::EmbeddingRecord),
//!   [`DivergenceResult`](types::DivergenceResult), export shapes)
//! - The [`EmbeddingProvider`](provider::EmbeddingProvider) trait
//! - Deterministic stub providers for tests (`test-utils` feature)
//! - [`PipelineConfig`](config::PipelineConfig) and validation
//! - [`CoreError`] / [`CoreResult`]
//!
//! # Example
//!
//! ```
//! use parallax_core::config::PipelineConfig;
//! use parallax_core::types::Passage;
//!
//! let config = PipelineConfig::default();
//! assert!(config.validate().is_ok());
//!
//! let mut passage = Passage::new(1);
//! passage.insert_text("german", "Was mich nicht umbringt, macht mich stärker.");
//! assert_eq!(passage.source_count(), 1);
//! ```

pub mod config;
pub mod error;
pub mod provider;
pub mod stubs;
pub mod types;

// Re-exports for convenience
pub use config::{CalibrationScope, PipelineConfig};
pub use error::{CoreError, CoreResult};
pub use provider::EmbeddingProvider;
pub use types::{
    AlignedCorpusExport, AlignedPassageExport, DivergenceExportRecord, DivergenceResult,
    EmbeddingRecord, Passage,
};
