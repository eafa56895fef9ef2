//! Parallax text processing.
//!
//! Everything between raw per-source texts and an aligned, normalized
//! corpus ready for embedding:
//!
//! - [`normalizer`]: archaic-German orthography and OCR-error rule tables
//! - [`aligner`]: passage-id intersection across all sources
//! - [`foreign`]: embedded French-phrase detection for divergence correlates
//!
//! # Example
//!
//! ```rust
//! use parallax_text::normalizer::{self, german_orthography};
//!
//! let modern = normalizer::normalize("so lange es Werth giebt", german_orthography());
//! assert_eq!(modern, "so lange es Wert gibt");
//! ```

pub mod aligner;
pub mod error;
pub mod foreign;
pub mod normalizer;

// Re-exports for convenience
pub use aligner::align;
pub use error::{TextError, TextResult};
pub use foreign::{detect_foreign_spans, foreign_span_count, ForeignSpan};
pub use normalizer::{normalize, RuleSet, RuleSpec};
