//! Rule-based text normalization.
//!
//! Rewrites archaic German orthography to modern spelling and corrects OCR
//! misreads in scanned translation sources, so that spelling variance does
//! not masquerade as semantic divergence downstream. Pure functions over
//! text; the only state is the compiled rule tables.
//!
//! # Example
//!
//! ```rust
//! use parallax_text::normalizer::{self, german_orthography};
//!
//! let archaic = "Es giebt keinen Zweifel, daß der Werth gethan ist.";
//! let modern = normalizer::normalize(archaic, german_orthography());
//! assert_eq!(modern, "Es gibt keinen Zweifel, dass der Wert getan ist.");
//!
//! // idempotent: a second pass changes nothing
//! assert_eq!(normalizer::normalize(&modern, german_orthography()), modern);
//! ```

mod rules;
mod tables;

pub use rules::{RuleSet, RuleSpec};
pub use tables::{german_orthography, ocr_corrections};

/// Apply a rule set to a text.
///
/// Deterministic and side-effect free: the word table is applied in one
/// pass, then each pattern rule in declared order. Text with no matches
/// passes through unchanged; there is no failure mode.
pub fn normalize(text: &str, rules: &RuleSet) -> String {
    rules.apply(text)
}
