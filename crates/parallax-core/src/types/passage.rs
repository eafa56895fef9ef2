//! Aligned passage type.
//!
//! A [`Passage`] is one unit of aligned text (an aphorism) carrying the
//! German original and every translation under comparison, keyed by source
//! name. Passages are created once by the aligner and never mutated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One aligned passage across all sources.
///
/// Invariant: a passage enters the aligned corpus only if every required
/// source has non-empty text for its id. The aligner enforces this; the type
/// itself stays a plain record so partial passages can exist transiently
/// while alignment decides their fate.
///
/// Source texts are keyed by source name (`"german"`, `"Hollingdale"`, ...)
/// in a `BTreeMap` so iteration order is stable across runs.
///
/// # Example
///
/// ```rust
/// use parallax_core::types::Passage;
///
/// let mut passage = Passage::new(68);
/// passage.insert_text("german", "Ich habe das gethan, sagt mein Gedächtniss.");
/// passage.insert_text("Zimmern", "I did that, says my memory.");
///
/// assert_eq!(passage.passage_id, 68);
/// assert!(passage.char_length("german").unwrap() > 0);
/// assert!(passage.is_complete(&["german", "Zimmern"]));
/// assert!(!passage.is_complete(&["german", "Kaufmann"]));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Stable cross-source key (aphorism number).
    pub passage_id: u32,

    /// Source name → normalized text.
    pub source_texts: BTreeMap<String, String>,
}

impl Passage {
    /// Create an empty passage with the given id.
    pub fn new(passage_id: u32) -> Self {
        Self {
            passage_id,
            source_texts: BTreeMap::new(),
        }
    }

    /// Create a passage from an existing source map.
    pub fn with_sources(passage_id: u32, source_texts: BTreeMap<String, String>) -> Self {
        Self {
            passage_id,
            source_texts,
        }
    }

    /// Add or replace one source's text.
    pub fn insert_text(&mut self, source: impl Into<String>, text: impl Into<String>) {
        self.source_texts.insert(source.into(), text.into());
    }

    /// Text for one source, if present.
    pub fn text(&self, source: &str) -> Option<&str> {
        self.source_texts.get(source).map(String::as_str)
    }

    /// Character length (Unicode scalar count) of one source's text.
    pub fn char_length(&self, source: &str) -> Option<usize> {
        self.source_texts.get(source).map(|t| t.chars().count())
    }

    /// Mean character length across all sources present.
    ///
    /// Returns 0.0 for a passage with no sources.
    pub fn mean_char_length(&self) -> f64 {
        if self.source_texts.is_empty() {
            return 0.0;
        }
        let total: usize = self.source_texts.values().map(|t| t.chars().count()).sum();
        total as f64 / self.source_texts.len() as f64
    }

    /// Names of all sources present, in stable order.
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.source_texts.keys().map(String::as_str)
    }

    /// Number of sources with text.
    pub fn source_count(&self) -> usize {
        self.source_texts.len()
    }

    /// True when every required source has non-empty text.
    pub fn is_complete(&self, required: &[&str]) -> bool {
        required.iter().all(|name| {
            self.source_texts
                .get(*name)
                .map(|t| !t.trim().is_empty())
                .unwrap_or(false)
        })
    }
}
