//! Boundary export shapes.
//!
//! The presentation layer and report generators consume these records and
//! never derive divergence on their own, so the serialized shapes here are
//! stable contracts: field names and nesting must not change without a
//! coordinated consumer update.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::divergence::DivergenceResult;

/// One passage in the aligned-corpus export: `{sources: {name: text}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedPassageExport {
    /// Source name → normalized text.
    pub sources: BTreeMap<String, String>,
}

/// Aligned-corpus export: passage id → `{sources: {name: text}}`.
///
/// Persisted as the unit of reproducibility for an analysis run; a later run
/// over the same export re-scores the identical corpus.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlignedCorpusExport {
    /// Passage id → per-source texts.
    pub passages: BTreeMap<u32, AlignedPassageExport>,

    /// When this corpus was aligned.
    pub aligned_at: DateTime<Utc>,
}

impl AlignedCorpusExport {
    /// Build the export from aligned passages, stamped now.
    pub fn from_passages(passages: &[super::Passage]) -> Self {
        Self {
            passages: passages
                .iter()
                .map(|passage| {
                    (
                        passage.passage_id,
                        AlignedPassageExport {
                            sources: passage.source_texts.clone(),
                        },
                    )
                })
                .collect(),
            aligned_at: Utc::now(),
        }
    }

    /// Number of aligned passages.
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// True when alignment produced no passages.
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

/// One row of the divergence export consumed by the presentation layer.
///
/// Shape: `{passage_id, spread, centroid_similarity: {source: float},
/// pairwise_similarity: {"A|B": float}}`. Rank is deliberately absent: the
/// array itself is ordered, and consumers index by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceExportRecord {
    /// Passage the statistics describe.
    pub passage_id: u32,

    /// Divergence statistic (max − min centroid similarity).
    pub spread: f32,

    /// Source → similarity to the consensus centroid.
    pub centroid_similarity: BTreeMap<String, f32>,

    /// `"A|B"` (lexicographic pair) → cosine similarity.
    pub pairwise_similarity: BTreeMap<String, f32>,
}

impl From<&DivergenceResult> for DivergenceExportRecord {
    fn from(result: &DivergenceResult) -> Self {
        Self {
            passage_id: result.passage_id,
            spread: result.spread,
            centroid_similarity: result.centroid_similarity.clone(),
            pairwise_similarity: result.pairwise_similarity.clone(),
        }
    }
}
