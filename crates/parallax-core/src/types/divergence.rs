//! Divergence result type.
//!
//! A [`DivergenceResult`] is the per-passage output of the divergence
//! engine: pairwise similarities, similarity of each source to the consensus
//! centroid, the spread statistic, and the rank after sorting. Results are
//! derived data, recomputed whenever embeddings change, never hand-edited.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-passage divergence statistics across all aligned sources.
///
/// All maps are `BTreeMap` so that iteration, accumulation, and serialized
/// output have one fixed order. Pairwise entries are keyed `"A|B"` with the
/// two source names in lexicographic order (see [`pair_key`](Self::pair_key)).
///
/// Spread is max minus min of the centroid similarities. A low spread means
/// every translator sits near the same point in calibrated space; a high
/// spread flags a passage where the German underdetermines the English and
/// translators chose differently.
///
/// # Example
///
/// ```rust
/// use parallax_core::types::DivergenceResult;
///
/// assert_eq!(DivergenceResult::pair_key("Zimmern", "Kaufmann"), "Kaufmann|Zimmern");
/// assert_eq!(DivergenceResult::pair_key("Kaufmann", "Zimmern"), "Kaufmann|Zimmern");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceResult {
    /// Passage these statistics describe.
    pub passage_id: u32,

    /// Unordered source pair (`"A|B"`, lexicographic) → cosine similarity in [-1, 1].
    pub pairwise_similarity: BTreeMap<String, f32>,

    /// Source → cosine similarity to the consensus centroid.
    pub centroid_similarity: BTreeMap<String, f32>,

    /// max(centroid similarities) − min(centroid similarities).
    pub spread: f32,

    /// 1-based position after sorting all passages by spread descending,
    /// ties broken by ascending passage id. Zero until ranking runs.
    pub rank: usize,
}

impl DivergenceResult {
    /// Canonical map key for an unordered source pair.
    pub fn pair_key(a: &str, b: &str) -> String {
        if a <= b {
            format!("{}|{}", a, b)
        } else {
            format!("{}|{}", b, a)
        }
    }

    /// Pairwise similarity for two sources, order-insensitive.
    pub fn pairwise(&self, a: &str, b: &str) -> Option<f32> {
        self.pairwise_similarity.get(&Self::pair_key(a, b)).copied()
    }

    /// The source farthest from consensus (lowest centroid similarity).
    ///
    /// This is the "who is the outlier" attribution that centroid-based
    /// scoring exists to support.
    pub fn most_divergent_source(&self) -> Option<(&str, f32)> {
        self.centroid_similarity
            .iter()
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(name, sim)| (name.as_str(), *sim))
    }

    /// The source closest to consensus (highest centroid similarity).
    pub fn most_central_source(&self) -> Option<(&str, f32)> {
        self.centroid_similarity
            .iter()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(name, sim)| (name.as_str(), *sim))
    }

    /// Number of sources that were scored for this passage.
    pub fn source_count(&self) -> usize {
        self.centroid_similarity.len()
    }
}
