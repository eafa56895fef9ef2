//! Passage alignment.
//!
//! Builds the common index of passages present across all sources: the
//! intersection of passage-id sets, ordered by ascending id. Ids outside the
//! intersection are alignment gaps — logged with the source that lacks them
//! and dropped, never an error. An empty intersection yields an empty
//! corpus; callers must handle zero passages explicitly.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use parallax_core::types::Passage;

/// Align per-source passage maps into the common corpus.
///
/// `per_source` maps source name → (passage id → text). A source's text
/// counts as present only when, after trimming, it has at least `min_chars`
/// characters; shorter texts are treated as gaps (scanned sources sometimes
/// yield fragments that would embed to noise).
///
/// # Example
///
/// ```rust
/// use std::collections::BTreeMap;
/// use parallax_text::aligner::align;
///
/// let mut per_source = BTreeMap::new();
/// for (name, ids) in [("german", vec![1, 2, 3]), ("Zimmern", vec![2, 3, 4])] {
///     let passages: BTreeMap<u32, String> = ids
///         .into_iter()
///         .map(|id| (id, format!("text {}", id)))
///         .collect();
///     per_source.insert(name.to_string(), passages);
/// }
///
/// let aligned = align(&per_source, 1);
/// let ids: Vec<u32> = aligned.iter().map(|p| p.passage_id).collect();
/// assert_eq!(ids, vec![2, 3]);
/// ```
pub fn align(
    per_source: &BTreeMap<String, BTreeMap<u32, String>>,
    min_chars: usize,
) -> Vec<Passage> {
    if per_source.is_empty() {
        debug!("alignment called with zero sources");
        return Vec::new();
    }

    // Which ids each source actually covers, validity floor applied.
    let mut valid_ids: BTreeMap<&str, BTreeSet<u32>> = BTreeMap::new();
    for (source, passages) in per_source {
        let ids: BTreeSet<u32> = passages
            .iter()
            .filter(|(_, text)| is_valid_text(text, min_chars))
            .map(|(id, _)| *id)
            .collect();
        valid_ids.insert(source.as_str(), ids);
    }

    let union: BTreeSet<u32> = valid_ids.values().flatten().copied().collect();
    let mut common: Option<BTreeSet<u32>> = None;
    for ids in valid_ids.values() {
        common = Some(match common {
            None => ids.clone(),
            Some(acc) => acc.intersection(ids).copied().collect(),
        });
    }
    let common = common.unwrap_or_default();

    // Report every gap with the source responsible for it.
    for id in union.difference(&common) {
        for (source, ids) in &valid_ids {
            if !ids.contains(id) {
                let reason = match per_source[*source].get(id) {
                    Some(_) => "below minimum length",
                    None => "missing",
                };
                warn!(
                    passage_id = id,
                    source = source,
                    reason = reason,
                    "alignment gap: passage excluded from corpus"
                );
            }
        }
    }

    debug!(
        sources = per_source.len(),
        union = union.len(),
        aligned = common.len(),
        "alignment complete"
    );

    common
        .into_iter()
        .map(|id| {
            let mut passage = Passage::new(id);
            for (source, passages) in per_source {
                if let Some(text) = passages.get(&id) {
                    passage.insert_text(source.clone(), text.clone());
                }
            }
            passage
        })
        .collect()
}

fn is_valid_text(text: &str, min_chars: usize) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && trimmed.chars().count() >= min_chars
}
