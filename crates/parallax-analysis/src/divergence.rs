//! Divergence scoring across aligned sources.
//!
//! Works on calibrated embeddings, one batch per passage. The score is
//! the spread: max minus min of each source's similarity to the
//! consensus centroid. A passage where every translator lands near the
//! same point scores near zero; a passage where they scatter scores
//! high, and those are the passages worth a human read.

use std::collections::BTreeMap;

use parallax_core::{DivergenceResult, EmbeddingRecord};
use tracing::{debug, warn};

use crate::error::{AnalysisError, AnalysisResult};

/// Cosine similarity in f64, clamped to [-1, 1]. The floor guards the
/// division, not the semantics: inputs are unit vectors and a zero
/// vector never gets this far.
fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = (norm_a.sqrt() * norm_b.sqrt()).max(1e-12);
    (dot / denom).clamp(-1.0, 1.0)
}

/// Score one passage from its per-source vectors.
///
/// # Errors
///
/// [`AnalysisError::InsufficientSources`] below two sources (the
/// caller skips, never scores), [`AnalysisError::DimensionMismatch`] /
/// [`AnalysisError::NonFinite`] for malformed vectors, and
/// [`AnalysisError::NonFinite`] when the consensus centroid of exactly
/// opposed vectors collapses to zero.
pub fn score_passage(
    passage_id: u32,
    vectors: &BTreeMap<String, Vec<f32>>,
) -> AnalysisResult<DivergenceResult> {
    if vectors.len() < 2 {
        return Err(AnalysisError::InsufficientSources {
            passage_id,
            available: vectors.len(),
        });
    }
    let mut dimension = 0usize;
    for (source, vector) in vectors {
        if dimension == 0 {
            dimension = vector.len();
        } else if vector.len() != dimension {
            return Err(AnalysisError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }
        if !vector.iter().all(|x| x.is_finite()) {
            return Err(AnalysisError::non_finite(format!(
                "vector for passage {passage_id}, source '{source}'"
            )));
        }
    }

    let names: Vec<&String> = vectors.keys().collect();
    let mut pairwise_similarity = BTreeMap::new();
    for (i, a) in names.iter().enumerate() {
        for b in &names[i + 1..] {
            pairwise_similarity.insert(
                DivergenceResult::pair_key(a, b),
                cosine(&vectors[*a], &vectors[*b]) as f32,
            );
        }
    }

    // Consensus centroid: renormalized arithmetic mean.
    let mut centroid = vec![0.0f64; dimension];
    for vector in vectors.values() {
        for (c, x) in centroid.iter_mut().zip(vector.iter()) {
            *c += *x as f64;
        }
    }
    let inv = 1.0 / vectors.len() as f64;
    for c in centroid.iter_mut() {
        *c *= inv;
    }
    let norm = centroid.iter().map(|c| c * c).sum::<f64>().sqrt();
    if norm <= 1e-9 {
        return Err(AnalysisError::non_finite(format!(
            "consensus centroid for passage {passage_id} collapsed to zero"
        )));
    }
    for c in centroid.iter_mut() {
        *c /= norm;
    }

    let mut centroid_similarity = BTreeMap::new();
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    for (source, vector) in vectors {
        let mut dot = 0.0f64;
        let mut norm_v = 0.0f64;
        for (c, x) in centroid.iter().zip(vector.iter()) {
            let x = *x as f64;
            dot += c * x;
            norm_v += x * x;
        }
        let value = (dot / norm_v.sqrt().max(1e-12)).clamp(-1.0, 1.0);
        max = max.max(value);
        min = min.min(value);
        centroid_similarity.insert(source.clone(), value as f32);
    }

    Ok(DivergenceResult {
        passage_id,
        pairwise_similarity,
        centroid_similarity,
        spread: (max - min) as f32,
        rank: 0,
    })
}

/// Score every passage in a calibrated batch and rank the results.
///
/// Records are grouped by passage id; passages with fewer than two
/// sources are skipped with a warning rather than scored. The returned
/// vector is ordered by rank: spread descending, ties broken by
/// ascending passage id.
pub fn score_all(records: &[EmbeddingRecord]) -> AnalysisResult<Vec<DivergenceResult>> {
    let mut grouped: BTreeMap<u32, BTreeMap<String, Vec<f32>>> = BTreeMap::new();
    for record in records {
        let entry = grouped.entry(record.passage_id).or_default();
        if entry
            .insert(record.source_name.clone(), record.vector.clone())
            .is_some()
        {
            warn!(
                passage_id = record.passage_id,
                source = %record.source_name,
                "duplicate embedding record; keeping the last"
            );
        }
    }

    let mut results = Vec::with_capacity(grouped.len());
    let mut skipped = 0usize;
    for (passage_id, vectors) in &grouped {
        match score_passage(*passage_id, vectors) {
            Ok(result) => results.push(result),
            Err(err @ AnalysisError::InsufficientSources { .. }) => {
                warn!(passage_id = *passage_id, error = %err, "skipping under-sourced passage");
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }
    rank_results(&mut results);
    debug!(
        scored = results.len(),
        skipped, "divergence scoring complete"
    );
    Ok(results)
}

/// Sort by spread descending (ties by ascending passage id) and assign
/// 1-based ranks in place.
pub fn rank_results(results: &mut [DivergenceResult]) {
    results.sort_by(|a, b| {
        b.spread
            .total_cmp(&a.spread)
            .then_with(|| a.passage_id.cmp(&b.passage_id))
    });
    for (index, result) in results.iter_mut().enumerate() {
        result.rank = index + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectors_of(entries: &[(&str, Vec<f32>)]) -> BTreeMap<String, Vec<f32>> {
        entries
            .iter()
            .map(|(name, v)| (name.to_string(), v.clone()))
            .collect()
    }

    fn record(passage_id: u32, source: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord::new(passage_id, source, vector, "m")
    }

    #[test]
    fn single_source_is_insufficient() {
        let vectors = vectors_of(&[("german", vec![1.0, 0.0])]);
        let err = score_passage(7, &vectors).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientSources {
                passage_id: 7,
                available: 1
            }
        ));
        assert!(err.is_recoverable());
    }

    #[test]
    fn scores_divergent_translator_triple() {
        // German and TranslatorA point the same way; TranslatorB is
        // orthogonal. B must fall far from consensus and dominate the
        // spread.
        let vectors = vectors_of(&[
            ("german", vec![1.0, 0.0]),
            ("TranslatorA", vec![0.99, 0.14]),
            ("TranslatorB", vec![0.0, 1.0]),
        ]);
        let result = score_passage(68, &vectors).unwrap();

        assert_eq!(result.source_count(), 3);
        let ga = result.pairwise("german", "TranslatorA").unwrap();
        let gb = result.pairwise("german", "TranslatorB").unwrap();
        let ab = result.pairwise("TranslatorA", "TranslatorB").unwrap();
        assert!((ga - 0.99015).abs() < 1e-4, "german|A = {ga}");
        assert!(gb.abs() < 1e-6, "german|B = {gb}");
        assert!((ab - 0.14002).abs() < 1e-4, "A|B = {ab}");

        let (worst, worst_sim) = result.most_divergent_source().unwrap();
        assert_eq!(worst, "TranslatorB");
        let a_sim = result.centroid_similarity["TranslatorA"];
        assert!(
            worst_sim < a_sim - 0.3,
            "B ({worst_sim}) should sit far below A ({a_sim})"
        );
        assert!((result.spread - 0.43169).abs() < 1e-3, "spread {}", result.spread);
    }

    #[test]
    fn identical_vectors_have_zero_spread() {
        let vectors = vectors_of(&[
            ("german", vec![0.6, 0.8]),
            ("Kaufmann", vec![0.6, 0.8]),
            ("Zimmern", vec![0.6, 0.8]),
        ]);
        let result = score_passage(3, &vectors).unwrap();
        assert!(result.spread.abs() < 1e-7, "spread {}", result.spread);
        for similarity in result.centroid_similarity.values() {
            assert!((similarity - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn perturbing_one_source_increases_spread() {
        let tight = vectors_of(&[
            ("german", vec![1.0, 0.0]),
            ("Kaufmann", vec![1.0, 0.0]),
            ("Zimmern", vec![1.0, 0.0]),
        ]);
        let perturbed = vectors_of(&[
            ("german", vec![1.0, 0.0]),
            ("Kaufmann", vec![1.0, 0.0]),
            ("Zimmern", vec![0.8, 0.6]),
        ]);
        let baseline = score_passage(1, &tight).unwrap();
        let moved = score_passage(1, &perturbed).unwrap();
        assert!(moved.spread > baseline.spread + 0.01);
    }

    #[test]
    fn opposed_pair_collapses_centroid() {
        let vectors = vectors_of(&[
            ("german", vec![1.0, 0.0]),
            ("Kaufmann", vec![-1.0, 0.0]),
        ]);
        let err = score_passage(5, &vectors).unwrap_err();
        assert!(matches!(err, AnalysisError::NonFinite { .. }));
        assert!(err.to_string().contains("passage 5"));
    }

    #[test]
    fn mixed_dimensions_rejected() {
        let vectors = vectors_of(&[
            ("german", vec![1.0, 0.0]),
            ("Kaufmann", vec![1.0, 0.0, 0.0]),
        ]);
        assert!(matches!(
            score_passage(2, &vectors),
            Err(AnalysisError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn score_all_skips_under_sourced_passages() {
        let records = vec![
            record(1, "german", vec![1.0, 0.0]),
            record(1, "Kaufmann", vec![0.9, 0.435889]),
            record(2, "german", vec![0.0, 1.0]),
            record(3, "german", vec![1.0, 0.0]),
            record(3, "Kaufmann", vec![1.0, 0.0]),
        ];
        let results = score_all(&records).unwrap();
        let ids: Vec<u32> = results.iter().map(|r| r.passage_id).collect();
        assert!(!ids.contains(&2), "passage 2 has one source");
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn ranking_orders_by_spread_then_id() {
        // Passages 3 and 5 both have exactly zero spread (all sources
        // identical); on 9 one translator wanders. Expect rank order
        // 9, 3, 5: spread first, then ascending id among the ties.
        let records = vec![
            record(5, "german", vec![1.0, 0.0]),
            record(5, "Kaufmann", vec![1.0, 0.0]),
            record(5, "Zimmern", vec![1.0, 0.0]),
            record(3, "german", vec![0.0, 1.0]),
            record(3, "Kaufmann", vec![0.0, 1.0]),
            record(3, "Zimmern", vec![0.0, 1.0]),
            record(9, "german", vec![1.0, 0.0]),
            record(9, "Kaufmann", vec![0.6, 0.8]),
            record(9, "Zimmern", vec![1.0, 0.0]),
        ];
        let results = score_all(&records).unwrap();
        let ordered: Vec<(u32, usize)> =
            results.iter().map(|r| (r.passage_id, r.rank)).collect();
        assert_eq!(ordered, vec![(9, 1), (3, 2), (5, 3)]);
    }

    #[test]
    fn duplicate_record_keeps_last() {
        let records = vec![
            record(1, "german", vec![1.0, 0.0]),
            record(1, "german", vec![0.0, 1.0]),
            record(1, "Kaufmann", vec![0.0, 1.0]),
        ];
        let results = score_all(&records).unwrap();
        assert_eq!(results.len(), 1);
        // The surviving german vector equals Kaufmann's.
        let pair = results[0].pairwise("german", "Kaufmann").unwrap();
        assert!((pair - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_is_clamped() {
        assert!(cosine(&[1.0, 0.0], &[1.0, 0.0]) <= 1.0);
        assert!(cosine(&[1.0, 0.0], &[-1.0, 0.0]) >= -1.0);
    }
}
