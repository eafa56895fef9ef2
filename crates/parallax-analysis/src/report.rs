//! Outlier reporting: top-divergence passages, spread summary
//! statistics, and correlation of spread against passage properties.
//!
//! The correlations answer the reviewer's first question about any
//! divergence list: is this measuring translation choices, or just
//! passage length and quotation noise? Spread that tracks length says
//! the embedding window is doing the talking; spread that tracks
//! foreign-language spans says the scores flag untranslated French
//! rather than interpretive differences.

use std::collections::BTreeMap;

use parallax_core::{DivergenceResult, Passage};
use parallax_text::foreign_span_count;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Summary statistics over all scored spreads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadSummary {
    /// Passages that were scored.
    pub scored_passages: usize,
    /// Mean spread.
    pub mean: f64,
    /// Population standard deviation of spread.
    pub std_dev: f64,
    /// Largest spread.
    pub max: f64,
    /// Passage holding the largest spread (smallest id on ties).
    pub max_passage_id: Option<u32>,
}

/// Correlations between spread and per-passage covariates. `None`
/// when there are fewer than three data points or a covariate is
/// constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReport {
    /// Pearson r: spread vs mean character length across sources.
    pub length_pearson: Option<f64>,
    /// Spearman rho: spread vs mean character length.
    pub length_spearman: Option<f64>,
    /// Pearson r: spread vs total foreign-language spans.
    pub foreign_pearson: Option<f64>,
    /// Spearman rho: spread vs total foreign-language spans.
    pub foreign_spearman: Option<f64>,
    /// Passages included in the correlations.
    pub sample_count: usize,
}

/// The reporter's complete output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    /// The top passages by rank, at most the configured count.
    pub top: Vec<DivergenceResult>,
    /// Spread summary over every scored passage, not just the top.
    pub summary: SpreadSummary,
    /// Spread-vs-covariate correlations.
    pub correlations: CorrelationReport,
}

/// First `n` results by rank.
///
/// Re-sorts defensively so the cut is correct even when the caller
/// hands over unranked results.
pub fn top_n(results: &[DivergenceResult], n: usize) -> Vec<DivergenceResult> {
    let mut sorted: Vec<DivergenceResult> = results.to_vec();
    crate::divergence::rank_results(&mut sorted);
    sorted.truncate(n);
    sorted
}

/// Spread summary over all scored results.
pub fn summarize(results: &[DivergenceResult]) -> SpreadSummary {
    let scored_passages = results.len();
    if scored_passages == 0 {
        return SpreadSummary {
            scored_passages: 0,
            mean: 0.0,
            std_dev: 0.0,
            max: 0.0,
            max_passage_id: None,
        };
    }
    let mean = results.iter().map(|r| r.spread as f64).sum::<f64>() / scored_passages as f64;
    let variance = results
        .iter()
        .map(|r| {
            let dev = r.spread as f64 - mean;
            dev * dev
        })
        .sum::<f64>()
        / scored_passages as f64;
    let peak = results.iter().max_by(|a, b| {
        a.spread
            .total_cmp(&b.spread)
            .then_with(|| b.passage_id.cmp(&a.passage_id))
    });
    SpreadSummary {
        scored_passages,
        mean,
        std_dev: variance.sqrt(),
        max: peak.map_or(0.0, |r| r.spread as f64),
        max_passage_id: peak.map(|r| r.passage_id),
    }
}

/// Pearson correlation coefficient. `None` for fewer than three
/// points, mismatched lengths, or a constant series.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len();
    if n != ys.len() || n < 3 {
        return None;
    }
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;
    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= 1e-24 || var_y <= 1e-24 {
        return None;
    }
    Some(covariance / (var_x.sqrt() * var_y.sqrt()))
}

/// Spearman rank correlation: Pearson over average ranks, so ties are
/// handled exactly.
pub fn spearman_correlation(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 3 {
        return None;
    }
    let rank_x = rank_transform(xs);
    let rank_y = rank_transform(ys);
    pearson_correlation(&rank_x, &rank_y)
}

/// 1-based ranks with ties averaged.
fn rank_transform(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let average = (start + end) as f64 / 2.0 + 1.0;
        for position in start..=end {
            ranks[order[position]] = average;
        }
        start = end + 1;
    }
    ranks
}

/// Correlate spread against passage length and foreign-span count.
///
/// Scored passages missing from `passages` are left out of the
/// correlation sample.
pub fn correlate(results: &[DivergenceResult], passages: &[Passage]) -> CorrelationReport {
    let by_id: BTreeMap<u32, &Passage> = passages
        .iter()
        .map(|passage| (passage.passage_id, passage))
        .collect();

    let mut spreads = Vec::with_capacity(results.len());
    let mut lengths = Vec::with_capacity(results.len());
    let mut foreign = Vec::with_capacity(results.len());
    for result in results {
        let Some(passage) = by_id.get(&result.passage_id) else {
            debug!(
                passage_id = result.passage_id,
                "scored passage has no source texts; excluded from correlation"
            );
            continue;
        };
        spreads.push(result.spread as f64);
        lengths.push(passage.mean_char_length());
        foreign.push(total_foreign_spans(passage) as f64);
    }

    CorrelationReport {
        length_pearson: pearson_correlation(&spreads, &lengths),
        length_spearman: spearman_correlation(&spreads, &lengths),
        foreign_pearson: pearson_correlation(&spreads, &foreign),
        foreign_spearman: spearman_correlation(&spreads, &foreign),
        sample_count: spreads.len(),
    }
}

fn total_foreign_spans(passage: &Passage) -> usize {
    passage
        .source_texts
        .values()
        .map(|text| foreign_span_count(text))
        .sum()
}

/// Assemble the full report: top-N, summary, correlations.
pub fn build_report(
    results: &[DivergenceResult],
    passages: &[Passage],
    n: usize,
) -> OutlierReport {
    OutlierReport {
        top: top_n(results, n),
        summary: summarize(results),
        correlations: correlate(results, passages),
    }
}
