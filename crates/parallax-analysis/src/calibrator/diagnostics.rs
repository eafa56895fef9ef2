//! Batch health metrics.
//!
//! Computed on the raw batch before fitting, so that runs record how
//! collapsed the space was before calibration did anything about it.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::linalg;

/// Distribution metrics of one embedding batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingDiagnostics {
    /// Vectors in the batch.
    pub sample_count: usize,

    /// Vector dimensionality.
    pub dimension: usize,

    /// Smallest over largest covariance eigenvalue. 1 is perfectly
    /// isotropic; values near 0 mean a few directions dominate.
    pub isotropy: f64,

    /// Mean cosine similarity over distinct pairs. High values are the
    /// similarity-collapse symptom whitening exists to fix.
    pub mean_similarity: f64,

    /// Largest pairwise cosine similarity.
    pub max_similarity: f64,

    /// Times the most popular vector is some other vector's nearest
    /// neighbor. Hubs distort nearest-neighbor comparisons.
    pub hubness_max: usize,
}

impl EmbeddingDiagnostics {
    /// Isotropy below this marks the batch as badly anisotropic.
    pub const LOW_ISOTROPY: f64 = 0.1;

    /// Mean similarity above this marks similarity collapse.
    pub const HIGH_BASELINE_SIMILARITY: f64 = 0.7;

    /// Whether a few directions dominate the batch.
    pub fn is_anisotropic(&self) -> bool {
        self.isotropy < Self::LOW_ISOTROPY
    }

    /// Whether everything looks similar to everything.
    pub fn has_similarity_collapse(&self) -> bool {
        self.mean_similarity > Self::HIGH_BASELINE_SIMILARITY
    }
}

/// Measure a batch of vectors (rows).
///
/// # Errors
///
/// [`AnalysisError::EmptyBatch`] for an empty input and
/// [`AnalysisError::EigenNonConvergence`] if the covariance
/// eigendecomposition fails.
pub fn diagnose(rows: &[Vec<f64>]) -> AnalysisResult<EmbeddingDiagnostics> {
    if rows.is_empty() {
        return Err(AnalysisError::empty_batch("diagnostics"));
    }
    let sample_count = rows.len();
    let dimension = rows[0].len();

    let norms: Vec<f64> = rows.iter().map(|row| linalg::l2_norm(row)).collect();
    let mut similarity_sum = 0.0;
    let mut max_similarity = 0.0;
    let mut pair_count = 0usize;
    let mut neighbor_counts = vec![0usize; sample_count];
    for i in 0..sample_count {
        let mut best = f64::NEG_INFINITY;
        let mut best_index = i;
        for j in 0..sample_count {
            if i == j {
                continue;
            }
            let denom = norms[i] * norms[j];
            let cosine = if denom > 1e-12 {
                linalg::dot(&rows[i], &rows[j]) / denom
            } else {
                0.0
            };
            if j > i {
                similarity_sum += cosine;
                pair_count += 1;
                if cosine > max_similarity {
                    max_similarity = cosine;
                }
            }
            if cosine > best {
                best = cosine;
                best_index = j;
            }
        }
        if sample_count > 1 {
            neighbor_counts[best_index] += 1;
        }
    }
    let mean_similarity = if pair_count > 0 {
        similarity_sum / pair_count as f64
    } else {
        0.0
    };
    let hubness_max = neighbor_counts.iter().copied().max().unwrap_or(0);

    let mean = linalg::mean_vector(rows);
    let centered = linalg::center_rows(rows, &mean);
    let cov = linalg::covariance(&centered);
    let eigen = linalg::symmetric_eigen(&cov)?;
    let lambda_max = eigen.eigenvalues.first().copied().unwrap_or(0.0);
    let lambda_min = eigen.eigenvalues.last().copied().unwrap_or(0.0);
    let isotropy = lambda_min.max(0.0) / (lambda_max + 1e-8);

    Ok(EmbeddingDiagnostics {
        sample_count,
        dimension,
        isotropy,
        mean_similarity,
        max_similarity,
        hubness_max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isotropic_cloud_scores_high() {
        // Symmetric cross: equal variance in both directions.
        let rows = vec![
            vec![1.0, 0.0],
            vec![-1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.0, -1.0],
        ];
        let report = diagnose(&rows).unwrap();
        assert!(report.isotropy > 0.99, "isotropy {}", report.isotropy);
        assert!(!report.is_anisotropic());
        // Opposite pairs cancel: mean similarity is negative-ish.
        assert!(report.mean_similarity < 0.1);
    }

    #[test]
    fn collapsed_cloud_scores_low() {
        // Everything points the same way with tiny jitter.
        let rows = vec![
            vec![1.0, 0.001],
            vec![1.0, -0.001],
            vec![1.0, 0.002],
            vec![1.0, -0.002],
        ];
        let report = diagnose(&rows).unwrap();
        assert!(report.is_anisotropic(), "isotropy {}", report.isotropy);
        assert!(report.has_similarity_collapse());
        assert!(report.max_similarity > 0.999);
    }

    #[test]
    fn hubness_counts_nearest_neighbor_wins() {
        // Two tight twins and one outlier: each twin is the other's
        // neighbor, and the outlier picks one of them, so the most
        // popular vector is chosen twice.
        let rows = vec![
            vec![1.0, 0.0],
            vec![0.999, 0.01],
            vec![-1.0, 0.4],
        ];
        let report = diagnose(&rows).unwrap();
        assert_eq!(report.hubness_max, 2);
    }

    #[test]
    fn single_vector_is_degenerate_but_measurable() {
        let report = diagnose(&[vec![0.5, 0.5]]).unwrap();
        assert_eq!(report.sample_count, 1);
        assert_eq!(report.mean_similarity, 0.0);
        assert_eq!(report.hubness_max, 0);
        assert!(report.isotropy < 1e-6);
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(
            diagnose(&[]),
            Err(AnalysisError::EmptyBatch { .. })
        ));
    }
}
