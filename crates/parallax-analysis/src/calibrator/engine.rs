//! The calibrator itself: fit, transform, and rotation fitting.

use std::collections::BTreeSet;

use chrono::Utc;
use parallax_core::{config::PipelineConfig, EmbeddingRecord};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calibrator::diagnostics::{diagnose, EmbeddingDiagnostics};
use crate::calibrator::state::CalibrationState;
use crate::error::{AnalysisError, AnalysisResult};
use crate::linalg;

/// Fewest aligned pairs the rotation fit accepts. Below this the
/// cross-covariance is noise.
const MIN_ROTATION_PAIRS: usize = 3;

/// Smallest acceptable singular-value ratio of the cross-covariance.
const MIN_ROTATION_CONDITION: f64 = 1e-6;

/// Largest tolerated entrywise deviation of `RᵗR` from identity.
const ROTATION_ORTHOGONALITY_TOLERANCE: f64 = 1e-6;

/// Whitening-based embedding calibrator.
///
/// Fit once on the full cross-compared batch, then transform every
/// vector under the resulting [`CalibrationState`]. A second `fit` is
/// rejected; replacing the state takes an explicit [`refit`] so mixed
/// states cannot arise by accident.
///
/// The transform applies, in order: centering, whitening,
/// renormalization, removal of the fitted principal components (with
/// renormalization), and, for sources named by a fitted rotation, the
/// orthogonal rotation into the shared frame.
///
/// [`refit`]: EmbeddingCalibrator::refit
#[derive(Debug)]
pub struct EmbeddingCalibrator {
    whitening_epsilon: f64,
    pc_removal_count: usize,
    state: Option<CalibrationState>,
}

impl EmbeddingCalibrator {
    /// Calibrator with explicit parameters.
    pub fn new(whitening_epsilon: f64, pc_removal_count: usize) -> Self {
        Self {
            whitening_epsilon,
            pc_removal_count,
            state: None,
        }
    }

    /// Calibrator wired from a pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.whitening_epsilon, config.pc_removal_count)
    }

    /// The fitted state, if any.
    pub fn state(&self) -> Option<&CalibrationState> {
        self.state.as_ref()
    }

    /// Whether a state has been fitted.
    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Fit whitening and component-removal statistics on `batch`.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::AlreadyFitted`] if a state exists,
    /// [`AnalysisError::EmptyBatch`] / [`AnalysisError::DimensionMismatch`] /
    /// [`AnalysisError::ModelMismatch`] / [`AnalysisError::NonFinite`]
    /// for invalid batches.
    pub fn fit(&mut self, batch: &[EmbeddingRecord]) -> AnalysisResult<&CalibrationState> {
        if let Some(state) = &self.state {
            return Err(AnalysisError::AlreadyFitted {
                state_id: state.state_id.to_string(),
            });
        }
        let state = self.fit_state(batch)?;
        Ok(self.state.insert(state))
    }

    /// Replace any existing state with a fresh fit on `batch`.
    ///
    /// On failure the previous state is kept.
    pub fn refit(&mut self, batch: &[EmbeddingRecord]) -> AnalysisResult<&CalibrationState> {
        let previous = self.state.take();
        match self.fit_state(batch) {
            Ok(state) => {
                if let Some(old) = &previous {
                    info!(
                        old_state = %old.state_id,
                        new_state = %state.state_id,
                        "replaced calibration state"
                    );
                }
                Ok(self.state.insert(state))
            }
            Err(err) => {
                self.state = previous;
                Err(err)
            }
        }
    }

    /// Transform a batch under the fitted state. Order within the
    /// output matches the input.
    pub fn transform(&self, batch: &[EmbeddingRecord]) -> AnalysisResult<Vec<EmbeddingRecord>> {
        let state = self.state.as_ref().ok_or(AnalysisError::NotFitted)?;
        batch
            .iter()
            .map(|record| transform_record(state, record))
            .collect()
    }

    /// Fit an orthogonal rotation mapping `source` vectors into the
    /// frame of `target` vectors.
    ///
    /// Both batches must already be transformed under the current
    /// state and aligned index-by-index on the same passages. After a
    /// successful fit, [`transform`](Self::transform) rotates every
    /// vector whose source name appeared in `source`.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::ProcrustesUnstable`] when the paired batch is
    /// too small, misaligned, or rank-deficient; such failures are
    /// recoverable and callers are expected to continue without the
    /// rotation.
    pub fn fit_rotation(
        &mut self,
        source: &[EmbeddingRecord],
        target: &[EmbeddingRecord],
    ) -> AnalysisResult<()> {
        let state = self.state.as_ref().ok_or(AnalysisError::NotFitted)?;
        let dimension = state.dimension;

        if source.len() != target.len() {
            return Err(AnalysisError::ProcrustesUnstable {
                reason: format!(
                    "paired batches differ in length: {} vs {}",
                    source.len(),
                    target.len()
                ),
            });
        }
        if source.len() < MIN_ROTATION_PAIRS {
            return Err(AnalysisError::ProcrustesUnstable {
                reason: format!(
                    "{} aligned pair(s); need at least {MIN_ROTATION_PAIRS}",
                    source.len()
                ),
            });
        }

        // Cross-covariance M = Yᵗ · X over the aligned pairs.
        let mut cross = vec![vec![0.0; dimension]; dimension];
        for (x, y) in source.iter().zip(target.iter()) {
            if x.passage_id != y.passage_id {
                return Err(AnalysisError::ProcrustesUnstable {
                    reason: format!(
                        "pair misaligned: source passage {} against target passage {}",
                        x.passage_id, y.passage_id
                    ),
                });
            }
            validate_record(state, x)?;
            validate_record(state, y)?;
            for i in 0..dimension {
                let yi = y.vector[i] as f64;
                if yi == 0.0 {
                    continue;
                }
                for j in 0..dimension {
                    cross[i][j] += yi * x.vector[j] as f64;
                }
            }
        }

        let decomposition = linalg::svd(&cross)?;
        let condition = decomposition.condition();
        if condition < MIN_ROTATION_CONDITION {
            return Err(AnalysisError::ProcrustesUnstable {
                reason: format!(
                    "cross-covariance nearly rank-deficient (condition {condition:.2e})"
                ),
            });
        }

        // R = V · Uᵗ minimizes ‖Y − X·R‖ over orthogonal R.
        let mut rotation = vec![vec![0.0; dimension]; dimension];
        for (u_col, v_col) in decomposition.u.iter().zip(&decomposition.v) {
            for i in 0..dimension {
                let vi = v_col[i];
                if vi == 0.0 {
                    continue;
                }
                for j in 0..dimension {
                    rotation[i][j] += vi * u_col[j];
                }
            }
        }

        let gram = linalg::mat_mul(&linalg::transpose(&rotation), &rotation);
        let mut max_deviation = 0.0f64;
        for (i, row) in gram.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                max_deviation = max_deviation.max((value - expected).abs());
            }
        }
        if max_deviation > ROTATION_ORTHOGONALITY_TOLERANCE {
            return Err(AnalysisError::ProcrustesUnstable {
                reason: format!("RᵗR deviates from identity by {max_deviation:.2e}"),
            });
        }

        let sources: BTreeSet<String> = source
            .iter()
            .map(|record| record.source_name.clone())
            .collect();
        info!(
            pairs = source.len(),
            condition,
            sources = ?sources,
            "fitted orthogonal rotation into shared frame"
        );

        let state = self.state.as_mut().ok_or(AnalysisError::NotFitted)?;
        state.rotation = Some(rotation);
        state.rotation_sources = sources;
        Ok(())
    }

    fn fit_state(&self, batch: &[EmbeddingRecord]) -> AnalysisResult<CalibrationState> {
        let (rows, model_id, dimension) = validate_batch(batch, "calibration fit")?;
        let sample_count = rows.len();

        let input_diagnostics = diagnose(&rows)?;
        if input_diagnostics.is_anisotropic() {
            warn!(
                isotropy = input_diagnostics.isotropy,
                threshold = EmbeddingDiagnostics::LOW_ISOTROPY,
                "raw batch is badly anisotropic"
            );
        }
        if input_diagnostics.has_similarity_collapse() {
            warn!(
                mean_similarity = input_diagnostics.mean_similarity,
                "raw batch shows similarity collapse"
            );
        }

        let mean = linalg::mean_vector(&rows);
        let centered = linalg::center_rows(&rows, &mean);
        let covariance = linalg::covariance(&centered);
        let eigen = linalg::symmetric_eigen(&covariance)?;

        let epsilon = self.whitening_epsilon;
        let floored_eigenvalues = eigen
            .eigenvalues
            .iter()
            .filter(|lambda| **lambda <= epsilon)
            .count();
        if floored_eigenvalues > 0 {
            warn!(
                floored = floored_eigenvalues,
                dimension,
                sample_count,
                epsilon,
                "degenerate covariance directions floored during whitening"
            );
        }

        let mut whitening = vec![vec![0.0; dimension]; dimension];
        for (lambda, vector) in eigen.eigenvalues.iter().zip(&eigen.eigenvectors) {
            let scale = 1.0 / (lambda.max(0.0) + epsilon).sqrt();
            for i in 0..dimension {
                let vi = vector[i] * scale;
                if vi == 0.0 {
                    continue;
                }
                for j in 0..dimension {
                    whitening[i][j] += vi * vector[j];
                }
            }
        }

        // Whiten and renormalize the fitted batch to locate the
        // dominant residual directions.
        let mut whitened: Vec<Vec<f64>> = centered
            .iter()
            .map(|row| linalg::vec_mat(row, &whitening))
            .collect();
        for (record, row) in batch.iter().zip(whitened.iter_mut()) {
            if !linalg::normalize_mut(row) {
                return Err(AnalysisError::non_finite(format!(
                    "whitened vector collapsed to zero (passage {}, source '{}')",
                    record.passage_id, record.source_name
                )));
            }
        }

        let (component_mean, removed_components) = if self.pc_removal_count > 0 {
            let component_mean = linalg::mean_vector(&whitened);
            let recentered = linalg::center_rows(&whitened, &component_mean);
            let components =
                linalg::top_principal_components(&recentered, self.pc_removal_count);
            if components.len() < self.pc_removal_count {
                debug!(
                    requested = self.pc_removal_count,
                    found = components.len(),
                    "batch rank limited the removable components"
                );
            }
            (component_mean, components)
        } else {
            (vec![0.0; dimension], Vec::new())
        };

        debug!(
            sample_count,
            dimension,
            floored_eigenvalues,
            removed = removed_components.len(),
            isotropy = input_diagnostics.isotropy,
            "fitted calibration state"
        );

        Ok(CalibrationState {
            state_id: Uuid::new_v4(),
            model_id,
            dimension,
            sample_count,
            mean,
            whitening,
            component_mean,
            removed_components,
            rotation: None,
            rotation_sources: BTreeSet::new(),
            epsilon,
            floored_eigenvalues,
            input_diagnostics,
            fitted_at: Utc::now(),
        })
    }
}

fn validate_batch(
    batch: &[EmbeddingRecord],
    context: &str,
) -> AnalysisResult<(Vec<Vec<f64>>, String, usize)> {
    let first = batch
        .first()
        .ok_or_else(|| AnalysisError::empty_batch(context))?;
    let dimension = first.dimension();
    if dimension == 0 {
        return Err(AnalysisError::empty_batch(format!(
            "{context}: zero-dimensional embedding"
        )));
    }
    let model_id = first.model_id.clone();
    let mut rows = Vec::with_capacity(batch.len());
    for record in batch {
        if record.dimension() != dimension {
            return Err(AnalysisError::DimensionMismatch {
                expected: dimension,
                actual: record.dimension(),
            });
        }
        if record.model_id != model_id {
            return Err(AnalysisError::ModelMismatch {
                expected: model_id,
                actual: record.model_id.clone(),
            });
        }
        if !record.is_finite() {
            return Err(AnalysisError::non_finite(format!(
                "embedding for passage {}, source '{}'",
                record.passage_id, record.source_name
            )));
        }
        rows.push(record.vector.iter().map(|x| *x as f64).collect());
    }
    Ok((rows, model_id, dimension))
}

fn validate_record(state: &CalibrationState, record: &EmbeddingRecord) -> AnalysisResult<()> {
    if record.dimension() != state.dimension {
        return Err(AnalysisError::DimensionMismatch {
            expected: state.dimension,
            actual: record.dimension(),
        });
    }
    if record.model_id != state.model_id {
        return Err(AnalysisError::ModelMismatch {
            expected: state.model_id.clone(),
            actual: record.model_id.clone(),
        });
    }
    if !record.is_finite() {
        return Err(AnalysisError::non_finite(format!(
            "embedding for passage {}, source '{}'",
            record.passage_id, record.source_name
        )));
    }
    Ok(())
}

fn transform_record(
    state: &CalibrationState,
    record: &EmbeddingRecord,
) -> AnalysisResult<EmbeddingRecord> {
    validate_record(state, record)?;

    let centered: Vec<f64> = record
        .vector
        .iter()
        .zip(state.mean.iter())
        .map(|(x, m)| *x as f64 - m)
        .collect();
    let mut out = linalg::vec_mat(&centered, &state.whitening);
    if !linalg::normalize_mut(&mut out) {
        return Err(AnalysisError::non_finite(format!(
            "whitened vector collapsed to zero (passage {}, source '{}')",
            record.passage_id, record.source_name
        )));
    }

    if !state.removed_components.is_empty() {
        for (o, m) in out.iter_mut().zip(state.component_mean.iter()) {
            *o -= m;
        }
        for component in &state.removed_components {
            let projection = linalg::dot(&out, component);
            for (o, c) in out.iter_mut().zip(component.iter()) {
                *o -= projection * c;
            }
        }
        if !linalg::normalize_mut(&mut out) {
            return Err(AnalysisError::non_finite(format!(
                "vector lies entirely in the removed components (passage {}, source '{}')",
                record.passage_id, record.source_name
            )));
        }
    }

    if let Some(rotation) = &state.rotation {
        if state.rotation_sources.contains(&record.source_name) {
            out = linalg::vec_mat(&out, rotation);
            // Orthogonal up to round-off; renormalize to keep the
            // unit-norm contract exact.
            if !linalg::normalize_mut(&mut out) {
                return Err(AnalysisError::non_finite(format!(
                    "rotated vector collapsed to zero (passage {}, source '{}')",
                    record.passage_id, record.source_name
                )));
            }
        }
    }

    Ok(record.with_vector(out.iter().map(|x| *x as f32).collect()))
}
