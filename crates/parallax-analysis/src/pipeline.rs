//! Divergence pipeline orchestrator.
//!
//! Drives a raw multi-source corpus through the full analysis in fixed
//! phases:
//!
//! ```text
//! raw corpus
//!   │ normalize   orthography on the German source, OCR on flagged sources
//!   │ align       passage-id intersection across all sources
//!   │ embed-all   every passage/source pair, concurrently
//!   ├─────────────barrier: calibration sees the complete batch
//!   │ fit         whitening + component removal, pooled or per source
//!   │ transform   pure application; optional Procrustes fit + reapply
//!   │ score       per-passage divergence, ranked
//!   └ report      top-N outliers, spread summary, correlations
//! ```
//!
//! The barrier between embedding and fitting is the load-bearing rule:
//! statistics fitted on a partial batch would calibrate early passages
//! differently from late ones, and their scores could not be compared.
//! Phase outputs are independent artifacts; a run aborted between
//! phases leaves nothing half-transformed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parallax_core::{
    AlignedCorpusExport, CalibrationScope, CoreError, DivergenceExportRecord, EmbeddingProvider,
    EmbeddingRecord, Passage, PipelineConfig,
};
use parallax_text::normalizer::{self, RuleSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calibrator::{diagnose, CalibrationState, EmbeddingCalibrator, EmbeddingDiagnostics};
use crate::divergence;
use crate::error::{AnalysisError, AnalysisResult};
use crate::linalg;
use crate::report::{self, OutlierReport};

/// Raw input corpus: source name → (passage id → text).
pub type RawCorpus = BTreeMap<String, BTreeMap<u32, String>>;

/// Synthetic source name for the per-passage mean of translator vectors,
/// used as the Procrustes target frame.
const TRANSLATION_CENTROID: &str = "translation-centroid";

/// What happened to the optional Procrustes rotation in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcrustesStatus {
    /// `enable_procrustes` was off.
    Disabled,
    /// A rotation was fitted and applied to the German source.
    Applied,
    /// Enabled but not applied; the reason is preserved for the run
    /// record.
    Skipped { reason: String },
}

/// Metadata of one fitted calibration state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStateSummary {
    /// `"pooled"`, or the source name under per-source scope.
    pub scope_key: String,
    /// Identity of the fit; matches the full state's id.
    pub state_id: Uuid,
    /// Vectors the state was fitted on.
    pub sample_count: usize,
    /// Vector dimensionality.
    pub dimension: usize,
    /// Covariance eigenvalues at or below the flooring epsilon.
    pub floored_eigenvalues: usize,
    /// Batch health before any transform.
    pub diagnostics_before: EmbeddingDiagnostics,
}

/// Calibration metadata for a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSummary {
    /// Scope the run was configured with.
    pub scope: CalibrationScope,
    /// Model whose vectors were calibrated.
    pub model_id: String,
    /// One entry under pooled scope, one per source otherwise.
    pub states: Vec<CalibrationStateSummary>,
    /// Rotation outcome.
    pub procrustes: ProcrustesStatus,
    /// Batch health after calibration, when measurable.
    pub diagnostics_after: Option<EmbeddingDiagnostics>,
}

/// Everything one run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Normalized, aligned corpus.
    pub aligned: AlignedCorpusExport,
    /// Per-passage divergence records in rank order.
    pub divergence: Vec<DivergenceExportRecord>,
    /// Top outliers, spread summary, and covariate correlations.
    pub report: OutlierReport,
    /// Calibration metadata.
    pub calibration: CalibrationSummary,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

/// The pipeline itself: configuration, an embedding provider, and any
/// rule tables loaded from configured override files.
pub struct DivergencePipeline {
    config: PipelineConfig,
    provider: Arc<dyn EmbeddingProvider>,
    orthography_override: Option<RuleSet>,
    ocr_override: Option<RuleSet>,
}

impl DivergencePipeline {
    /// Create a pipeline, validating the configuration and loading any
    /// configured rule files.
    ///
    /// # Panics
    ///
    /// Panics when the configuration fails validation or a configured
    /// rule file cannot be loaded. Use [`try_new`](Self::try_new) to
    /// handle those as errors.
    pub fn new(config: PipelineConfig, provider: Arc<dyn EmbeddingProvider>) -> Self {
        match Self::try_new(config, provider) {
            Ok(pipeline) => pipeline,
            Err(err) => panic!("invalid pipeline construction: {err}"),
        }
    }

    /// Fallible twin of [`new`](Self::new).
    ///
    /// # Errors
    ///
    /// [`AnalysisError::Config`] when validation fails or a configured
    /// rule file cannot be read and compiled.
    pub fn try_new(
        config: PipelineConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> AnalysisResult<Self> {
        config.validate().map_err(AnalysisError::Config)?;
        if config.model_id != provider.model_id() {
            // Not fatal: the provider's id is authoritative and stamps
            // every record, but a drifted config deserves a trace.
            warn!(
                configured = %config.model_id,
                provider = %provider.model_id(),
                "configured model id differs from the provider's"
            );
        }
        let orthography_override = match &config.orthography_rules_path {
            Some(path) => Some(
                RuleSet::from_json_file(path)
                    .map_err(|e| AnalysisError::Config(format!("orthography rules: {e}")))?,
            ),
            None => None,
        };
        let ocr_override = match &config.ocr_rules_path {
            Some(path) => Some(
                RuleSet::from_json_file(path)
                    .map_err(|e| AnalysisError::Config(format!("ocr rules: {e}")))?,
            ),
            None => None,
        };
        Ok(Self {
            config,
            provider,
            orthography_override,
            ocr_override,
        })
    }

    /// Default configuration pinned to the provider's model.
    ///
    /// # Panics
    ///
    /// Cannot panic in practice: the default configuration is valid and
    /// names no rule files.
    pub fn with_defaults(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let config = PipelineConfig {
            model_id: provider.model_id().to_string(),
            ..PipelineConfig::default()
        };
        Self::new(config, provider)
    }

    /// The configuration this pipeline runs with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn orthography_rules(&self) -> &RuleSet {
        self.orthography_override
            .as_ref()
            .unwrap_or_else(|| normalizer::german_orthography())
    }

    fn ocr_rules(&self) -> &RuleSet {
        self.ocr_override
            .as_ref()
            .unwrap_or_else(|| normalizer::ocr_corrections())
    }

    /// Run the full analysis over a raw corpus.
    ///
    /// # Errors
    ///
    /// Fatal conditions only: provider failures, a dimension or model
    /// mismatch anywhere in the batch, non-finite vectors, calibration
    /// numerics. Per-passage conditions (alignment gaps, under-sourced
    /// passages) and Procrustes instability are logged, recorded in the
    /// outcome, and never abort a run.
    pub async fn run(&self, raw: RawCorpus) -> AnalysisResult<PipelineOutcome> {
        let started_at = Utc::now();

        let normalized = self.normalize_corpus(&raw);
        let passages = parallax_text::align(&normalized, self.config.min_passage_chars);
        info!(
            sources = normalized.len(),
            passages = passages.len(),
            "aligned corpus"
        );
        if passages.is_empty() {
            warn!("alignment left no passages; returning an empty outcome");
            return Ok(self.empty_outcome(started_at));
        }

        let records = self.embed_all(&passages).await?;
        let (calibrated, calibration) = self.calibrate(&records)?;
        let results = divergence::score_all(&calibrated)?;
        info!(
            scored = results.len(),
            skipped = passages.len() - results.len(),
            "scored divergence"
        );

        let report = report::build_report(&results, &passages, self.config.top_n);
        let divergence = results.iter().map(DivergenceExportRecord::from).collect();

        Ok(PipelineOutcome {
            aligned: AlignedCorpusExport::from_passages(&passages),
            divergence,
            report,
            calibration,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Apply the OCR table to flagged sources, then orthography to the
    /// German source. OCR first: orthography rules assume letters are
    /// already letters.
    fn normalize_corpus(&self, raw: &RawCorpus) -> RawCorpus {
        let mut normalized = RawCorpus::new();
        for (source, passages) in raw {
            let apply_ocr = self.config.ocr_sources.iter().any(|name| name == source);
            let apply_orthography = is_german_source(source);
            let mut cleaned = BTreeMap::new();
            for (&passage_id, text) in passages {
                let mut text = text.clone();
                if apply_ocr {
                    text = normalizer::normalize(&text, self.ocr_rules());
                }
                if apply_orthography {
                    text = normalizer::normalize(&text, self.orthography_rules());
                }
                cleaned.insert(passage_id, text);
            }
            debug!(
                source = %source,
                ocr = apply_ocr,
                orthography = apply_orthography,
                "normalized source"
            );
            normalized.insert(source.clone(), cleaned);
        }
        normalized
    }

    /// Embed every passage/source pair concurrently, then validate the
    /// whole batch against the provider's dimension.
    async fn embed_all(&self, passages: &[Passage]) -> AnalysisResult<Vec<EmbeddingRecord>> {
        let prefix = self.config.prompt_prefix.as_deref().unwrap_or("");
        let model_id = self.provider.model_id().to_string();

        let mut pending = Vec::new();
        for passage in passages {
            for (source, text) in &passage.source_texts {
                let provider = Arc::clone(&self.provider);
                let prompt = format!("{prefix}{text}");
                let passage_id = passage.passage_id;
                let source = source.clone();
                let model_id = model_id.clone();
                pending.push(async move {
                    let vector = provider.embed(&prompt).await?;
                    Ok::<_, CoreError>(EmbeddingRecord::new(passage_id, source, vector, model_id))
                });
            }
        }

        let expected = self.provider.dimension();
        let mut records = Vec::with_capacity(pending.len());
        for outcome in join_all(pending).await {
            let record = outcome?;
            if record.dimension() != expected {
                return Err(AnalysisError::DimensionMismatch {
                    expected,
                    actual: record.dimension(),
                });
            }
            records.push(record.normalized()?);
        }
        info!(
            records = records.len(),
            dimension = expected,
            "embedded corpus"
        );
        Ok(records)
    }

    fn calibrate(
        &self,
        records: &[EmbeddingRecord],
    ) -> AnalysisResult<(Vec<EmbeddingRecord>, CalibrationSummary)> {
        match self.config.calibration_scope {
            CalibrationScope::Pooled => self.calibrate_pooled(records),
            CalibrationScope::PerSource => self.calibrate_per_source(records),
        }
    }

    /// One state over every source's vectors; the Procrustes rotation,
    /// when enabled, is fitted here and the batch re-transformed from
    /// the originals so it is applied exactly once.
    fn calibrate_pooled(
        &self,
        records: &[EmbeddingRecord],
    ) -> AnalysisResult<(Vec<EmbeddingRecord>, CalibrationSummary)> {
        let mut calibrator = EmbeddingCalibrator::from_config(&self.config);
        let state_summary = {
            let state = calibrator.fit(records)?;
            info!(
                state_id = %state.state_id,
                samples = state.sample_count,
                floored = state.floored_eigenvalues,
                "fitted pooled calibration"
            );
            summarize_state("pooled", state)
        };
        let mut calibrated = calibrator.transform(records)?;

        let procrustes = if self.config.enable_procrustes {
            match rotation_pairs(&calibrated) {
                Ok((source, target)) => match calibrator.fit_rotation(&source, &target) {
                    Ok(()) => {
                        calibrated = calibrator.transform(records)?;
                        ProcrustesStatus::Applied
                    }
                    Err(err) if err.is_recoverable() => {
                        warn!(error = %err, "rotation fit failed; continuing without it");
                        ProcrustesStatus::Skipped {
                            reason: err.to_string(),
                        }
                    }
                    Err(err) => return Err(err),
                },
                Err(err) => {
                    warn!(error = %err, "rotation pairing failed; continuing without it");
                    ProcrustesStatus::Skipped {
                        reason: err.to_string(),
                    }
                }
            }
        } else {
            ProcrustesStatus::Disabled
        };

        let summary = CalibrationSummary {
            scope: CalibrationScope::Pooled,
            model_id: self.provider.model_id().to_string(),
            states: vec![state_summary],
            procrustes,
            diagnostics_after: diagnostics_of(&calibrated),
        };
        Ok((calibrated, summary))
    }

    /// One state per source name. No shared frame exists under this
    /// scope, so the rotation is always skipped.
    fn calibrate_per_source(
        &self,
        records: &[EmbeddingRecord],
    ) -> AnalysisResult<(Vec<EmbeddingRecord>, CalibrationSummary)> {
        let mut by_source: BTreeMap<String, Vec<EmbeddingRecord>> = BTreeMap::new();
        for record in records {
            by_source
                .entry(record.source_name.clone())
                .or_default()
                .push(record.clone());
        }

        let mut states = Vec::new();
        let mut calibrated = Vec::new();
        for (source, batch) in &by_source {
            let mut calibrator = EmbeddingCalibrator::from_config(&self.config);
            let state_summary = {
                let state = calibrator.fit(batch)?;
                debug!(
                    source = %source,
                    state_id = %state.state_id,
                    samples = state.sample_count,
                    "fitted per-source calibration"
                );
                summarize_state(source, state)
            };
            states.push(state_summary);
            calibrated.extend(calibrator.transform(batch)?);
        }
        info!(states = states.len(), "fitted per-source calibrations");

        let procrustes = if self.config.enable_procrustes {
            let reason =
                "rotation requires pooled calibration; per-source states share no frame"
                    .to_string();
            warn!(%reason, "rotation skipped");
            ProcrustesStatus::Skipped { reason }
        } else {
            ProcrustesStatus::Disabled
        };

        let summary = CalibrationSummary {
            scope: CalibrationScope::PerSource,
            model_id: self.provider.model_id().to_string(),
            states,
            procrustes,
            diagnostics_after: diagnostics_of(&calibrated),
        };
        Ok((calibrated, summary))
    }

    fn empty_outcome(&self, started_at: DateTime<Utc>) -> PipelineOutcome {
        let procrustes = if self.config.enable_procrustes {
            ProcrustesStatus::Skipped {
                reason: "empty corpus".to_string(),
            }
        } else {
            ProcrustesStatus::Disabled
        };
        PipelineOutcome {
            aligned: AlignedCorpusExport::from_passages(&[]),
            divergence: Vec::new(),
            report: report::build_report(&[], &[], self.config.top_n),
            calibration: CalibrationSummary {
                scope: self.config.calibration_scope,
                model_id: self.provider.model_id().to_string(),
                states: Vec::new(),
                procrustes,
                diagnostics_after: None,
            },
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// The German original is named by convention, not position.
fn is_german_source(name: &str) -> bool {
    let lowered = name.to_lowercase();
    lowered.contains("german") || lowered.contains("original")
}

fn summarize_state(scope_key: &str, state: &CalibrationState) -> CalibrationStateSummary {
    CalibrationStateSummary {
        scope_key: scope_key.to_string(),
        state_id: state.state_id,
        sample_count: state.sample_count,
        dimension: state.dimension,
        floored_eigenvalues: state.floored_eigenvalues,
        diagnostics_before: state.input_diagnostics.clone(),
    }
}

/// Build index-aligned Procrustes batches from a calibrated corpus:
/// the German vector of each passage paired against the renormalized
/// mean of that passage's translator vectors.
///
/// Pairing against the translator centroid instead of a single chosen
/// translator keeps the target frame from inheriting one translator's
/// idiosyncrasies, which the rotation would then bake into every score.
fn rotation_pairs(
    records: &[EmbeddingRecord],
) -> AnalysisResult<(Vec<EmbeddingRecord>, Vec<EmbeddingRecord>)> {
    let mut german_names = BTreeSet::new();
    for record in records {
        if is_german_source(&record.source_name) {
            german_names.insert(record.source_name.clone());
        }
    }
    let mut names = german_names.into_iter();
    let german = match (names.next(), names.next()) {
        (Some(name), None) => name,
        (None, _) => {
            return Err(AnalysisError::ProcrustesUnstable {
                reason: "no German-language source to rotate".to_string(),
            })
        }
        (Some(first), Some(second)) => {
            return Err(AnalysisError::ProcrustesUnstable {
                reason: format!(
                    "multiple German-language sources ('{first}', '{second}'); rotation needs exactly one"
                ),
            })
        }
    };

    let mut by_passage: BTreeMap<u32, Vec<&EmbeddingRecord>> = BTreeMap::new();
    for record in records {
        by_passage.entry(record.passage_id).or_default().push(record);
    }

    let mut source_batch = Vec::new();
    let mut target_batch = Vec::new();
    for (passage_id, group) in by_passage {
        let Some(german_record) = group.iter().find(|r| r.source_name == german) else {
            continue;
        };
        let translators: Vec<&&EmbeddingRecord> =
            group.iter().filter(|r| r.source_name != german).collect();
        if translators.is_empty() {
            continue;
        }

        let mut centroid = vec![0.0f64; german_record.dimension()];
        for translator in &translators {
            for (accum, value) in centroid.iter_mut().zip(&translator.vector) {
                *accum += f64::from(*value);
            }
        }
        for value in &mut centroid {
            *value /= translators.len() as f64;
        }
        if !linalg::normalize_mut(&mut centroid) {
            debug!(passage_id, "translator centroid degenerate; pair dropped");
            continue;
        }

        let centroid_f32: Vec<f32> = centroid.iter().map(|&v| v as f32).collect();
        source_batch.push((*german_record).clone());
        target_batch.push(EmbeddingRecord::new(
            passage_id,
            TRANSLATION_CENTROID,
            centroid_f32,
            german_record.model_id.clone(),
        ));
    }

    if source_batch.is_empty() {
        return Err(AnalysisError::ProcrustesUnstable {
            reason: "no passage pairs the German source with a translation".to_string(),
        });
    }
    Ok((source_batch, target_batch))
}

fn diagnostics_of(records: &[EmbeddingRecord]) -> Option<EmbeddingDiagnostics> {
    let rows: Vec<Vec<f64>> = records
        .iter()
        .map(|record| record.vector.iter().map(|&v| f64::from(v)).collect())
        .collect();
    match diagnose(&rows) {
        Ok(diagnostics) => Some(diagnostics),
        Err(err) => {
            debug!(error = %err, "post-calibration diagnostics unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parallax_core::stubs::{FixedEmbeddingProvider, StubEmbeddingProvider};
    use std::io::Write;
    use std::path::PathBuf;

    fn corpus(sources: Vec<(&str, Vec<(u32, &str)>)>) -> RawCorpus {
        let mut raw = RawCorpus::new();
        for (source, passages) in sources {
            let mut texts = BTreeMap::new();
            for (id, text) in passages {
                texts.insert(id, text.to_string());
            }
            raw.insert(source.to_string(), texts);
        }
        raw
    }

    /// Fixed 2-D geometry: passage 1 has one translator near the
    /// German and one orthogonal to it; passages 2 and 3 are exact
    /// agreement (identical text, identical vector, for all sources).
    #[tokio::test]
    async fn run_ranks_translator_disagreement_first() {
        let mut provider = FixedEmbeddingProvider::new(2);
        provider.insert("eins original", vec![1.0, 0.0]);
        provider.insert("one alpha", vec![0.99, 0.14]);
        provider.insert("one bravo", vec![0.0, 1.0]);
        provider.insert("zwei gemeinsam", vec![0.6, 0.8]);
        provider.insert("drei gemeinsam", vec![-0.8, 0.6]);

        let config = PipelineConfig {
            model_id: "fixed-vectors-d2".to_string(),
            pc_removal_count: 0,
            ..PipelineConfig::default()
        };
        let pipeline = DivergencePipeline::new(config, Arc::new(provider));

        let raw = corpus(vec![
            (
                "german",
                vec![(1, "eins original"), (2, "zwei gemeinsam"), (3, "drei gemeinsam")],
            ),
            (
                "TranslatorA",
                vec![(1, "one alpha"), (2, "zwei gemeinsam"), (3, "drei gemeinsam")],
            ),
            (
                "TranslatorB",
                vec![(1, "one bravo"), (2, "zwei gemeinsam"), (3, "drei gemeinsam")],
            ),
        ]);

        let outcome = pipeline.run(raw).await.unwrap();

        assert_eq!(outcome.aligned.len(), 3);
        assert_eq!(outcome.divergence.len(), 3);
        assert_eq!(outcome.divergence[0].passage_id, 1);
        assert!(
            outcome.divergence[0].spread > 1e-4,
            "disagreeing passage should keep nonzero spread, got {}",
            outcome.divergence[0].spread
        );
        assert_eq!(outcome.divergence[1].passage_id, 2);
        assert_eq!(outcome.divergence[2].passage_id, 3);
        assert!(outcome.divergence[1].spread.abs() < 1e-6);
        assert!(outcome.divergence[2].spread.abs() < 1e-6);

        assert_eq!(outcome.report.top[0].passage_id, 1);
        assert_eq!(outcome.report.top[0].rank, 1);
        assert_eq!(outcome.report.summary.scored_passages, 3);

        assert_eq!(outcome.calibration.states.len(), 1);
        assert_eq!(outcome.calibration.states[0].scope_key, "pooled");
        assert_eq!(outcome.calibration.states[0].sample_count, 9);
        assert_eq!(outcome.calibration.procrustes, ProcrustesStatus::Disabled);
    }

    #[tokio::test]
    async fn runs_are_reproducible() {
        let raw = corpus(vec![
            (
                "german",
                vec![
                    (1, "der Werth der Wahrheit"),
                    (2, "es giebt keinen Zweifel"),
                    (3, "die Thatsache war nothwendig"),
                    (4, "so sey es"),
                ],
            ),
            (
                "Kaufmann",
                vec![
                    (1, "the value of truth"),
                    (2, "there is no doubt"),
                    (3, "the fact was necessary"),
                    (4, "so be it"),
                ],
            ),
            (
                "Hollingdale",
                vec![
                    (1, "the worth of truth"),
                    (2, "no doubt exists"),
                    (3, "that fact was needful"),
                    (4, "thus let it be"),
                ],
            ),
        ]);
        let config = PipelineConfig {
            model_id: "stub-multilingual-v1-d16".to_string(),
            ..PipelineConfig::default()
        };

        let first = DivergencePipeline::new(
            config.clone(),
            Arc::new(StubEmbeddingProvider::with_dimension(16)),
        );
        let second = DivergencePipeline::new(
            config,
            Arc::new(StubEmbeddingProvider::with_dimension(16)),
        );

        let outcome_a = first.run(raw.clone()).await.unwrap();
        let outcome_b = second.run(raw).await.unwrap();

        assert_eq!(outcome_a.divergence, outcome_b.divergence);
        assert_eq!(outcome_a.report.summary, outcome_b.report.summary);
        assert_eq!(
            outcome_a.calibration.states[0].floored_eigenvalues,
            outcome_b.calibration.states[0].floored_eigenvalues
        );
        // 12 samples cannot span 16 dimensions
        assert!(outcome_a.calibration.states[0].floored_eigenvalues >= 5);
        // fits are distinct even when their numbers agree
        assert_ne!(
            outcome_a.calibration.states[0].state_id,
            outcome_b.calibration.states[0].state_id
        );
        assert!(outcome_a.calibration.diagnostics_after.is_some());
    }

    #[tokio::test]
    async fn disjoint_sources_short_circuit_to_empty_outcome() {
        let raw = corpus(vec![
            ("german", vec![(1, "erstens")]),
            ("Kaufmann", vec![(2, "secondly")]),
        ]);
        let config = PipelineConfig {
            model_id: "stub-multilingual-v1-d8".to_string(),
            ..PipelineConfig::default()
        };
        let pipeline =
            DivergencePipeline::new(config, Arc::new(StubEmbeddingProvider::with_dimension(8)));

        let outcome = pipeline.run(raw).await.unwrap();

        assert!(outcome.aligned.is_empty());
        assert!(outcome.divergence.is_empty());
        assert_eq!(outcome.report.summary.scored_passages, 0);
        assert!(outcome.calibration.states.is_empty());
        assert_eq!(outcome.calibration.procrustes, ProcrustesStatus::Disabled);
        assert!(outcome.calibration.diagnostics_after.is_none());
    }

    #[tokio::test]
    async fn alignment_gaps_drop_passages_from_every_artifact() {
        let raw = corpus(vec![
            ("german", vec![(1, "eins"), (2, "zwei"), (3, "drei")]),
            ("Kaufmann", vec![(2, "two"), (3, "three")]),
            ("Zimmern", vec![(2, "second"), (3, "third")]),
        ]);
        let config = PipelineConfig {
            model_id: "stub-multilingual-v1-d8".to_string(),
            ..PipelineConfig::default()
        };
        let pipeline =
            DivergencePipeline::new(config, Arc::new(StubEmbeddingProvider::with_dimension(8)));

        let outcome = pipeline.run(raw).await.unwrap();

        let aligned_ids: Vec<u32> = outcome.aligned.passages.keys().copied().collect();
        assert_eq!(aligned_ids, vec![2, 3]);
        let scored_ids: BTreeSet<u32> =
            outcome.divergence.iter().map(|r| r.passage_id).collect();
        assert_eq!(scored_ids, BTreeSet::from([2, 3]));
        assert_eq!(outcome.calibration.states[0].sample_count, 6);
    }

    #[tokio::test]
    async fn single_source_corpus_aligns_but_scores_nothing() {
        let raw = corpus(vec![(
            "german",
            vec![(1, "eins"), (2, "zwei"), (3, "drei")],
        )]);
        let config = PipelineConfig {
            model_id: "stub-multilingual-v1-d4".to_string(),
            pc_removal_count: 0,
            ..PipelineConfig::default()
        };
        let pipeline =
            DivergencePipeline::new(config, Arc::new(StubEmbeddingProvider::with_dimension(4)));

        let outcome = pipeline.run(raw).await.unwrap();

        assert_eq!(outcome.aligned.len(), 3);
        assert!(outcome.divergence.is_empty());
        assert_eq!(outcome.report.summary.scored_passages, 0);
        assert_eq!(outcome.calibration.states[0].sample_count, 3);
    }

    #[tokio::test]
    async fn procrustes_applies_on_pooled_scope() {
        let mut raw = RawCorpus::new();
        for source in ["german", "Kaufmann", "Zimmern"] {
            let mut texts = BTreeMap::new();
            for id in 1..=8u32 {
                texts.insert(id, format!("{source} passage {id}"));
            }
            raw.insert(source.to_string(), texts);
        }
        let config = PipelineConfig {
            model_id: "stub-multilingual-v1-d3".to_string(),
            pc_removal_count: 0,
            enable_procrustes: true,
            ..PipelineConfig::default()
        };
        let pipeline =
            DivergencePipeline::new(config, Arc::new(StubEmbeddingProvider::with_dimension(3)));

        let outcome = pipeline.run(raw).await.unwrap();

        assert_eq!(outcome.calibration.procrustes, ProcrustesStatus::Applied);
        assert_eq!(outcome.divergence.len(), 8);
        assert_eq!(outcome.calibration.states.len(), 1);
    }

    #[tokio::test]
    async fn per_source_scope_fits_one_state_per_source_and_skips_rotation() {
        let mut raw = RawCorpus::new();
        for source in ["german", "Kaufmann", "Hollingdale"] {
            let mut texts = BTreeMap::new();
            for id in 1..=5u32 {
                texts.insert(id, format!("{source} text {id}"));
            }
            raw.insert(source.to_string(), texts);
        }
        let config = PipelineConfig {
            model_id: "stub-multilingual-v1-d4".to_string(),
            calibration_scope: CalibrationScope::PerSource,
            enable_procrustes: true,
            pc_removal_count: 0,
            ..PipelineConfig::default()
        };
        let pipeline =
            DivergencePipeline::new(config, Arc::new(StubEmbeddingProvider::with_dimension(4)));

        let outcome = pipeline.run(raw).await.unwrap();

        assert_eq!(outcome.calibration.scope, CalibrationScope::PerSource);
        assert_eq!(outcome.calibration.states.len(), 3);
        let scope_keys: Vec<&str> = outcome
            .calibration
            .states
            .iter()
            .map(|s| s.scope_key.as_str())
            .collect();
        assert_eq!(scope_keys, vec!["Hollingdale", "Kaufmann", "german"]);
        match &outcome.calibration.procrustes {
            ProcrustesStatus::Skipped { reason } => {
                assert!(reason.contains("pooled"), "reason: {reason}")
            }
            other => panic!("expected a skipped rotation, got {:?}", other),
        }
        assert_eq!(outcome.divergence.len(), 5);
    }

    #[tokio::test]
    async fn custom_orthography_rules_replace_the_builtin_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"pattern": "uralt", "replacement": "betagt"}}]"#
        )
        .unwrap();

        let mut provider = FixedEmbeddingProvider::new(2);
        provider.insert("der Werth betagt", vec![1.0, 0.0]);
        provider.insert("old and worthy", vec![0.8, 0.6]);
        provider.insert("zwei mal zwei", vec![0.0, 1.0]);
        provider.insert("two times two", vec![-0.6, 0.8]);
        provider.insert("drei worte noch", vec![-1.0, 0.0]);
        provider.insert("three more words", vec![-0.8, -0.6]);

        let config = PipelineConfig {
            model_id: "fixed-vectors-d2".to_string(),
            orthography_rules_path: Some(file.path().to_path_buf()),
            pc_removal_count: 0,
            ..PipelineConfig::default()
        };
        let pipeline = DivergencePipeline::new(config, Arc::new(provider));

        let raw = corpus(vec![
            (
                "german",
                vec![(1, "der Werth uralt"), (2, "zwei mal zwei"), (3, "drei worte noch")],
            ),
            (
                "Kaufmann",
                vec![(1, "old and worthy"), (2, "two times two"), (3, "three more words")],
            ),
        ]);

        let outcome = pipeline.run(raw).await.unwrap();

        let german_text = &outcome.aligned.passages[&1].sources["german"];
        // the custom rule fired, and the builtin Werth→Wert did not
        assert_eq!(german_text, "der Werth betagt");
    }

    #[tokio::test]
    async fn ocr_sources_get_the_correction_table() {
        let raw = corpus(vec![
            (
                "german",
                vec![(1, "der Wille zur Macht"), (2, "der freie Geist")],
            ),
            (
                "Zimmern",
                vec![(1, "tlie will to power"), (2, "tlie free spirit")],
            ),
        ]);
        let config = PipelineConfig {
            model_id: "stub-multilingual-v1-d8".to_string(),
            ocr_sources: vec!["Zimmern".to_string()],
            ..PipelineConfig::default()
        };
        let pipeline =
            DivergencePipeline::new(config, Arc::new(StubEmbeddingProvider::with_dimension(8)));

        let outcome = pipeline.run(raw).await.unwrap();

        assert_eq!(
            outcome.aligned.passages[&1].sources["Zimmern"],
            "the will to power"
        );
        assert_eq!(
            outcome.aligned.passages[&1].sources["german"],
            "der Wille zur Macht"
        );
    }

    #[tokio::test]
    async fn prompt_prefix_is_composed_before_embedding() {
        // The fixed provider only knows the prefixed texts, so the run
        // succeeds only if the prefix actually reaches it.
        let mut provider = FixedEmbeddingProvider::new(2);
        provider.insert("query: guten tag", vec![1.0, 0.0]);
        provider.insert("query: good day", vec![0.8, 0.6]);
        provider.insert("query: gute nacht", vec![0.0, 1.0]);
        provider.insert("query: good night", vec![-0.6, 0.8]);
        provider.insert("query: guter morgen", vec![-1.0, 0.0]);
        provider.insert("query: good morning", vec![-0.8, -0.6]);

        let config = PipelineConfig {
            model_id: "fixed-vectors-d2".to_string(),
            prompt_prefix: Some("query: ".to_string()),
            pc_removal_count: 0,
            ..PipelineConfig::default()
        };
        let pipeline = DivergencePipeline::new(config, Arc::new(provider));

        let raw = corpus(vec![
            (
                "german",
                vec![(1, "guten tag"), (2, "gute nacht"), (3, "guter morgen")],
            ),
            (
                "Kaufmann",
                vec![(1, "good day"), (2, "good night"), (3, "good morning")],
            ),
        ]);

        let outcome = pipeline.run(raw).await.unwrap();
        assert_eq!(outcome.divergence.len(), 3);
        // aligned export carries the unprefixed text
        assert_eq!(outcome.aligned.passages[&1].sources["german"], "guten tag");
    }

    #[test]
    fn missing_rules_file_is_a_config_error() {
        let config = PipelineConfig {
            orthography_rules_path: Some(PathBuf::from("/nonexistent/orthography.json")),
            ..PipelineConfig::default()
        };
        let err = DivergencePipeline::try_new(config, Arc::new(StubEmbeddingProvider::new()))
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("orthography"), "error: {err}");
    }

    #[test]
    fn try_new_rejects_invalid_config() {
        let config = PipelineConfig {
            top_n: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            DivergencePipeline::try_new(config, Arc::new(StubEmbeddingProvider::new())),
            Err(AnalysisError::Config(_))
        ));
    }

    #[test]
    #[should_panic(expected = "invalid pipeline construction")]
    fn new_panics_on_invalid_config() {
        let config = PipelineConfig {
            model_id: String::new(),
            ..PipelineConfig::default()
        };
        let _ = DivergencePipeline::new(config, Arc::new(StubEmbeddingProvider::new()));
    }

    #[test]
    fn with_defaults_pins_the_provider_model() {
        let pipeline =
            DivergencePipeline::with_defaults(Arc::new(StubEmbeddingProvider::with_dimension(8)));
        assert_eq!(pipeline.config().model_id, "stub-multilingual-v1-d8");
        assert_eq!(pipeline.config().pc_removal_count, 1);
    }

    #[test]
    fn german_detection_is_name_based_and_case_insensitive() {
        assert!(is_german_source("german"));
        assert!(is_german_source("German (KSA)"));
        assert!(is_german_source("original-1886"));
        assert!(!is_german_source("Kaufmann"));
        assert!(!is_german_source("Zimmern"));
    }
}
