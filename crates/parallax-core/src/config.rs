//! Pipeline configuration.
//!
//! [`PipelineConfig`] is the whole configuration surface the pipeline
//! recognizes. Everything else is fixed behavior; if a knob is not here, it
//! is not a knob.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which embeddings the calibrator fits over.
///
/// Pooled fitting (all sources together) is the default: fitting each
/// translator separately would whiten away exactly the per-translator
/// stylistic signal the divergence scores measure. Per-source fitting stays
/// available for methodological comparison runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationScope {
    /// One calibration state fitted over every source's embeddings.
    #[default]
    Pooled,
    /// A calibration state per source name.
    PerSource,
}

/// Configuration surface for a divergence-analysis run.
///
/// # Example
///
/// ```rust
/// use parallax_core::config::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.pc_removal_count, 1);
/// assert!((config.whitening_epsilon - 1e-6).abs() < 1e-12);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Identifier of the embedding model a run is pinned to. Embeddings
    /// carrying any other model id are rejected before calibration.
    pub model_id: String,

    /// Optional JSON file overriding the built-in German orthography table.
    #[serde(default)]
    pub orthography_rules_path: Option<PathBuf>,

    /// Optional JSON file overriding the built-in OCR-correction table.
    #[serde(default)]
    pub ocr_rules_path: Option<PathBuf>,

    /// How many top principal components to remove after whitening.
    /// Range: `[0, 8]`. Zero disables removal.
    #[serde(default = "default_pc_removal_count")]
    pub pc_removal_count: usize,

    /// Eigenvalue floor for whitening. Must be positive and finite.
    #[serde(default = "default_whitening_epsilon")]
    pub whitening_epsilon: f64,

    /// Fit and apply the cross-lingual Procrustes rotation.
    #[serde(default)]
    pub enable_procrustes: bool,

    /// Pooled or per-source calibration fitting.
    #[serde(default)]
    pub calibration_scope: CalibrationScope,

    /// Optional prefix composed with every text before embedding
    /// (e.g. `"query: "` for E5-family models).
    #[serde(default)]
    pub prompt_prefix: Option<String>,

    /// Source names whose texts pass through the OCR-correction table.
    /// Scanned-book translations go here; born-digital sources do not.
    #[serde(default)]
    pub ocr_sources: Vec<String>,

    /// Minimum character count for a source's text to count as present
    /// during alignment. Shorter texts are treated as alignment gaps.
    #[serde(default = "default_min_passage_chars")]
    pub min_passage_chars: usize,

    /// How many top-divergence passages the reporter surfaces.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_pc_removal_count() -> usize {
    1
}

fn default_whitening_epsilon() -> f64 {
    1e-6
}

fn default_min_passage_chars() -> usize {
    1
}

fn default_top_n() -> usize {
    25
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_id: "multilingual-e5-large".to_string(),
            orthography_rules_path: None,
            ocr_rules_path: None,
            pc_removal_count: default_pc_removal_count(),
            whitening_epsilon: default_whitening_epsilon(),
            enable_procrustes: false,
            calibration_scope: CalibrationScope::default(),
            prompt_prefix: None,
            ocr_sources: Vec::new(),
            min_passage_chars: default_min_passage_chars(),
            top_n: default_top_n(),
        }
    }
}

impl PipelineConfig {
    /// Validate the configuration, returning a message naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), String> {
        if self.model_id.trim().is_empty() {
            return Err("model_id must not be empty".to_string());
        }
        if !(self.whitening_epsilon > 0.0 && self.whitening_epsilon.is_finite()) {
            return Err(format!(
                "whitening_epsilon must be positive and finite, got {}",
                self.whitening_epsilon
            ));
        }
        if self.pc_removal_count > 8 {
            return Err(format!(
                "pc_removal_count must be in [0, 8], got {}",
                self.pc_removal_count
            ));
        }
        if self.top_n == 0 {
            return Err("top_n must be > 0".to_string());
        }
        if let Some(prefix) = &self.prompt_prefix {
            if prefix.is_empty() {
                return Err("prompt_prefix, when set, must not be empty".to_string());
            }
        }
        Ok(())
    }
}
