//! Typed `postprocess.json` settings.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::validate::{ValidationError, ValidationResult};

/// Settings for one postprocessing pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostprocessConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Seed for the resampling random stream.
    #[serde(default)]
    pub seed: u64,

    /// Log-likelihoods are divided by this before any evidence math.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Approximate Bayesian computation mode; off when absent.
    #[serde(default)]
    pub abc: Option<AbcConfig>,

    /// Slack allowed when checking that level boundaries never increase.
    #[serde(default = "default_boundary_tolerance")]
    pub boundary_tolerance: f64,

    #[serde(default)]
    pub output: OutputConfig,
}

/// ABC mode: the lowest `fraction` of particles (in level/likelihood order)
/// are rejected and the rest are accepted with uniform posterior weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AbcConfig {
    pub fraction: f64,
}

/// Output file names, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub posterior_file: String,
    pub results_file: String,
    pub diagnostics_file: String,
    pub levels_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            posterior_file: "posterior.jsonl".to_string(),
            results_file: "results.yaml".to_string(),
            diagnostics_file: "particle_weights.jsonl".to_string(),
            levels_file: "level_summary.jsonl".to_string(),
        }
    }
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            seed: 0,
            temperature: default_temperature(),
            abc: None,
            boundary_tolerance: default_boundary_tolerance(),
            output: OutputConfig::default(),
        }
    }
}

impl PostprocessConfig {
    /// Parse settings from JSON text (shape only; see `validate_config`).
    pub fn from_json(json: &str) -> ValidationResult<Self> {
        serde_json::from_str(json).map_err(|e| ValidationError::ParseError(e.to_string()))
    }

    /// Read and parse a settings file.
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ValidationError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// ABC rejection fraction, if ABC mode is on.
    pub fn abc_fraction(&self) -> Option<f64> {
        self.abc.map(|abc| abc.fraction)
    }
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

fn default_temperature() -> f64 {
    1.0
}

fn default_boundary_tolerance() -> f64 {
    1e-9
}
