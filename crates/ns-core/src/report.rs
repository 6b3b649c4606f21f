//! Results and diagnostics files.
//!
//! - `results.yaml`: headline numbers of a postprocessing pass
//! - `particle_weights.jsonl`: one [`WeightedParticle`] per line
//! - `level_summary.jsonl`: one [`LevelSummary`] per line
//!
//! Plus the human summaries the CLI prints.

use chrono::{DateTime, Utc};
use ns_common::serde_ext::log_value;
use ns_common::{Error, Result};
use ns_config::{ConfigSnapshot, OutputConfig, PostprocessConfig};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::evidence::{EvidenceEstimate, LevelSummary, WeightedParticle};
use crate::resample::PosteriorDraw;
use crate::store::jsonl::{replace_file, write_jsonl};

const RESULTS_HEADER: &str = "\
# Results of nested-sampling postprocessing
# log_evidence: natural log of the marginal likelihood
# information: prior-to-posterior Kullback-Leibler divergence, in nats
# effective_sample_size: of the full-record particles
";

/// Contents of `results.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    #[serde(with = "log_value")]
    pub log_evidence: f64,
    pub information: f64,
    pub effective_sample_size: f64,
    pub posterior_samples: u64,
    pub particles_included: u64,
    pub particles_excluded: u64,
    pub levels_used: u32,
    pub seed: u64,
    pub temperature: f64,
    #[serde(default)]
    pub abc_fraction: Option<f64>,
    pub generated_at: DateTime<Utc>,
    pub config: ConfigSnapshot,
}

impl RunResults {
    pub fn new(
        estimate: &EvidenceEstimate,
        draw: &PosteriorDraw,
        config: &PostprocessConfig,
        snapshot: &ConfigSnapshot,
    ) -> Self {
        Self {
            log_evidence: estimate.log_evidence,
            information: estimate.information,
            effective_sample_size: draw.effective_sample_size,
            posterior_samples: draw.samples.len() as u64,
            particles_included: estimate.particles.len() as u64,
            particles_excluded: estimate.excluded,
            levels_used: estimate.levels_used,
            seed: config.seed,
            temperature: config.temperature,
            abc_fraction: config.abc_fraction(),
            generated_at: Utc::now(),
            config: snapshot.clone(),
        }
    }

    /// Read a results file written by [`write_results`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

/// Write `results.yaml`, replacing any previous file.
pub fn write_results(path: &Path, results: &RunResults) -> Result<()> {
    let body = serde_yaml::to_string(results)?;
    replace_file(path, |writer| {
        writer
            .write_all(RESULTS_HEADER.as_bytes())
            .map_err(|e| Error::io(path, e))?;
        writer
            .write_all(body.as_bytes())
            .map_err(|e| Error::io(path, e))
    })
}

/// Paths of every file a postprocessing pass writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    pub posterior: PathBuf,
    pub results: PathBuf,
    pub particles: PathBuf,
    pub levels: PathBuf,
}

impl OutputPaths {
    pub fn new(out_dir: &Path, output: &OutputConfig) -> Self {
        Self {
            posterior: out_dir.join(&output.posterior_file),
            results: out_dir.join(&output.results_file),
            particles: out_dir.join(&output.diagnostics_file),
            levels: out_dir.join(&output.levels_file),
        }
    }
}

/// Write the per-particle and per-level diagnostic tables.
pub fn write_diagnostics(paths: &OutputPaths, estimate: &EvidenceEstimate) -> Result<()> {
    write_jsonl::<WeightedParticle>(&paths.particles, &estimate.particles)?;
    write_jsonl::<LevelSummary>(&paths.levels, &estimate.levels)?;
    Ok(())
}

/// Human summary of an estimate and, when resampling ran, the draw.
pub fn render_summary(estimate: &EvidenceEstimate, draw: Option<&PosteriorDraw>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "log(Z)       = {:.6}", estimate.log_evidence);
    let _ = writeln!(out, "Information  = {:.6} nats", estimate.information);
    if let Some(draw) = draw {
        let _ = writeln!(
            out,
            "ESS          = {:.3} ({} posterior samples)",
            draw.effective_sample_size,
            draw.samples.len()
        );
    }
    let full = estimate.full_record_particles().count();
    let _ = writeln!(
        out,
        "Particles    = {} included ({} full), {} excluded",
        estimate.particles.len(),
        full,
        estimate.excluded
    );
    let _ = writeln!(
        out,
        "Levels       = {} used of {}",
        estimate.levels_used,
        estimate.levels.len()
    );
    out
}

/// Per-level table: boundary, mass, compression and acceptance.
pub fn render_levels(levels: &[LevelSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5}  {:>12}  {:>12}  {:>11}  {:>9}  {:>10}",
        "level", "log(X)", "log(M)", "compression", "particles", "acceptance"
    );
    for level in levels {
        let compression = level
            .compression
            .map(|c| format!("{c:.4}"))
            .unwrap_or_else(|| "-".to_string());
        let particles = level
            .particle_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:>5}  {:>12.4}  {:>12.4}  {:>11}  {:>9}  {:>10.3}",
            level.index,
            level.log_prior_volume,
            level.log_mass,
            compression,
            particles,
            level.acceptance_rate
        );
    }
    out
}
