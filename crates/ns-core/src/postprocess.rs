//! One full postprocessing pass: estimate, resample, write.

use ns_common::{Error, Result};
use ns_config::{ConfigSnapshot, PostprocessConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::{info, info_span};

use crate::evidence::{EstimatorOptions, EvidenceEstimate, EvidenceEstimator};
use crate::logging::{event_names, Stage};
use crate::report::{write_diagnostics, write_results, OutputPaths, RunResults};
use crate::resample::{PosteriorDraw, PosteriorResampler};
use crate::store::jsonl::{LEVELS_FILE, PARTICLES_FILE, PARTICLE_COUNTS_FILE};
use crate::store::{JsonlPosteriorSink, JsonlStore, PosteriorSink, RecordSource};

/// Everything a pass produced.
#[derive(Debug, Clone)]
pub struct PostprocessOutcome {
    pub estimate: EvidenceEstimate,
    pub draw: PosteriorDraw,
    pub results: RunResults,
}

/// Estimate the evidence from `source` and replace `sink` with a posterior
/// sample drawn with `config.seed`.
pub fn run_postprocess(
    config: &PostprocessConfig,
    snapshot: &ConfigSnapshot,
    source: &dyn RecordSource,
    sink: &mut dyn PosteriorSink,
) -> Result<PostprocessOutcome> {
    let estimate = {
        let _span = info_span!("stage", stage = %Stage::Estimate).entered();
        EvidenceEstimator::new(EstimatorOptions::from(config)).estimate(source)?
    };

    let draw = {
        let _span = info_span!("stage", stage = %Stage::Resample).entered();
        let mut rng = StdRng::seed_from_u64(config.seed);
        PosteriorResampler::new().resample_into(&estimate, source, sink, &mut rng)?
    };

    let results = RunResults::new(&estimate, &draw, config, snapshot);
    Ok(PostprocessOutcome {
        estimate,
        draw,
        results,
    })
}

/// Postprocess a JSON-lines run directory and write every output file into
/// `out_dir`.
pub fn postprocess_run_dir(
    config: &PostprocessConfig,
    snapshot: &ConfigSnapshot,
    run_dir: &Path,
    out_dir: &Path,
) -> Result<(PostprocessOutcome, OutputPaths)> {
    let store = {
        let _span = info_span!("stage", stage = %Stage::Load).entered();
        JsonlStore::open(run_dir)?
    };
    let paths = OutputPaths::new(out_dir, &config.output);
    check_outputs_spare_inputs(run_dir, &paths)?;
    let mut sink = JsonlPosteriorSink::new(&paths.posterior);

    let outcome = run_postprocess(config, snapshot, &store, &mut sink)?;

    let _span = info_span!("stage", stage = %Stage::Write).entered();
    write_results(&paths.results, &outcome.results)?;
    write_diagnostics(&paths, &outcome.estimate)?;
    info!(
        event = event_names::OUTPUT_WRITTEN,
        posterior = %paths.posterior.display(),
        results = %paths.results.display(),
        samples = outcome.draw.samples.len(),
        "outputs written"
    );
    Ok((outcome, paths))
}

/// Refuse output paths that would land on one of the run's input tables.
fn check_outputs_spare_inputs(run_dir: &Path, paths: &OutputPaths) -> Result<()> {
    let run_dir = run_dir
        .canonicalize()
        .map_err(|e| Error::io(run_dir, e))?;
    let outputs = [
        &paths.posterior,
        &paths.results,
        &paths.particles,
        &paths.levels,
    ];
    for output in outputs {
        let Some(resolved) = resolve_output(output) else {
            continue;
        };
        let hit = [LEVELS_FILE, PARTICLE_COUNTS_FILE, PARTICLES_FILE]
            .iter()
            .any(|table| resolved == run_dir.join(table));
        if hit {
            return Err(Error::Config(format!(
                "output {} would overwrite an input table of the run",
                output.display()
            )));
        }
    }
    Ok(())
}

/// Canonical location of an output file whose directory already exists.
fn resolve_output(output: &Path) -> Option<PathBuf> {
    let name = output.file_name()?;
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Some(parent.canonicalize().ok()?.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use ns_common::{Error, Level, Particle};

    fn run() -> MemoryStore {
        let particles = (1..=12)
            .map(|id| {
                let level = ((id - 1) / 4) as u32;
                Particle::new(id, level, -(id as f64) / 4.0, 0.0).with_parameters(vec![id as u8])
            })
            .collect();
        MemoryStore::with_derived_counts(
            vec![Level::new(0, 0.0), Level::new(1, -1.0), Level::new(2, -2.0)],
            particles,
        )
    }

    #[test]
    fn pass_fills_sink_and_results() {
        let source = run();
        let mut sink = MemoryStore::default();
        let config = PostprocessConfig::default();
        let outcome = run_postprocess(
            &config,
            &ConfigSnapshot::defaults_only(),
            &source,
            &mut sink,
        )
        .unwrap();

        assert_eq!(sink.posterior, outcome.draw.samples);
        assert_eq!(
            outcome.results.posterior_samples,
            outcome.draw.effective_sample_size.floor() as u64 + 1
        );
        assert_eq!(outcome.results.particles_included, 12);
        assert_eq!(outcome.results.seed, 0);
    }

    #[test]
    fn rerun_with_same_seed_is_identical() {
        let source = run();
        let config = PostprocessConfig {
            seed: 17,
            ..Default::default()
        };
        let snapshot = ConfigSnapshot::defaults_only();
        let mut first = MemoryStore::default();
        let mut second = MemoryStore::default();
        run_postprocess(&config, &snapshot, &source, &mut first).unwrap();
        run_postprocess(&config, &snapshot, &source, &mut second).unwrap();
        assert_eq!(first.posterior, second.posterior);
    }

    #[test]
    fn empty_run_directory_is_empty_input() {
        let run_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let err = postprocess_run_dir(
            &PostprocessConfig::default(),
            &ConfigSnapshot::defaults_only(),
            run_dir.path(),
            out_dir.path(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::EmptyInput(_)));
        assert!(!out_dir.path().join("posterior.jsonl").exists());
    }

    #[test]
    fn outputs_named_like_input_tables_are_refused_in_the_run_dir() {
        let run_dir = tempfile::tempdir().unwrap();
        let source = run();
        JsonlStore::create(
            run_dir.path(),
            &source.levels,
            &source.particle_counts,
            &source.particles,
        )
        .unwrap();
        let before = std::fs::read(run_dir.path().join(PARTICLES_FILE)).unwrap();

        let mut config = PostprocessConfig::default();
        config.output.diagnostics_file = PARTICLES_FILE.to_string();
        let err = postprocess_run_dir(
            &config,
            &ConfigSnapshot::defaults_only(),
            run_dir.path(),
            run_dir.path(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err}");
        assert_eq!(
            std::fs::read(run_dir.path().join(PARTICLES_FILE)).unwrap(),
            before
        );
        assert!(!run_dir.path().join("posterior.jsonl").exists());
    }

    #[test]
    fn input_table_names_are_fine_in_another_directory() {
        let run_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let source = run();
        JsonlStore::create(
            run_dir.path(),
            &source.levels,
            &source.particle_counts,
            &source.particles,
        )
        .unwrap();

        let mut config = PostprocessConfig::default();
        config.output.diagnostics_file = PARTICLES_FILE.to_string();
        config.output.levels_file = LEVELS_FILE.to_string();
        let (_, paths) = postprocess_run_dir(
            &config,
            &ConfigSnapshot::defaults_only(),
            run_dir.path(),
            out_dir.path(),
        )
        .unwrap();
        assert_eq!(paths.particles, out_dir.path().join(PARTICLES_FILE));
        assert!(paths.particles.exists());
    }
}
