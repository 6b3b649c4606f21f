//! End-to-end evidence scenarios against hand-computed references.

use ns_common::{Error, Level, Location, Particle, ParticleCount};
use ns_core::{EvidenceEstimator, JsonlStore, MemoryStore};
use ns_math::{log_diff_exp, log_sum_exp};

fn levels(log_xs: &[f64]) -> Vec<Level> {
    log_xs
        .iter()
        .enumerate()
        .map(|(i, &x)| Level::new(i as u32, x))
        .collect()
}

fn counts(values: &[u64]) -> Vec<ParticleCount> {
    values
        .iter()
        .enumerate()
        .map(|(i, &n)| ParticleCount {
            index: i as u32,
            particle_count: n,
        })
        .collect()
}

fn uniform_particles(per_level: &[u64], logl: f64) -> Vec<Particle> {
    let mut out = Vec::new();
    let mut id = 0;
    for (level, &n) in per_level.iter().enumerate() {
        for k in 0..n {
            id += 1;
            out.push(
                Particle::new(id, level as u32, logl, (k as f64 + 0.5) / n as f64)
                    .with_parameters(id.to_le_bytes().to_vec()),
            );
        }
    }
    out
}

#[test]
fn three_levels_flat_likelihood() {
    let store = MemoryStore::new(
        levels(&[0.0, -1.0, -3.0]),
        counts(&[10, 10, 10]),
        uniform_particles(&[10, 10, 10], 0.0),
    );
    let est = EvidenceEstimator::default().estimate(&store).unwrap();

    let ln10 = 10f64.ln();
    let level_masses = [
        log_diff_exp(0.0, -1.0).unwrap(),
        log_diff_exp(-1.0, -3.0).unwrap(),
        log_diff_exp(-3.0, f64::NEG_INFINITY).unwrap(),
    ];
    let terms: Vec<f64> = level_masses
        .iter()
        .flat_map(|m| std::iter::repeat(m - ln10).take(10))
        .collect();
    let reference = log_sum_exp(&terms);

    assert!((est.log_evidence - reference).abs() < 1e-9);
    let total: f64 = est.particles.iter().map(|p| p.log_posterior_weight.exp()).sum();
    assert!((total - 1.0).abs() < 1e-9);
    // Flat likelihood: posterior equals prior, so no information gained.
    assert!(est.information.abs() < 1e-9);
}

#[test]
fn single_particle_single_level() {
    let store = MemoryStore::new(
        levels(&[0.0]),
        counts(&[1]),
        vec![Particle::new(1, 0, 5.0, 0.3)],
    );
    let est = EvidenceEstimator::default().estimate(&store).unwrap();
    assert_eq!(est.log_evidence, 5.0);
    assert_eq!(est.information, 0.0);
}

#[test]
fn non_monotonic_levels_are_data_inconsistency() {
    let store = MemoryStore::new(
        levels(&[0.0, -1.0, -0.5]),
        counts(&[1, 1, 1]),
        uniform_particles(&[1, 1, 1], 0.0),
    );
    let err = EvidenceEstimator::default().estimate(&store).unwrap_err();
    assert!(matches!(err, Error::DataInconsistency { .. }));
    assert_eq!(err.location(), Some(Location::Level(2)));
}

#[test]
fn run_directory_matches_memory_store() {
    let dir = tempfile::tempdir().unwrap();
    let lv = levels(&[0.0, -0.75, -1.875, -3.25]);
    let ct = counts(&[5, 4, 3, 2]);
    let mut particles = Vec::new();
    let mut id = 0;
    for (level, n) in [5u64, 4, 3, 2].into_iter().enumerate() {
        for k in 0..n {
            id += 1;
            let logl = level as f64 + k as f64 * 0.25;
            particles.push(Particle::new(id, level as u32, logl, 0.125 * k as f64));
        }
    }

    let jsonl = JsonlStore::create(dir.path(), &lv, &ct, &particles).unwrap();
    let memory = MemoryStore::new(lv, ct, particles);

    let a = EvidenceEstimator::default().estimate(&jsonl).unwrap();
    let b = EvidenceEstimator::default().estimate(&memory).unwrap();
    assert_eq!(a, b);
}

#[test]
fn in_progress_run_is_truncated_not_rejected() {
    // The sampler has written a fourth level but not its particle count.
    let store = MemoryStore::new(
        levels(&[0.0, -1.0, -2.0, -3.0]),
        counts(&[3, 3, 3]),
        uniform_particles(&[3, 3, 3, 1], -1.0),
    );
    let est = EvidenceEstimator::default().estimate(&store).unwrap();
    assert_eq!(est.levels_used, 3);
    assert_eq!(est.excluded, 1);
    assert_eq!(est.particles.len(), 9);
}
