//! Fuzz target for the evidence estimator.
//!
//! Arbitrary level boundaries, counts and particles must produce either an
//! estimate or an error, never a panic.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ns_common::{Level, Particle, ParticleCount};
use ns_core::EvidenceEstimator;

#[derive(Debug, Arbitrary)]
struct Run {
    log_xs: Vec<f64>,
    counts: Vec<u8>,
    particles: Vec<(u32, u8, f64, f64, bool)>,
}

fuzz_target!(|run: Run| {
    let levels: Vec<Level> = run
        .log_xs
        .iter()
        .take(64)
        .enumerate()
        .map(|(i, &x)| Level::new(i as u32, x))
        .collect();
    let counts: Vec<ParticleCount> = run
        .counts
        .iter()
        .take(64)
        .enumerate()
        .map(|(i, &n)| ParticleCount {
            index: i as u32,
            particle_count: n as u64,
        })
        .collect();
    let particles: Vec<Particle> = run
        .particles
        .iter()
        .take(1024)
        .map(|&(id, level, logl, tiebreak, full)| {
            let p = Particle::new(id as u64, level as u32, logl, tiebreak);
            if full {
                p.with_parameters(vec![level])
            } else {
                p
            }
        })
        .collect();

    if let Ok(estimate) = EvidenceEstimator::default().estimate_records(&levels, &counts, &particles) {
        assert!(estimate.log_evidence.is_finite());
    }
});
