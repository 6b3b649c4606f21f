//! Criterion benchmarks for a full estimate + resample pass over a synthetic
//! in-memory run.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ns_common::{Level, Particle};
use ns_core::{EvidenceEstimator, MemoryStore, PosteriorResampler};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn synthetic_run(n_levels: u32, per_level: u64) -> MemoryStore {
    let levels = (0..n_levels)
        .map(|i| Level::new(i, -(i as f64)))
        .collect();
    let mut particles = Vec::new();
    let mut id = 0u64;
    for level in 0..n_levels {
        for k in 0..per_level {
            id += 1;
            let logl = level as f64 * 2.0 + (k as f64 / per_level as f64);
            let mut p = Particle::new(id, level, logl, (id % 1009) as f64 / 1009.0);
            if id % 10 == 0 {
                p = p.with_parameters(vec![0u8; 64]);
            }
            particles.push(p);
        }
    }
    MemoryStore::with_derived_counts(levels, particles)
}

fn bench_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("postprocess");

    for (n_levels, per_level) in [(20u32, 500u64), (100, 1_000)] {
        let store = synthetic_run(n_levels, per_level);
        let size = n_levels as u64 * per_level;

        group.bench_with_input(BenchmarkId::new("estimate", size), &store, |b, s| {
            let estimator = EvidenceEstimator::default();
            b.iter(|| black_box(estimator.estimate(s).unwrap()));
        });

        let estimate = EvidenceEstimator::default().estimate(&store).unwrap();
        group.bench_with_input(BenchmarkId::new("resample", size), &store, |b, s| {
            let resampler = PosteriorResampler::new();
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(0);
                black_box(resampler.resample(&estimate, s, &mut rng).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_estimate);
criterion_main!(benches);
