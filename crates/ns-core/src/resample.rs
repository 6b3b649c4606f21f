//! Posterior resampling.
//!
//! Turns the weighted full-record particles of an [`EvidenceEstimate`] into an
//! equally-weighted posterior sample by rejection sampling with replacement.
//! The random source is supplied by the caller so a fixed seed reproduces
//! the same output.

use ns_common::{Error, Location, PosteriorSample, Result};
use ns_math::{entropy_ess, normalize_log_weights};
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::evidence::EvidenceEstimate;
use crate::store::{PosteriorSink, RecordSource};

/// Which particles fill the output slots, before payloads are fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResamplePlan {
    /// `exp(entropy)` of the renormalized full-record weights.
    pub effective_sample_size: f64,
    /// Particle id per output slot; repeats are expected.
    pub particle_ids: Vec<u64>,
}

impl ResamplePlan {
    /// Output size, `floor(ESS) + 1`.
    pub fn target(&self) -> usize {
        self.particle_ids.len()
    }
}

/// An equally-weighted posterior sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PosteriorDraw {
    pub effective_sample_size: f64,
    pub samples: Vec<PosteriorSample>,
}

/// Rejection sampler over full-record particles.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosteriorResampler;

impl PosteriorResampler {
    pub fn new() -> Self {
        Self
    }

    /// Decide which particle fills each output slot.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        estimate: &EvidenceEstimate,
        rng: &mut R,
    ) -> Result<ResamplePlan> {
        let (ids, mut weights): (Vec<u64>, Vec<f64>) = estimate
            .full_record_particles()
            .map(|p| (p.id, p.log_posterior_weight))
            .unzip();
        if ids.is_empty() {
            return Err(Error::EmptyInput(
                "no particles with a full parameter record".into(),
            ));
        }

        let log_total = normalize_log_weights(&mut weights);
        if !log_total.is_finite() {
            return Err(Error::EmptyInput(
                "every full-record particle has zero posterior weight".into(),
            ));
        }
        let effective_sample_size = entropy_ess(&weights);
        let target = effective_sample_size.floor() as usize + 1;
        let top = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        debug!(
            candidates = ids.len(),
            log_total,
            effective_sample_size,
            target,
            "resampling full-record particles"
        );

        let mut particle_ids = Vec::with_capacity(target);
        let mut attempts = 0u64;
        while particle_ids.len() < target {
            attempts += 1;
            let k = rng.random_range(0..ids.len());
            let u: f64 = rng.random();
            if u <= (weights[k] - top).exp() {
                particle_ids.push(ids[k]);
            }
        }
        debug!(attempts, accepted = target, "rejection sampling finished");

        Ok(ResamplePlan {
            effective_sample_size,
            particle_ids,
        })
    }

    /// Plan the draw, then fetch the selected payloads in one pass.
    pub fn resample<R: Rng + ?Sized>(
        &self,
        estimate: &EvidenceEstimate,
        source: &dyn RecordSource,
        rng: &mut R,
    ) -> Result<PosteriorDraw> {
        let plan = self.plan(estimate, rng)?;
        let wanted: BTreeSet<u64> = plan.particle_ids.iter().copied().collect();
        let payloads = source.fetch_parameters(&wanted)?;

        let mut samples = Vec::with_capacity(plan.target());
        for (slot, particle_id) in plan.particle_ids.iter().copied().enumerate() {
            let parameters = payloads.get(&particle_id).cloned().ok_or_else(|| {
                Error::data(
                    Location::Particle(particle_id),
                    "particle was estimated as a full record but has no parameters in the store",
                )
            })?;
            samples.push(PosteriorSample {
                id: slot as u64,
                particle_id,
                parameters,
            });
        }

        info!(
            effective_sample_size = plan.effective_sample_size,
            samples = samples.len(),
            distinct = wanted.len(),
            "posterior resampled"
        );
        Ok(PosteriorDraw {
            effective_sample_size: plan.effective_sample_size,
            samples,
        })
    }

    /// Resample and replace the contents of `sink` with the result.
    pub fn resample_into<R: Rng + ?Sized>(
        &self,
        estimate: &EvidenceEstimate,
        source: &dyn RecordSource,
        sink: &mut dyn PosteriorSink,
        rng: &mut R,
    ) -> Result<PosteriorDraw> {
        let draw = self.resample(estimate, source, rng)?;
        sink.replace(&draw.samples)?;
        Ok(draw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceEstimator;
    use crate::store::MemoryStore;
    use ns_common::{Level, Particle};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn store(particles: Vec<Particle>) -> MemoryStore {
        MemoryStore::with_derived_counts(vec![Level::new(0, 0.0)], particles)
    }

    fn estimate(store: &MemoryStore) -> EvidenceEstimate {
        EvidenceEstimator::default().estimate(store).unwrap()
    }

    #[test]
    fn equal_weights_give_ess_equal_to_count() {
        let s = store(
            (1..=8)
                .map(|id| Particle::new(id, 0, 0.0, id as f64).with_parameters(vec![id as u8]))
                .collect(),
        );
        let mut rng = StdRng::seed_from_u64(1);
        let plan = PosteriorResampler::new().plan(&estimate(&s), &mut rng).unwrap();
        assert!((plan.effective_sample_size - 8.0).abs() < 1e-9);
        assert_eq!(plan.target(), 9);
    }

    #[test]
    fn same_seed_same_draw() {
        let s = store(
            (1..=20)
                .map(|id| {
                    Particle::new(id, 0, -(id as f64) * 0.1, 0.0).with_parameters(vec![id as u8])
                })
                .collect(),
        );
        let est = estimate(&s);
        let resampler = PosteriorResampler::new();
        let a = resampler
            .resample(&est, &s, &mut StdRng::seed_from_u64(42))
            .unwrap();
        let b = resampler
            .resample(&est, &s, &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a, b);
        for (slot, sample) in a.samples.iter().enumerate() {
            assert_eq!(sample.id, slot as u64);
            assert_eq!(sample.parameters, vec![sample.particle_id as u8]);
        }
    }

    #[test]
    fn partial_records_are_never_drawn() {
        let s = store(vec![
            Particle::new(1, 0, 10.0, 0.1),
            Particle::new(2, 0, 0.0, 0.2).with_parameters(vec![2]),
            Particle::new(3, 0, 0.0, 0.3).with_parameters(vec![3]),
        ]);
        let draw = PosteriorResampler::new()
            .resample(&estimate(&s), &s, &mut StdRng::seed_from_u64(3))
            .unwrap();
        // Renormalized over the two full records, which weigh the same.
        assert!((draw.effective_sample_size - 2.0).abs() < 1e-9);
        assert_eq!(draw.samples.len(), 3);
        assert!(draw.samples.iter().all(|s| s.particle_id != 1));
    }

    #[test]
    fn dominant_particle_fills_every_slot() {
        let s = store(vec![
            Particle::new(1, 0, f64::NEG_INFINITY, 0.1).with_parameters(vec![1]),
            Particle::new(2, 0, 0.0, 0.2).with_parameters(vec![2]),
        ]);
        let draw = PosteriorResampler::new()
            .resample(&estimate(&s), &s, &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(draw.effective_sample_size, 1.0);
        assert_eq!(draw.samples.len(), 2);
        assert!(draw.samples.iter().all(|s| s.particle_id == 2));
    }

    #[test]
    fn no_full_records_is_empty_input() {
        let s = store(vec![Particle::new(1, 0, 0.0, 0.1)]);
        let err = PosteriorResampler::new()
            .plan(&estimate(&s), &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, Error::EmptyInput(_)));
    }

    #[test]
    fn zero_weight_full_records_are_empty_input() {
        let s = store(vec![
            Particle::new(1, 0, f64::NEG_INFINITY, 0.1).with_parameters(vec![1]),
            Particle::new(2, 0, 0.0, 0.2),
        ]);
        let err = PosteriorResampler::new()
            .plan(&estimate(&s), &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, Error::EmptyInput(_)));
    }

    #[test]
    fn resample_into_replaces_sink() {
        let mut s = store(vec![Particle::new(1, 0, 0.0, 0.1).with_parameters(vec![7])]);
        let est = estimate(&s);
        let source = s.clone();
        let resampler = PosteriorResampler::new();
        for _ in 0..2 {
            resampler
                .resample_into(&est, &source, &mut s, &mut StdRng::seed_from_u64(5))
                .unwrap();
        }
        assert_eq!(s.posterior.len(), 2);
        assert!(s.posterior.iter().all(|p| p.parameters == vec![7]));
    }
}
