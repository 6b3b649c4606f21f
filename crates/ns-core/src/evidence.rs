//! Evidence estimation from level and particle records.
//!
//! Each level `i` encloses prior mass `X_i`; the slab between consecutive
//! boundaries has mass `M_i = X_i - X_{i+1}` (the last level is taken against
//! an empty boundary, so `M_last = X_last`). A level's slab is shared equally
//! among its `particle_count` particles, and each particle is placed at the
//! `(rank + 0.5) / particle_count` quantile of the slab, ranking by
//! `(log_likelihood, tiebreak)` within the level.
//!
//! All arithmetic is in the log domain through [`ns_math`].
//!
//! # Truncation
//!
//! A run may still be in progress, so the level table and the count table
//! can disagree in length. Only the first `min(levels, counts)` levels are
//! used. Particles at or beyond that bound, or with an id above the largest
//! id seen when estimation started, are excluded. This is not an error.

use ns_common::serde_ext::{log_value, opt_log_value};
use ns_common::{Error, Level, Location, Particle, ParticleCount, Result};
use ns_config::PostprocessConfig;
use ns_math::{log_diff_exp, log_sum_exp};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::store::RecordSource;

/// Tunables for one estimation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorOptions {
    /// Log-likelihoods are divided by this before any evidence math.
    pub temperature: f64,
    /// ABC mode: reject this fraction of particles, accept the rest uniformly.
    pub abc_fraction: Option<f64>,
    /// Allowed increase between consecutive level boundaries.
    pub boundary_tolerance: f64,
}

impl Default for EstimatorOptions {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            abc_fraction: None,
            boundary_tolerance: 1e-9,
        }
    }
}

impl From<&PostprocessConfig> for EstimatorOptions {
    fn from(config: &PostprocessConfig) -> Self {
        Self {
            temperature: config.temperature,
            abc_fraction: config.abc_fraction(),
            boundary_tolerance: config.boundary_tolerance,
        }
    }
}

/// A particle with its quadrature placement and posterior weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedParticle {
    pub id: u64,
    pub level: u32,
    /// Position within the level, 0-based, by `(log_likelihood, tiebreak)`.
    pub rank: u64,
    /// `log M_level - ln(particle_count)`.
    #[serde(with = "log_value")]
    pub log_mass: f64,
    /// The likelihood the evidence was computed with (after temperature or
    /// ABC substitution).
    #[serde(with = "log_value")]
    pub log_likelihood: f64,
    /// Implied log prior-volume coordinate of the particle.
    #[serde(with = "log_value")]
    pub log_prior_volume: f64,
    #[serde(with = "log_value")]
    pub log_posterior_weight: f64,
    pub has_full_record: bool,
}

/// Per-level diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSummary {
    pub index: u32,
    #[serde(with = "log_value")]
    pub log_prior_volume: f64,
    #[serde(with = "log_value")]
    pub log_mass: f64,
    /// Absent for levels past the end of the count table.
    pub particle_count: Option<u64>,
    /// Particles from this level that entered the estimate.
    pub particles_included: u64,
    /// `log X_{i+1} - log X_i`; absent for the last level.
    #[serde(with = "opt_log_value")]
    pub compression: Option<f64>,
    pub acceptance_rate: f64,
}

/// Output of one estimation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceEstimate {
    /// ln Z.
    #[serde(with = "log_value")]
    pub log_evidence: f64,
    /// Prior-to-posterior KL divergence, in nats.
    pub information: f64,
    /// Included particles, ordered by `(level, rank)`.
    pub particles: Vec<WeightedParticle>,
    pub levels: Vec<LevelSummary>,
    /// Truncation bound: levels `0..levels_used` contributed.
    pub levels_used: u32,
    pub max_particle_id: u64,
    /// Particles left out by truncation.
    pub excluded: u64,
}

impl EvidenceEstimate {
    /// Particles eligible for posterior resampling.
    pub fn full_record_particles(&self) -> impl Iterator<Item = &WeightedParticle> {
        self.particles.iter().filter(|p| p.has_full_record)
    }

    /// Sum of posterior weights over included particles; 1 up to rounding.
    pub fn total_weight(&self) -> f64 {
        self.particles
            .iter()
            .map(|p| p.log_posterior_weight.exp())
            .sum()
    }
}

/// Particle fields the estimator needs; payloads stay in the store.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: u64,
    level: u32,
    log_likelihood: f64,
    tiebreak: f64,
    has_full_record: bool,
}

impl From<&Particle> for Candidate {
    fn from(p: &Particle) -> Self {
        Self {
            id: p.id,
            level: p.level,
            log_likelihood: p.log_likelihood,
            tiebreak: p.tiebreak,
            has_full_record: p.has_full_record(),
        }
    }
}

fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    a.log_likelihood
        .total_cmp(&b.log_likelihood)
        .then(a.tiebreak.total_cmp(&b.tiebreak))
        .then(a.id.cmp(&b.id))
}

/// Computes log-evidence, posterior weights and information.
#[derive(Debug, Clone, Default)]
pub struct EvidenceEstimator {
    options: EstimatorOptions,
}

impl EvidenceEstimator {
    pub fn new(options: EstimatorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EstimatorOptions {
        &self.options
    }

    /// Estimate from a record store.
    ///
    /// The largest particle id is read first; particles appended after that
    /// point are ignored so the estimate reflects one consistent snapshot.
    pub fn estimate(&self, source: &dyn RecordSource) -> Result<EvidenceEstimate> {
        let max_particle_id = source
            .max_particle_id()?
            .ok_or_else(|| Error::EmptyInput("no particle records".into()))?;
        let levels: Vec<Level> = source.levels().collect::<Result<_>>()?;
        let counts: Vec<ParticleCount> = source.particle_counts().collect::<Result<_>>()?;

        let mut late = 0u64;
        let mut candidates = Vec::new();
        for particle in source.particles() {
            let particle = particle?;
            if particle.id > max_particle_id {
                late += 1;
                continue;
            }
            candidates.push(Candidate::from(&particle));
        }

        let mut estimate = self.compute(levels, counts, candidates, max_particle_id)?;
        estimate.excluded += late;
        Ok(estimate)
    }

    /// Estimate from records already in memory.
    pub fn estimate_records(
        &self,
        levels: &[Level],
        counts: &[ParticleCount],
        particles: &[Particle],
    ) -> Result<EvidenceEstimate> {
        let max_particle_id = particles
            .iter()
            .map(|p| p.id)
            .max()
            .ok_or_else(|| Error::EmptyInput("no particle records".into()))?;
        let candidates = particles.iter().map(Candidate::from).collect();
        self.compute(levels.to_vec(), counts.to_vec(), candidates, max_particle_id)
    }

    fn compute(
        &self,
        mut levels: Vec<Level>,
        mut counts: Vec<ParticleCount>,
        candidates: Vec<Candidate>,
        max_particle_id: u64,
    ) -> Result<EvidenceEstimate> {
        if levels.is_empty() {
            return Err(Error::EmptyInput("no level records".into()));
        }
        if counts.is_empty() {
            return Err(Error::EmptyInput("no particle-count records".into()));
        }

        levels.sort_by_key(|l| l.index);
        counts.sort_by_key(|c| c.index);
        check_contiguous(levels.iter().map(|l| l.index), "level")?;
        check_contiguous(counts.iter().map(|c| c.index), "particle-count")?;

        let boundaries = self.boundaries(&levels)?;
        let masses = level_masses(&boundaries)?;
        let bound = levels.len().min(counts.len());
        debug!(
            levels = levels.len(),
            counts = counts.len(),
            bound,
            "level tables loaded"
        );

        let mut groups: BTreeMap<u32, Vec<Candidate>> = BTreeMap::new();
        let mut excluded = 0u64;
        for candidate in candidates {
            if candidate.id > max_particle_id || candidate.level as usize >= bound {
                excluded += 1;
                continue;
            }
            let logl = candidate.log_likelihood;
            if logl.is_nan() || logl == f64::INFINITY {
                return Err(Error::data(
                    Location::Particle(candidate.id),
                    format!("log-likelihood {logl} is not a valid value"),
                ));
            }
            groups.entry(candidate.level).or_default().push(candidate);
        }
        if excluded > 0 {
            debug!(excluded, bound, "particles outside the usable levels excluded");
        }
        if groups.is_empty() {
            return Err(Error::EmptyInput(format!(
                "no particles below level bound {bound}"
            )));
        }

        let mut particles = Vec::new();
        let mut included_per_level = vec![0u64; levels.len()];
        for (level, mut group) in groups {
            let li = level as usize;
            let count = counts[li].particle_count;
            if count == 0 {
                return Err(Error::data(
                    Location::Level(level),
                    "level holds particles but its particle_count is 0",
                ));
            }
            if group.len() as u64 > count {
                return Err(Error::data(
                    Location::Level(level),
                    format!(
                        "{} particles recorded but particle_count is {}",
                        group.len(),
                        count
                    ),
                ));
            }
            group.sort_by(rank_order);
            included_per_level[li] = group.len() as u64;

            let log_mass = masses[li] - (count as f64).ln();
            for (rank, candidate) in group.into_iter().enumerate() {
                let offset = (rank as f64 + 0.5).ln() + log_mass;
                let log_prior_volume =
                    log_diff_exp(boundaries[li], offset).map_err(|e| Error::NumericDomain {
                        location: Location::Particle(candidate.id),
                        a: e.a,
                        b: e.b,
                    })?;
                particles.push(WeightedParticle {
                    id: candidate.id,
                    level,
                    rank: rank as u64,
                    log_mass,
                    log_likelihood: candidate.log_likelihood / self.options.temperature,
                    log_prior_volume,
                    log_posterior_weight: f64::NEG_INFINITY,
                    has_full_record: candidate.has_full_record,
                });
            }
            debug!(level, particles = included_per_level[li], count, log_mass, "placed level");
        }

        if let Some(fraction) = self.options.abc_fraction {
            apply_abc(&mut particles, fraction);
        }

        let terms: Vec<f64> = particles
            .iter()
            .map(|p| p.log_mass + p.log_likelihood)
            .collect();
        let log_evidence = log_sum_exp(&terms);
        if log_evidence == f64::INFINITY {
            let location = particles
                .iter()
                .zip(&terms)
                .find(|(_, term)| **term == f64::INFINITY)
                .map_or(Location::Run, |(p, _)| Location::Particle(p.id));
            return Err(Error::data(
                location,
                "log Z overflowed: log_mass + log_likelihood exceeds the f64 range",
            ));
        }
        if log_evidence == f64::NEG_INFINITY {
            return Err(Error::data(
                Location::Run,
                "log Z is -inf: every included particle has zero weight",
            ));
        }
        if log_evidence.is_nan() {
            return Err(Error::data(Location::Run, "log Z is NaN"));
        }

        let mut information = 0.0;
        for (particle, term) in particles.iter_mut().zip(&terms) {
            particle.log_posterior_weight = term - log_evidence;
            let p = particle.log_posterior_weight.exp();
            if p > 0.0 {
                information += p * (particle.log_likelihood - log_evidence);
            }
        }

        let levels = summarize_levels(&levels, &boundaries, &masses, &counts, &included_per_level);
        info!(
            log_evidence,
            information,
            included = particles.len(),
            excluded,
            levels_used = bound,
            "evidence estimated"
        );

        Ok(EvidenceEstimate {
            log_evidence,
            information,
            particles,
            levels,
            levels_used: bound as u32,
            max_particle_id,
            excluded,
        })
    }

    /// Per-level diagnostics from the level and count tables alone.
    ///
    /// Works on a run that has no particles yet. `particles_included` counts
    /// the particles recorded at each level below the count-table bound.
    pub fn level_summaries(&self, source: &dyn RecordSource) -> Result<Vec<LevelSummary>> {
        let mut levels: Vec<Level> = source.levels().collect::<Result<_>>()?;
        let mut counts: Vec<ParticleCount> = source.particle_counts().collect::<Result<_>>()?;
        if levels.is_empty() {
            return Err(Error::EmptyInput("no level records".into()));
        }

        levels.sort_by_key(|l| l.index);
        counts.sort_by_key(|c| c.index);
        check_contiguous(levels.iter().map(|l| l.index), "level")?;
        check_contiguous(counts.iter().map(|c| c.index), "particle-count")?;

        let boundaries = self.boundaries(&levels)?;
        let masses = level_masses(&boundaries)?;
        let bound = levels.len().min(counts.len());
        let mut recorded = vec![0u64; levels.len()];
        for particle in source.particles() {
            let level = particle?.level as usize;
            if level < bound {
                recorded[level] += 1;
            }
        }
        Ok(summarize_levels(&levels, &boundaries, &masses, &counts, &recorded))
    }

    /// Level boundaries, checked for monotonicity.
    ///
    /// Increases within tolerance are clamped, leaving a zero-mass level.
    fn boundaries(&self, levels: &[Level]) -> Result<Vec<f64>> {
        let tolerance = self.options.boundary_tolerance;
        let mut out: Vec<f64> = Vec::with_capacity(levels.len());
        for level in levels {
            let x = level.log_prior_volume;
            if x.is_nan() || x == f64::INFINITY {
                return Err(Error::data(
                    Location::Level(level.index),
                    format!("log prior volume {x} is not a valid boundary"),
                ));
            }
            let x = match out.last() {
                Some(&prev) if x > prev + tolerance => {
                    return Err(Error::data(
                        Location::Level(level.index),
                        format!("log prior volume increases from {prev} to {x}"),
                    ));
                }
                Some(&prev) if x > prev => prev,
                _ => x,
            };
            out.push(x);
        }
        Ok(out)
    }
}

fn check_contiguous(indices: impl Iterator<Item = u32>, table: &str) -> Result<()> {
    for (expected, index) in indices.enumerate() {
        let expected = expected as u32;
        if index != expected {
            let what = if index < expected { "duplicate" } else { "missing" };
            let at = if index < expected { index } else { expected };
            return Err(Error::data(
                Location::Level(at),
                format!("{what} {table} record"),
            ));
        }
    }
    Ok(())
}

/// `log M_i` for every level; the last is measured against an empty boundary.
fn level_masses(boundaries: &[f64]) -> Result<Vec<f64>> {
    let mut masses = Vec::with_capacity(boundaries.len());
    for (i, &x) in boundaries.iter().enumerate() {
        let next = boundaries.get(i + 1).copied().unwrap_or(f64::NEG_INFINITY);
        let mass = log_diff_exp(x, next).map_err(|e| Error::NumericDomain {
            location: Location::Level(i as u32),
            a: e.a,
            b: e.b,
        })?;
        masses.push(mass);
    }
    Ok(masses)
}

/// Replace likelihoods for ABC: the lowest `fraction` of particles (in
/// level/rank order) get zero likelihood and the rest get `-log_mass`, which
/// spreads the posterior uniformly over the retained prior mass.
fn apply_abc(particles: &mut [WeightedParticle], fraction: f64) {
    let cutoff = fraction * particles.len() as f64;
    for (i, particle) in particles.iter_mut().enumerate() {
        particle.log_likelihood = if (i as f64) < cutoff || particle.log_mass == f64::NEG_INFINITY {
            f64::NEG_INFINITY
        } else {
            -particle.log_mass
        };
    }
}

fn summarize_levels(
    levels: &[Level],
    boundaries: &[f64],
    masses: &[f64],
    counts: &[ParticleCount],
    included: &[u64],
) -> Vec<LevelSummary> {
    levels
        .iter()
        .enumerate()
        .map(|(i, level)| LevelSummary {
            index: level.index,
            log_prior_volume: boundaries[i],
            log_mass: masses[i],
            particle_count: counts.get(i).map(|c| c.particle_count),
            particles_included: included[i],
            compression: boundaries.get(i + 1).map(|next| next - boundaries[i]),
            acceptance_rate: level.acceptance_rate(),
        })
        .collect()
}
