//! In-memory record store.

use super::{PosteriorSink, RecordIter, RecordSource};
use ns_common::{Level, Particle, ParticleCount, PosteriorSample, Result};
use std::collections::BTreeMap;

/// Holds a whole run (and its posterior collection) in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub levels: Vec<Level>,
    pub particle_counts: Vec<ParticleCount>,
    pub particles: Vec<Particle>,
    pub posterior: Vec<PosteriorSample>,
}

impl MemoryStore {
    pub fn new(
        levels: Vec<Level>,
        particle_counts: Vec<ParticleCount>,
        particles: Vec<Particle>,
    ) -> Self {
        Self {
            levels,
            particle_counts,
            particles,
            posterior: Vec::new(),
        }
    }

    /// Build a store whose particle counts are the number of particles
    /// recorded at each level (zero for levels nobody reached).
    pub fn with_derived_counts(levels: Vec<Level>, particles: Vec<Particle>) -> Self {
        let particle_counts = derive_counts(&levels, &particles);
        Self::new(levels, particle_counts, particles)
    }
}

/// Count particles per level for every level index in `levels`.
pub fn derive_counts(levels: &[Level], particles: &[Particle]) -> Vec<ParticleCount> {
    let mut per_level: BTreeMap<u32, u64> = levels.iter().map(|l| (l.index, 0)).collect();
    for particle in particles {
        if let Some(count) = per_level.get_mut(&particle.level) {
            *count += 1;
        }
    }
    per_level
        .into_iter()
        .map(|(index, particle_count)| ParticleCount {
            index,
            particle_count,
        })
        .collect()
}

impl RecordSource for MemoryStore {
    fn levels(&self) -> RecordIter<'_, Level> {
        Box::new(self.levels.iter().cloned().map(Ok))
    }

    fn particle_counts(&self) -> RecordIter<'_, ParticleCount> {
        Box::new(self.particle_counts.iter().copied().map(Ok))
    }

    fn particles(&self) -> RecordIter<'_, Particle> {
        Box::new(self.particles.iter().cloned().map(Ok))
    }
}

impl PosteriorSink for MemoryStore {
    fn replace(&mut self, samples: &[PosteriorSample]) -> Result<()> {
        self.posterior = samples.to_vec();
        Ok(())
    }
}
