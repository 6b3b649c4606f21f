//! Record stores.
//!
//! The sampler is a black box that appends level, particle-count and particle
//! records to a store. This module abstracts that store as a restartable
//! source of records, and the posterior collection as a sink that is replaced
//! wholesale on every run.
//!
//! Two implementations ship here:
//! - [`JsonlStore`] / [`JsonlPosteriorSink`]: a run directory of JSON-lines files
//! - [`MemoryStore`]: in-memory, for tests and embedding

pub mod jsonl;
pub mod memory;

pub use jsonl::{JsonlPosteriorSink, JsonlStore};
pub use memory::MemoryStore;

use ns_common::{Level, Particle, ParticleCount, PosteriorSample, Result};
use std::collections::{BTreeSet, HashMap};

/// A lazy, finite sequence of records read from a store.
pub type RecordIter<'a, T> = Box<dyn Iterator<Item = Result<T>> + 'a>;

/// Read access to a sampler run.
///
/// Every call returns a fresh iterator positioned at the start of the
/// snapshot, so a source can be walked more than once.
pub trait RecordSource {
    /// Level records, in storage order.
    fn levels(&self) -> RecordIter<'_, Level>;

    /// Particle-count-per-level records, in storage order.
    fn particle_counts(&self) -> RecordIter<'_, ParticleCount>;

    /// Particle records, in storage order.
    fn particles(&self) -> RecordIter<'_, Particle>;

    /// Highest particle id currently in the store.
    fn max_particle_id(&self) -> Result<Option<u64>> {
        let mut max: Option<u64> = None;
        for particle in self.particles() {
            let id = particle?.id;
            max = Some(max.map_or(id, |m| m.max(id)));
        }
        Ok(max)
    }

    /// Parameter payloads for the given particle ids, in one pass.
    ///
    /// Ids without a full record are absent from the returned map.
    fn fetch_parameters(&self, ids: &BTreeSet<u64>) -> Result<HashMap<u64, Vec<u8>>> {
        let mut found = HashMap::with_capacity(ids.len());
        for particle in self.particles() {
            let particle = particle?;
            if !ids.contains(&particle.id) {
                continue;
            }
            if let Some(parameters) = particle.parameters {
                found.insert(particle.id, parameters);
            }
        }
        Ok(found)
    }
}

/// Write access to a posterior-sample collection.
pub trait PosteriorSink {
    /// Clear any previous contents, then store `samples`.
    fn replace(&mut self, samples: &[PosteriorSample]) -> Result<()>;
}
