//! Records exchanged with the sampler's store and the posterior store.
//!
//! Level, particle-count and particle records are written by the external
//! sampler and are read-only here. Posterior samples are the only records
//! this workspace writes.

use crate::serde_ext::{base64_bytes, log_value, opt_base64_bytes};
use serde::{Deserialize, Serialize};

/// One nested-sampling constraint boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Order of discovery, starting at 0.
    pub index: u32,
    /// log X: log of the prior mass enclosed by this level's constraint.
    #[serde(with = "log_value")]
    pub log_prior_volume: f64,
    #[serde(default)]
    pub accepts: u64,
    #[serde(default)]
    pub tries: u64,
}

impl Level {
    pub fn new(index: u32, log_prior_volume: f64) -> Self {
        Self {
            index,
            log_prior_volume,
            accepts: 0,
            tries: 0,
        }
    }

    /// Smoothed Metropolis acceptance rate, `(accepts + 0.5) / (tries + 1)`.
    pub fn acceptance_rate(&self) -> f64 {
        (self.accepts as f64 + 0.5) / (self.tries as f64 + 1.0)
    }
}

/// Number of particles that belong to a level for quadrature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticleCount {
    pub index: u32,
    pub particle_count: u64,
}

/// A posterior-sample candidate recorded during exploration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Assigned monotonically by the sampler; doubles as an order key.
    pub id: u64,
    /// Highest level at which the particle was active.
    pub level: u32,
    #[serde(with = "log_value")]
    pub log_likelihood: f64,
    /// Breaks ties between equal likelihoods within a level.
    pub tiebreak: f64,
    /// Full parameter payload. Only some particles are saved in full.
    #[serde(default, with = "opt_base64_bytes", skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<u8>>,
}

impl Particle {
    pub fn new(id: u64, level: u32, log_likelihood: f64, tiebreak: f64) -> Self {
        Self {
            id,
            level,
            log_likelihood,
            tiebreak,
            parameters: None,
        }
    }

    pub fn with_parameters(mut self, parameters: impl Into<Vec<u8>>) -> Self {
        self.parameters = Some(parameters.into());
        self
    }

    /// Whether the particle is eligible for posterior resampling.
    pub fn has_full_record(&self) -> bool {
        self.parameters.is_some()
    }
}

/// An equally-weighted posterior draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosteriorSample {
    /// Output slot; primary key of the posterior collection.
    pub id: u64,
    /// The particle that was drawn. Repeats across slots are expected.
    pub particle_id: u64,
    #[serde(with = "base64_bytes")]
    pub parameters: Vec<u8>,
}
