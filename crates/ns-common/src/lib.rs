//! Nested-sampling postprocessing common types and errors.
//!
//! This crate provides foundational types shared across ns-core modules:
//! - Level, particle-count and particle records produced by the sampler
//! - Posterior sample records produced by resampling
//! - The unified error type with stable codes
//! - Serde helpers for non-finite log values and binary payloads

pub mod error;
pub mod record;
pub mod serde_ext;

pub use error::{Error, ErrorCategory, Location, Result};
pub use record::{Level, Particle, ParticleCount, PosteriorSample};
