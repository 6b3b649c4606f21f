//! Nested-sampling postprocessing core library.
//!
//! Turns the level and particle records of a diffusive nested-sampling run
//! into an evidence estimate and an equally-weighted posterior sample:
//! - Record stores (JSONL run directories, in-memory)
//! - Evidence estimation with per-particle prior-volume placement
//! - Seeded rejection resampling of full-record particles
//! - Results and diagnostics files
//!
//! The binary entry point is in `main.rs`.

pub mod evidence;
pub mod exit_codes;
pub mod logging;
pub mod postprocess;
pub mod report;
pub mod resample;
pub mod store;

pub use evidence::{
    EstimatorOptions, EvidenceEstimate, EvidenceEstimator, LevelSummary, WeightedParticle,
};
pub use postprocess::{postprocess_run_dir, run_postprocess, PostprocessOutcome};
pub use report::{OutputPaths, RunResults};
pub use resample::{PosteriorDraw, PosteriorResampler, ResamplePlan};
pub use store::{JsonlPosteriorSink, JsonlStore, MemoryStore, PosteriorSink, RecordSource};
