//! Nested-sampling math utilities.

pub mod math;

pub use math::stable::*;
pub use math::weights::*;
