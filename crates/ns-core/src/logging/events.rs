//! Stage and event names shared by log events.

use serde::{Deserialize, Serialize};

/// Phases of a postprocessing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Opening the record store.
    Load,
    /// Evidence estimation.
    Estimate,
    /// Posterior resampling.
    Resample,
    /// Writing results and diagnostics.
    Write,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Load => "load",
            Stage::Estimate => "estimate",
            Stage::Resample => "resample",
            Stage::Write => "write",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names, carried in the `event` field of log events.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";
    pub const RUN_FAILED: &str = "run.failed";

    // Config
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";

    // Output
    pub const OUTPUT_WRITTEN: &str = "output.written";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_serialization_matches_display() {
        for stage in [
            Stage::Init,
            Stage::Load,
            Stage::Estimate,
            Stage::Resample,
            Stage::Write,
        ] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }
}
