//! Error types for nested-sampling postprocessing.
//!
//! Every estimation failure is terminal for the current pass: the input is a
//! static snapshot of the sampler's output, so retrying reproduces the same
//! error. Errors therefore carry the offending level index or particle id
//! instead of retry hints.
//!
//! # Codes
//!
//! - 10-19: configuration
//! - 30-39: estimation (data, numeric, empty input)
//! - 60-69: I/O and serialization

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for postprocessing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Where in the record store an error was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Location {
    /// The run as a whole (no single record is to blame).
    Run,
    /// A level, by index.
    Level(u32),
    /// A particle, by id.
    Particle(u64),
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Run => write!(f, "run"),
            Location::Level(index) => write!(f, "level {}", index),
            Location::Particle(id) => write!(f, "particle {}", id),
        }
    }
}

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Records that contradict each other or the level structure.
    Data,
    /// Log-space arithmetic outside its domain.
    Numeric,
    /// Nothing to estimate from.
    Input,
    /// Configuration file errors.
    Config,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Data => write!(f, "data"),
            ErrorCategory::Numeric => write!(f, "numeric"),
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for postprocessing.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    // Estimation errors (30-39)
    #[error("data inconsistency at {location}: {message}")]
    DataInconsistency { location: Location, message: String },

    #[error("numeric domain error at {location}: log_diff_exp({a}, {b}) requires a >= b")]
    NumericDomain { location: Location, a: f64, b: f64 },

    #[error("empty input: {0}")]
    EmptyInput(String),

    // I/O errors (60-69)
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid record at {path}:{line}: {message}")]
    InvalidRecord {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Shorthand for a [`Error::DataInconsistency`].
    pub fn data(location: Location, message: impl Into<String>) -> Self {
        Error::DataInconsistency {
            location,
            message: message.into(),
        }
    }

    /// Shorthand for an [`Error::Io`] tied to a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the stable error code for this error.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::DataInconsistency { .. } => 30,
            Error::NumericDomain { .. } => 31,
            Error::EmptyInput(_) => 32,
            Error::Io { .. } => 60,
            Error::InvalidRecord { .. } => 61,
            Error::Json(_) => 62,
            Error::Yaml(_) => 63,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Config,
            Error::DataInconsistency { .. } => ErrorCategory::Data,
            Error::NumericDomain { .. } => ErrorCategory::Numeric,
            Error::EmptyInput(_) => ErrorCategory::Input,
            Error::Io { .. } | Error::InvalidRecord { .. } | Error::Json(_) | Error::Yaml(_) => {
                ErrorCategory::Io
            }
        }
    }

    /// Returns whether rerunning could plausibly succeed.
    ///
    /// Estimation errors never are: the input snapshot does not change.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::DataInconsistency { .. } | Error::NumericDomain { .. } | Error::EmptyInput(_) => {
                false
            }
            Error::Io { .. } => true,
            Error::InvalidRecord { .. } | Error::Json(_) | Error::Yaml(_) => false,
        }
    }

    /// The record the error points at, when there is one.
    pub fn location(&self) -> Option<Location> {
        match self {
            Error::DataInconsistency { location, .. } | Error::NumericDomain { location, .. } => {
                Some(*location)
            }
            _ => None,
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::DataInconsistency { .. } => "Inconsistent Sampler Output",
            Error::NumericDomain { .. } => "Numeric Domain Error",
            Error::EmptyInput(_) => "Nothing To Postprocess",
            Error::Io { .. } => "I/O Error",
            Error::InvalidRecord { .. } => "Malformed Record",
            Error::Json(_) => "JSON Error",
            Error::Yaml(_) => "YAML Error",
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => "Check postprocess.json against the documented fields and ranges.",
            Error::DataInconsistency { .. } => {
                "The sampler output contradicts itself. Inspect the named level or particle in the run directory."
            }
            Error::NumericDomain { .. } => {
                "A level boundary or particle placement implies negative prior mass. Inspect the named record."
            }
            Error::EmptyInput(_) => {
                "Let the sampler run longer, or point --run-dir at a directory with levels and particles."
            }
            Error::Io { .. } => "Check that the path exists and is readable/writable.",
            Error::InvalidRecord { .. } => "Fix or remove the malformed line; each line must be one JSON object.",
            Error::Json(_) | Error::Yaml(_) => "Report this as a bug with the offending input.",
        }
    }
}
