//! Exit codes for the `ns-post` CLI.
//!
//! Exit codes communicate the outcome without requiring output parsing and
//! are a stable contract for scripts.
//!
//! Exit code ranges:
//! - 0: success
//! - 10-19: problems with the arguments, configuration or sampler output
//! - 20-29: internal and I/O errors

use ns_common::Error;

/// Exit codes for `ns-post`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Clean = 0,

    // ========================================================================
    // User / Input Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Configuration file missing, malformed or invalid
    ConfigError = 11,

    /// Sampler output contradicts itself
    DataError = 12,

    /// Log-space arithmetic outside its domain
    NumericError = 13,

    /// Nothing to postprocess yet
    EmptyInput = 14,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error, including malformed store files
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Check if this exit code is a user/input error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Check if this exit code is an internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::DataError => "ERR_DATA",
            ExitCode::NumericError => "ERR_NUMERIC",
            ExitCode::EmptyInput => "ERR_EMPTY",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::Config(_) => ExitCode::ConfigError,
            Error::DataInconsistency { .. } => ExitCode::DataError,
            Error::NumericDomain { .. } => ExitCode::NumericError,
            Error::EmptyInput(_) => ExitCode::EmptyInput,
            Error::Io { .. } | Error::InvalidRecord { .. } => ExitCode::IoError,
            Error::Json(_) | Error::Yaml(_) => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
