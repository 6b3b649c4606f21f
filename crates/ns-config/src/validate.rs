//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::settings::PostprocessConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

fn invalid(field: &str, message: String) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message,
    }
}

/// Validate postprocessing settings semantically.
pub fn validate_config(config: &PostprocessConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    if !config.temperature.is_finite() || config.temperature <= 0.0 {
        return Err(invalid(
            "temperature",
            format!("Must be finite and > 0, got {}", config.temperature),
        ));
    }

    if let Some(abc) = config.abc {
        if !(0.0..1.0).contains(&abc.fraction) {
            return Err(invalid(
                "abc.fraction",
                format!("Must be in [0, 1), got {}", abc.fraction),
            ));
        }
    }

    if !config.boundary_tolerance.is_finite() || config.boundary_tolerance < 0.0 {
        return Err(invalid(
            "boundary_tolerance",
            format!("Must be finite and >= 0, got {}", config.boundary_tolerance),
        ));
    }

    let output = &config.output;
    let names = [
        ("output.posterior_file", &output.posterior_file),
        ("output.results_file", &output.results_file),
        ("output.diagnostics_file", &output.diagnostics_file),
        ("output.levels_file", &output.levels_file),
    ];
    for (i, (field, name)) in names.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(invalid(field, "Must not be empty".to_string()));
        }
        if names[..i].iter().any(|(_, other)| other == name) {
            return Err(invalid(field, format!("Duplicates another output file: {}", name)));
        }
    }

    Ok(())
}
