//! Nested-sampling postprocessing configuration.
//!
//! This crate provides:
//! - The typed `postprocess.json` settings
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation
//! - Config snapshots embedded in results files

pub mod resolve;
pub mod settings;
pub mod snapshot;
pub mod validate;

pub use resolve::{resolve_config, ConfigPath, ConfigSource};
pub use settings::{AbcConfig, OutputConfig, PostprocessConfig};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Load, validate and snapshot the configuration in one step.
///
/// `cli_path` is an explicit `--config` argument; when no file is found
/// anywhere the built-in defaults are used.
pub fn load_config(
    cli_path: Option<&std::path::Path>,
) -> ValidationResult<(PostprocessConfig, ConfigSnapshot)> {
    let resolved = resolve_config(cli_path);
    match &resolved.path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| ValidationError::IoError(format!("{}: {}", path.display(), e)))?;
            let config = PostprocessConfig::from_json(&content)?;
            validate_config(&config)?;
            let snapshot = ConfigSnapshot::new(&config, &resolved, Some(&content));
            Ok((config, snapshot))
        }
        None => {
            let config = PostprocessConfig::default();
            let snapshot = ConfigSnapshot::new(&config, &resolved, None);
            Ok((config, snapshot))
        }
    }
}
