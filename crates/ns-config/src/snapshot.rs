//! Configuration snapshots for results files and reproducibility.
//!
//! A snapshot captures the configuration a postprocessing pass ran with, so a
//! results file can be traced back to the exact settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::resolve::ConfigPath;
use crate::settings::PostprocessConfig;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// Path the configuration was loaded from.
    #[serde(default)]
    pub path: Option<String>,

    /// Source of the configuration.
    pub source: String,

    /// SHA-256 of the file content, or of the canonical JSON of the
    /// effective settings when running on defaults.
    pub hash: String,
}

impl ConfigSnapshot {
    /// Create a new snapshot from loaded configuration.
    pub fn new(config: &PostprocessConfig, resolved: &ConfigPath, content: Option<&str>) -> Self {
        let hash = match content {
            Some(text) => hash_content(text),
            None => hash_content(&serde_json::to_string(config).unwrap_or_default()),
        };
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: config.schema_version.clone(),
            path: resolved.path.as_ref().map(|p| p.display().to_string()),
            source: resolved.source.to_string(),
            hash,
        }
    }

    /// Create a snapshot with only defaults (no config file loaded).
    pub fn defaults_only() -> Self {
        Self::new(&PostprocessConfig::default(), &ConfigPath::default(), None)
    }

    /// Check if this snapshot matches another (same config).
    pub fn matches(&self, other: &ConfigSnapshot) -> bool {
        self.hash == other.hash
    }

    /// Get a short identifier for this snapshot (first 12 chars of hash).
    pub fn short_id(&self) -> &str {
        &self.hash[..12.min(self.hash.len())]
    }
}

/// Hash content with SHA-256 and return hex string.
fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ConfigSource;

    #[test]
    fn test_defaults_snapshot() {
        let snapshot = ConfigSnapshot::defaults_only();
        assert_eq!(snapshot.schema_version, crate::CONFIG_SCHEMA_VERSION);
        assert!(snapshot.path.is_none());
        assert_eq!(snapshot.source, ConfigSource::BuiltinDefault.to_string());
    }

    #[test]
    fn test_snapshot_short_id() {
        let snapshot = ConfigSnapshot::defaults_only();
        assert_eq!(snapshot.short_id().len(), 12);
    }

    #[test]
    fn test_snapshot_matches() {
        let s1 = ConfigSnapshot::defaults_only();
        let s2 = ConfigSnapshot::defaults_only();
        assert!(s1.matches(&s2));
    }

    #[test]
    fn test_different_settings_differ() {
        let seeded = PostprocessConfig {
            seed: 99,
            ..Default::default()
        };
        let s1 = ConfigSnapshot::new(&seeded, &ConfigPath::default(), None);
        let s2 = ConfigSnapshot::defaults_only();
        assert!(!s1.matches(&s2));
    }

    #[test]
    fn test_hash_content() {
        let hash1 = hash_content("test");
        let hash2 = hash_content("test");
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }
}
