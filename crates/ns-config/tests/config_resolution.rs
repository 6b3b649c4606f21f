//! Configuration loading and resolution tests against real files.
//!
//! Covers:
//! - Resolution order (CLI > env path > env dir > defaults)
//! - Validation of on-disk settings
//! - Snapshot hashes tracking file content

use ns_config::resolve::{ENV_CONFIG_DIR, ENV_CONFIG_PATH};
use ns_config::{load_config, resolve_config, ConfigSource, ValidationError};
use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let mut saved = Vec::with_capacity(keys.len());
        for key in keys {
            saved.push(env::var(key).ok());
        }
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (idx, key) in self.keys.iter().enumerate() {
            match self.saved.get(idx).and_then(|v| v.as_ref()) {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("env lock poisoned");
    f()
}

fn write_config(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create config parent");
    }
    fs::write(path, body).expect("write config");
}

#[test]
fn explicit_path_beats_environment() {
    with_env_lock(|| {
        let _env = EnvGuard::new(&[ENV_CONFIG_PATH, ENV_CONFIG_DIR]);
        let tmp = TempDir::new().unwrap();
        let cli = tmp.path().join("cli.json");
        let from_env = tmp.path().join("env.json");
        write_config(&cli, r#"{"seed": 1}"#);
        write_config(&from_env, r#"{"seed": 2}"#);
        env::set_var(ENV_CONFIG_PATH, &from_env);

        let resolved = resolve_config(Some(&cli));
        assert_eq!(resolved.source, ConfigSource::CliArgument);

        let (config, snapshot) = load_config(Some(&cli)).unwrap();
        assert_eq!(config.seed, 1);
        assert_eq!(snapshot.source, "CLI argument");
    });
}

#[test]
fn env_path_then_env_dir() {
    with_env_lock(|| {
        let _env = EnvGuard::new(&[ENV_CONFIG_PATH, ENV_CONFIG_DIR]);
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("confdir");
        write_config(&dir.join("postprocess.json"), r#"{"seed": 3}"#);

        env::remove_var(ENV_CONFIG_PATH);
        env::set_var(ENV_CONFIG_DIR, &dir);
        let (config, snapshot) = load_config(None).unwrap();
        assert_eq!(config.seed, 3);
        assert_eq!(snapshot.source, "environment variable");

        let direct = tmp.path().join("direct.json");
        write_config(&direct, r#"{"seed": 4}"#);
        env::set_var(ENV_CONFIG_PATH, &direct);
        let (config, _) = load_config(None).unwrap();
        assert_eq!(config.seed, 4);
    });
}

#[test]
fn missing_env_path_falls_through() {
    with_env_lock(|| {
        let _env = EnvGuard::new(&[ENV_CONFIG_PATH, ENV_CONFIG_DIR]);
        let tmp = TempDir::new().unwrap();
        env::set_var(ENV_CONFIG_PATH, tmp.path().join("absent.json"));
        env::set_var(ENV_CONFIG_DIR, tmp.path().join("absent-dir"));

        let resolved = resolve_config(None);
        assert_ne!(resolved.source, ConfigSource::Environment);
    });
}

#[test]
fn explicit_missing_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let err = load_config(Some(&tmp.path().join("nope.json"))).unwrap_err();
    assert!(matches!(err, ValidationError::IoError(_)), "{err}");
}

#[test]
fn invalid_values_in_file_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("postprocess.json");
    write_config(&path, r#"{"temperature": -2.0}"#);
    let err = load_config(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("temperature"), "{err}");
    assert_eq!(err.code(), 65);
}

#[test]
fn snapshot_hash_tracks_file_content() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("postprocess.json");

    write_config(&path, r#"{"seed": 10}"#);
    let (_, first) = load_config(Some(&path)).unwrap();
    let (_, again) = load_config(Some(&path)).unwrap();
    assert!(first.matches(&again));

    write_config(&path, r#"{"seed": 11}"#);
    let (_, changed) = load_config(Some(&path)).unwrap();
    assert!(!first.matches(&changed));
    assert_eq!(changed.path.as_deref(), Some(path.display().to_string().as_str()));
}
