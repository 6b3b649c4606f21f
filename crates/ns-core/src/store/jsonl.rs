//! JSON-lines run directories.
//!
//! A run directory holds one file per table, one JSON object per line:
//!
//! ```text
//! run/
//!   levels.jsonl           {"index":0,"log_prior_volume":0.0,"accepts":12,"tries":40}
//!   particle_counts.jsonl  {"index":0,"particle_count":1000}
//!   particles.jsonl        {"id":1,"level":0,"log_likelihood":-31.2,"tiebreak":0.52,"parameters":"AAEC"}
//! ```
//!
//! Blank lines are ignored. A table whose file does not exist yet reads as
//! empty, which is how a sampler that has not written any levels looks.
//! Writes go through a temporary file in the same directory that is renamed
//! into place.

use super::{PosteriorSink, RecordIter, RecordSource};
use ns_common::{Error, Level, Particle, ParticleCount, PosteriorSample, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LEVELS_FILE: &str = "levels.jsonl";
pub const PARTICLE_COUNTS_FILE: &str = "particle_counts.jsonl";
pub const PARTICLES_FILE: &str = "particles.jsonl";

/// A sampler run stored as JSON-lines files.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    dir: PathBuf,
}

impl JsonlStore {
    /// Open an existing run directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(Error::io(
                &dir,
                std::io::Error::new(ErrorKind::NotFound, "run directory does not exist"),
            ));
        }
        debug!(dir = %dir.display(), "opened run directory");
        Ok(Self { dir })
    }

    /// Write a complete run into `dir`, replacing any tables already there.
    pub fn create(
        dir: impl Into<PathBuf>,
        levels: &[Level],
        particle_counts: &[ParticleCount],
        particles: &[Particle],
    ) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        write_jsonl(&dir.join(LEVELS_FILE), levels)?;
        write_jsonl(&dir.join(PARTICLE_COUNTS_FILE), particle_counts)?;
        write_jsonl(&dir.join(PARTICLES_FILE), particles)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RecordSource for JsonlStore {
    fn levels(&self) -> RecordIter<'_, Level> {
        read_jsonl(self.dir.join(LEVELS_FILE))
    }

    fn particle_counts(&self) -> RecordIter<'_, ParticleCount> {
        read_jsonl(self.dir.join(PARTICLE_COUNTS_FILE))
    }

    fn particles(&self) -> RecordIter<'_, Particle> {
        read_jsonl(self.dir.join(PARTICLES_FILE))
    }
}

/// Posterior collection stored as one JSON-lines file.
#[derive(Debug, Clone)]
pub struct JsonlPosteriorSink {
    path: PathBuf,
}

impl JsonlPosteriorSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PosteriorSink for JsonlPosteriorSink {
    fn replace(&mut self, samples: &[PosteriorSample]) -> Result<()> {
        write_jsonl(&self.path, samples)
    }
}

/// Parse one line of a JSON-lines table.
pub fn parse_line<T: DeserializeOwned>(line: &str) -> serde_json::Result<T> {
    serde_json::from_str(line)
}

/// Lazily read a JSON-lines table; a missing file is an empty table.
pub fn read_jsonl<T: DeserializeOwned + 'static>(path: PathBuf) -> RecordIter<'static, T> {
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "table not written yet");
            return Box::new(std::iter::empty());
        }
        Err(e) => return Box::new(std::iter::once(Err(Error::io(&path, e)))),
    };

    let lines = BufReader::new(file).lines().enumerate();
    Box::new(lines.filter_map(move |(i, line)| {
        let line = match line {
            Ok(line) => line,
            Err(e) => return Some(Err(Error::io(&path, e))),
        };
        if line.trim().is_empty() {
            return None;
        }
        Some(parse_line(&line).map_err(|e| Error::InvalidRecord {
            path: path.clone(),
            line: i + 1,
            message: e.to_string(),
        }))
    }))
}

/// Replace `path` with `records`, one JSON object per line.
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    replace_file(path, |writer| {
        for record in records {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n").map_err(|e| Error::io(path, e))?;
        }
        Ok(())
    })?;
    debug!(path = %path.display(), records = records.len(), "wrote table");
    Ok(())
}

/// Write `path` through a temporary file in the same directory, then rename
/// it into place. Readers see either the old file or the new one.
pub fn replace_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| Error::io(&parent, e))?;

    let tmp = tempfile::NamedTempFile::new_in(&parent).map_err(|e| Error::io(&parent, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        write(&mut writer)?;
        writer.flush().map_err(|e| Error::io(path, e))?;
    }
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_tables_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        assert_eq!(store.levels().count(), 0);
        assert_eq!(store.max_particle_id().unwrap(), None);
    }

    #[test]
    fn open_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonlStore::open(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn create_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let levels = vec![Level::new(0, 0.0), Level::new(1, -1.0)];
        let counts = vec![
            ParticleCount {
                index: 0,
                particle_count: 1,
            },
            ParticleCount {
                index: 1,
                particle_count: 1,
            },
        ];
        let particles = vec![
            Particle::new(1, 0, f64::NEG_INFINITY, 0.5),
            Particle::new(2, 1, 3.0, 0.25).with_parameters(b"xyz".to_vec()),
        ];
        let store = JsonlStore::create(dir.path(), &levels, &counts, &particles).unwrap();

        let back: Vec<Particle> = store.particles().collect::<Result<_>>().unwrap();
        assert_eq!(back, particles);
        let back: Vec<Level> = store.levels().collect::<Result<_>>().unwrap();
        assert_eq!(back, levels);
    }

    #[test]
    fn blank_lines_are_skipped_and_bad_lines_located() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(LEVELS_FILE),
            "{\"index\":0,\"log_prior_volume\":0.0}\n\n{\"index\":1}\n",
        )
        .unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        let results: Vec<Result<Level>> = store.levels().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        match &results[1] {
            Err(Error::InvalidRecord { line, .. }) => assert_eq!(*line, 3),
            other => panic!("expected InvalidRecord, got {other:?}"),
        }
    }

    #[test]
    fn sink_replaces_instead_of_appending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("posterior.jsonl");
        let mut sink = JsonlPosteriorSink::new(&path);
        let samples = vec![
            PosteriorSample {
                id: 0,
                particle_id: 4,
                parameters: vec![1, 2],
            },
            PosteriorSample {
                id: 1,
                particle_id: 4,
                parameters: vec![1, 2],
            },
        ];
        sink.replace(&samples).unwrap();
        sink.replace(&samples).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        let back: Vec<PosteriorSample> = read_jsonl(path).collect::<Result<_>>().unwrap();
        assert_eq!(back, samples);
    }
}
