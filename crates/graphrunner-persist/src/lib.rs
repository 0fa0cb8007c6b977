//! On-disk staging layout (spec §4.2).
//!
//! ```text
//! graph/<stepId>/entities/<uuid>.json
//! graph/<stepId>/relationships/<uuid>.json
//! index/entities/<type>/<uuid>.json        (hard link or copy)
//! index/relationships/<type>/<uuid>.json   (hard link or copy)
//! summary.json
//! ```
//!
//! Grounded on the teacher's `storage.rs` backend-trait shape (read/write/
//! list over a keyed resource) generalized to the filesystem instead of an
//! in-memory map, since persistence here is the point rather than a test
//! double for one.

mod error;

use std::fs;
use std::io::Read as _;
use std::path::{Path, PathBuf};

pub use error::PersistError;
use graphrunner_model::{FlushedFile, RunSummary};

const COMPRESSION_ENV_VAR: &str = "INTEGRATION_FILE_COMPRESSION_ENABLED";

fn io_err(path: &Path, source: std::io::Error) -> PersistError {
    PersistError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn serde_err(path: &Path, source: serde_json::Error) -> PersistError {
    PersistError::Serde {
        path: path.to_path_buf(),
        source,
    }
}

/// A flushed file discovered on disk, paired with its parsed content
/// (spec §4.2, "graph-file iterator").
pub struct GraphFile {
    pub path: PathBuf,
    pub content: FlushedFile,
}

/// Disk-usage total backing the scheduler's `disk-usage` metric (spec §4.5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirStats {
    pub total_bytes: u64,
}

/// Owns the staging directory for a single run.
pub struct StagingRoot {
    root: PathBuf,
    compression_enabled: bool,
}

impl StagingRoot {
    /// `compression_enabled` mirrors `INTEGRATION_FILE_COMPRESSION_ENABLED`
    /// being non-empty; read it once at construction time so a run's
    /// compression mode can't change mid-flight.
    pub fn new(root: impl Into<PathBuf>, compression_enabled: bool) -> Self {
        StagingRoot {
            root: root.into(),
            compression_enabled,
        }
    }

    pub fn from_env(root: impl Into<PathBuf>) -> Self {
        let compression_enabled = std::env::var(COMPRESSION_ENV_VAR)
            .map(|v| !v.is_empty())
            .unwrap_or(false);
        Self::new(root, compression_enabled)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn graph_dir(&self) -> PathBuf {
        self.root.join("graph")
    }

    fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    fn summary_path(&self) -> PathBuf {
        self.root.join("summary.json")
    }

    /// Remove the root recursively and recreate `graph/` and `index/`
    /// (spec §4.2: "At run start the root is removed recursively and
    /// recreated").
    pub fn prepare(&self) -> Result<(), PersistError> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root).map_err(|e| io_err(&self.root, e))?;
        }
        fs::create_dir_all(self.graph_dir()).map_err(|e| io_err(&self.graph_dir(), e))?;
        fs::create_dir_all(self.index_dir()).map_err(|e| io_err(&self.index_dir(), e))?;
        Ok(())
    }

    fn kind_dir_name(file: &FlushedFile) -> &'static str {
        match file {
            FlushedFile::Entities { .. } => "entities",
            FlushedFile::Relationships { .. } => "relationships",
        }
    }

    fn types_in(file: &FlushedFile) -> Vec<&str> {
        let mut types: Vec<&str> = match file {
            FlushedFile::Entities { entities } => {
                entities.iter().map(|e| e.type_name.as_str()).collect()
            }
            FlushedFile::Relationships { relationships } => {
                relationships.iter().map(|r| r.type_name()).collect()
            }
        };
        types.sort_unstable();
        types.dedup();
        types
    }

    fn encode(&self, file: &FlushedFile, path: &Path) -> Result<Vec<u8>, PersistError> {
        let json = serde_json::to_vec(file).map_err(|e| serde_err(path, e))?;
        if self.compression_enabled {
            let mut compressed = Vec::new();
            let params = brotli::enc::BrotliEncoderParams::default();
            brotli::BrotliCompress(&mut json.as_slice(), &mut compressed, &params)
                .map_err(|e| io_err(path, e))?;
            Ok(compressed)
        } else {
            Ok(json)
        }
    }

    fn decode(path: &Path, bytes: &[u8]) -> Result<FlushedFile, PersistError> {
        if let Ok(file) = serde_json::from_slice(bytes) {
            return Ok(file);
        }
        let mut decompressed = Vec::new();
        let mut reader = brotli::Decompressor::new(bytes, 4096);
        reader
            .read_to_end(&mut decompressed)
            .map_err(|e| io_err(path, e))?;
        serde_json::from_slice(&decompressed).map_err(|e| serde_err(path, e))
    }

    /// Write one flushed buffer under `graph/<stepId>/<kind>/<uuid>.json`
    /// and link it into `index/<kind>/<type>/<uuid>.json` for every type the
    /// file contains (spec §4.2).
    pub fn write_flush(&self, step_id: &str, file: &FlushedFile) -> Result<PathBuf, PersistError> {
        let kind = Self::kind_dir_name(file);
        let file_name = format!("{}.json", uuid::Uuid::new_v4());

        let step_dir = self.graph_dir().join(step_id).join(kind);
        fs::create_dir_all(&step_dir).map_err(|e| io_err(&step_dir, e))?;
        let graph_path = step_dir.join(&file_name);

        let bytes = self.encode(file, &graph_path)?;
        fs::write(&graph_path, &bytes).map_err(|e| io_err(&graph_path, e))?;

        for type_name in Self::types_in(file) {
            let type_dir = self.index_dir().join(kind).join(type_name);
            fs::create_dir_all(&type_dir).map_err(|e| io_err(&type_dir, e))?;
            let index_path = type_dir.join(&file_name);
            if fs::hard_link(&graph_path, &index_path).is_err() {
                fs::write(&index_path, &bytes).map_err(|e| io_err(&index_path, e))?;
            }
        }

        tracing::debug!(step_id, kind, path = %graph_path.display(), "flushed buffer to disk");
        Ok(graph_path)
    }

    pub fn read_flush(&self, path: &Path) -> Result<FlushedFile, PersistError> {
        let bytes = fs::read(path).map_err(|e| io_err(path, e))?;
        Self::decode(path, &bytes)
    }

    /// Depth-first walk of every flushed file under `graph/`.
    pub fn walk(&self) -> Result<Vec<PathBuf>, PersistError> {
        let mut files = Vec::new();
        walk_dir(&self.graph_dir(), &mut files)?;
        files.sort();
        Ok(files)
    }

    /// Pairs each flushed file under `graph/` with its parsed content
    /// (spec §4.2, "uniform lazy stream to the uploader").
    pub fn graph_files(&self) -> Result<Vec<GraphFile>, PersistError> {
        self.walk()?
            .into_iter()
            .map(|path| {
                let content = self.read_flush(&path)?;
                Ok(GraphFile { path, content })
            })
            .collect()
    }

    /// Recursive byte-size total of the whole staging root (spec §4.5,
    /// the scheduler's `disk-usage` metric).
    pub fn dir_stats(&self) -> Result<DirStats, PersistError> {
        let mut total_bytes = 0u64;
        let mut files = Vec::new();
        if self.root.exists() {
            walk_dir(&self.root, &mut files)?;
        }
        for path in files {
            let metadata = fs::metadata(&path).map_err(|e| io_err(&path, e))?;
            total_bytes += metadata.len();
        }
        Ok(DirStats { total_bytes })
    }

    pub fn write_summary(&self, summary: &RunSummary) -> Result<(), PersistError> {
        let path = self.summary_path();
        let json = serde_json::to_vec_pretty(summary).map_err(|e| serde_err(&path, e))?;
        fs::write(&path, json).map_err(|e| io_err(&path, e))
    }

    pub fn read_summary(&self) -> Result<RunSummary, PersistError> {
        let path = self.summary_path();
        let bytes = fs::read(&path).map_err(|e| io_err(&path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| serde_err(&path, e))
    }
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), PersistError> {
    let entries = fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    let mut children: Vec<PathBuf> = entries
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| io_err(dir, e))?
        .into_iter()
        .map(|entry| entry.path())
        .collect();
    children.sort();

    for path in children {
        if path.is_dir() {
            walk_dir(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphrunner_model::Entity;

    fn sample_entities() -> FlushedFile {
        FlushedFile::entities(vec![
            Entity::new("host:1", "aws_host", "Host"),
            Entity::new("host:2", "aws_host", "Host"),
        ])
    }

    #[test]
    fn prepare_clears_preexisting_staging_contents() {
        let dir = tempfile::tempdir().unwrap();
        let stray = dir.path().join("graph").join("my-test");
        fs::create_dir_all(&stray).unwrap();
        fs::write(stray.join("someFile.json"), b"{}").unwrap();

        let staging = StagingRoot::new(dir.path(), false);
        staging.prepare().unwrap();

        assert!(!stray.join("someFile.json").exists());
        assert!(dir.path().join("graph").is_dir());
        assert!(dir.path().join("index").is_dir());
    }

    #[test]
    fn write_and_read_flush_round_trips_uncompressed() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingRoot::new(dir.path(), false);
        staging.prepare().unwrap();

        let file = sample_entities();
        let path = staging.write_flush("my-step", &file).unwrap();
        let read_back = staging.read_flush(&path).unwrap();
        assert_eq!(read_back, file);
    }

    #[test]
    fn write_and_read_flush_round_trips_compressed() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingRoot::new(dir.path(), true);
        staging.prepare().unwrap();

        let file = sample_entities();
        let path = staging.write_flush("my-step", &file).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert!(serde_json::from_slice::<FlushedFile>(&bytes).is_err());

        let read_back = staging.read_flush(&path).unwrap();
        assert_eq!(read_back, file);
    }

    #[test]
    fn graph_files_lists_every_flushed_file() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingRoot::new(dir.path(), false);
        staging.prepare().unwrap();

        staging.write_flush("step-a", &sample_entities()).unwrap();
        staging
            .write_flush(
                "step-b",
                &FlushedFile::relationships(vec![]),
            )
            .unwrap();

        let files = staging.graph_files().unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn summary_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingRoot::new(dir.path(), false);
        staging.prepare().unwrap();

        let summary = RunSummary::new(vec![]);
        staging.write_summary(&summary).unwrap();
        let read_back = staging.read_summary().unwrap();
        assert_eq!(read_back, summary);
    }
}
