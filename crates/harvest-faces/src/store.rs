//! Append-only encoding records.
//!
//! One JSON object per line, one line per image with at least one face.
//! The file is truncated when a stage run opens it and only appended to
//! afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("encoding store {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("encoding record: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingRecord {
    pub source: PathBuf,
    /// One vector per detected face, in detector order.
    pub faces: Vec<Vec<f32>>,
    pub model_version: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

pub struct EncodingStore {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl EncodingStore {
    /// Create (or truncate) the store at `path`.
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = File::create(path).map_err(io_err)?;
        tracing::debug!(path = %path.display(), "encoding store opened");
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush it to the file.
    pub fn append(&mut self, record: &EncodingRecord) -> Result<(), StoreError> {
        let line = serde_json::to_string(record)?;
        writeln!(self.writer, "{line}")
            .and_then(|()| self.writer.flush())
            .map_err(|source| StoreError::Io {
                path: self.path.display().to_string(),
                source,
            })
    }
}

/// Read every record from a store file.
pub fn read_records(path: &Path) -> Result<Vec<EncodingRecord>, StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(io_err)?);

    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str, faces: usize) -> EncodingRecord {
        EncodingRecord {
            source: PathBuf::from(source),
            faces: vec![vec![0.5, -0.5]; faces],
            model_version: Some("w600k_r50".into()),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MissingPersons/FaceEncodings.jsonl");

        let mut store = EncodingStore::create(&path).unwrap();
        store.append(&record("a.jpg", 1)).unwrap();
        store.append(&record("b.jpg", 2)).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source, PathBuf::from("a.jpg"));
        assert_eq!(records[1].faces.len(), 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_create_truncates_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("FaceEncodings.jsonl");

        let mut store = EncodingStore::create(&path).unwrap();
        store.append(&record("old.jpg", 1)).unwrap();
        drop(store);

        let mut store = EncodingStore::create(&path).unwrap();
        store.append(&record("new.jpg", 1)).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, PathBuf::from("new.jpg"));
    }

    #[test]
    fn test_read_rejects_corrupt_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("FaceEncodings.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();
        assert!(matches!(read_records(&path), Err(StoreError::Serialize(_))));
    }
}
