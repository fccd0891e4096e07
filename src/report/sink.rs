//! Newline-delimited JSON sinks.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::health::ClusterSnapshot;

/// Errors writing to the report log.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("report write to {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Receives one snapshot per reporter cycle.
pub trait SnapshotSink: Send + Sync {
    fn publish(&self, snapshot: &ClusterSnapshot) -> Result<(), SinkError>;
}

/// Appends records to a single file.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record` as one JSON line.
    pub fn append<T: Serialize>(&self, record: &T) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let io_error = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error)?;
        file.write_all(&line).map_err(io_error)?;
        Ok(())
    }
}

impl SnapshotSink for JsonlSink {
    fn publish(&self, snapshot: &ClusterSnapshot) -> Result<(), SinkError> {
        self.append(snapshot)
    }
}

/// Appends records to one file per UTC day.
#[derive(Debug, Clone)]
pub struct DailyJsonlSink {
    directory: PathBuf,
    prefix: String,
}

impl DailyJsonlSink {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
        }
    }

    /// File holding records stamped `timestamp`.
    pub fn path_for(&self, timestamp: DateTime<Utc>) -> PathBuf {
        self.directory
            .join(format!("{}-{}.jsonl", self.prefix, timestamp.format("%Y-%m-%d")))
    }

    pub fn append<T: Serialize>(&self, timestamp: DateTime<Utc>, record: &T) -> Result<(), SinkError> {
        fs::create_dir_all(&self.directory).map_err(|source| SinkError::Io {
            path: self.directory.clone(),
            source,
        })?;
        JsonlSink::new(self.path_for(timestamp)).append(record)
    }
}

impl SnapshotSink for DailyJsonlSink {
    fn publish(&self, snapshot: &ClusterSnapshot) -> Result<(), SinkError> {
        self.append(snapshot.timestamp, snapshot)
    }
}
