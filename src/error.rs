use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Where a colliding asset id was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateLocation {
    Queue,
    InFlight,
    Records,
}

impl std::fmt::Display for DuplicateLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicateLocation::Queue => f.write_str("already in queue"),
            DuplicateLocation::InFlight => f.write_str("is being wiped by the running batch"),
            DuplicateLocation::Records => f.write_str("already wiped"),
        }
    }
}

/// Validation errors raised synchronously by enqueue and queue edits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("path does not exist: {0}")]
    PathNotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("refusing to wipe protected system path: {0}")]
    ProtectedPath(String),

    #[error("asset id '{asset_id}' {location}")]
    DuplicateAssetId {
        asset_id: String,
        location: DuplicateLocation,
    },

    #[error("no pending job at position {0}")]
    NotFound(usize),
}

/// Job-fatal failures of the overwrite engine.
#[derive(Debug, Error)]
pub enum WipeError {
    #[error("no files found under {}", .0.display())]
    NoFilesFound(PathBuf),

    #[error("failed to scan {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write record store {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("a batch is already running")]
    AlreadyRunning,

    #[error("queue is empty, nothing to wipe")]
    EmptyQueue,

    #[error("failed to start batch worker: {0}")]
    Spawn(String),

    #[error("batch worker panicked")]
    WorkerPanicked,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Errors surfaced by the caller-facing service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no wipe record for asset id '{0}'")]
    RecordNotFound(String),

    #[error("failed to write certificate {}: {source}", path.display())]
    Certificate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
