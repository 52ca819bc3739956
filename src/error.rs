//! Error types for the catalog
//!
//! Storage failures are fatal to the operation that hit them. Association and
//! physical-file failures are per-item: batches collect them and keep going.

use std::path::PathBuf;
use thiserror::Error;

/// Read/write/parse failure on the storage medium
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize catalog document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Written document at {path} failed verification: {reason}")]
    Verification { path: PathBuf, reason: String },

    #[error("No {kind} document with id {id}")]
    MissingDocument { kind: &'static str, id: String },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Malformed persisted document found on load
#[derive(Debug, Error)]
#[error("Malformed catalog document {path}: {reason}")]
pub struct ValidationError {
    pub path: PathBuf,
    pub reason: String,
}

/// A reference to a category or record that does not exist
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssociationError {
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown media record: {0}")]
    UnknownMedia(String),
}

/// Hard delete could not remove the underlying file
#[derive(Debug, Error)]
#[error("Could not delete {path}: {source}")]
pub struct PhysicalFileError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Top-level error returned by catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Association(#[from] AssociationError),

    #[error("Cannot read folder {path}: {source}")]
    Folder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

/// A task submitted to a [`crate::queue::TaskQueue`] did not run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Task was dropped by a queue reset")]
    Cancelled,

    #[error("Task queue is closed")]
    Closed,
}

/// The tagging or color-extraction service failed for one record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Analysis of {id} failed: {reason}")]
pub struct AnalysisError {
    pub id: String,
    pub reason: String,
}
