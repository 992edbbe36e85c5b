//! Storage traits and error types
//!
//! This module defines the trait interface for the output artifacts of a run
//! and the associated error type.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Sink for the output of a run
///
/// All calls come from the coordinator task, one result at a time, so
/// implementations need no internal synchronization. Every write must be
/// durable enough that a crash leaves the logs valid for a resumed run.
pub trait Storage {
    /// Appends one line to the table log
    fn append_table(&mut self, line: &str) -> StorageResult<()>;

    /// Appends one id to the finished log
    fn append_finished(&mut self, id: u64) -> StorageResult<()>;

    /// Writes the content file for `id`, creating shard directories as needed
    fn write_content(&mut self, id: u64, text: &str) -> StorageResult<()>;

    /// Flushes buffered log output
    fn flush(&mut self) -> StorageResult<()>;
}
