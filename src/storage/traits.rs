//! Storage traits and error types
//!
//! The crawler consumes the store only through these contracts. Every method
//! takes `&self` so one backend can be shared between section tasks and item
//! fetches behind an `Arc`.

use crate::crawler::ItemRecord;
use crate::storage::{RunRecord, RunStatus, SectionProgress};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Answers which item identifiers are already stored
pub trait KnownItems: Send + Sync {
    /// Returns the subset of `identifiers` already present in the store
    ///
    /// An empty input yields an empty set without touching the backend.
    fn known_identifiers(&self, identifiers: &[String]) -> StorageResult<HashSet<String>>;
}

/// Durable per-section checkpoint records
pub trait ProgressStore: Send + Sync {
    /// Loads the checkpoint of a section; `None` means the section never ran
    fn get_progress(&self, section: &str) -> StorageResult<Option<SectionProgress>>;

    /// Merges a checkpoint into the stored record
    ///
    /// Fields left as `None` keep their stored value.
    fn put_progress(&self, progress: &SectionProgress) -> StorageResult<()>;

    /// Loads every stored checkpoint, ordered by section name
    fn list_progress(&self) -> StorageResult<Vec<SectionProgress>>;
}

/// Destination of parsed items
pub trait ItemSink: Send + Sync {
    /// Inserts or replaces the item with the same identifier (last write wins)
    fn upsert_item(&self, item: &ItemRecord) -> StorageResult<()>;

    /// Counts stored items, optionally restricted to one section
    fn count_items(&self, section: Option<&str>) -> StorageResult<u64>;
}

/// Run bookkeeping used by the binary for its single-run discipline
pub trait RunLog: Send + Sync {
    /// Records the start of a run and returns its ID
    fn create_run(&self, mode: &str, config_hash: &str) -> StorageResult<i64>;

    /// Marks a run as finished with the given status and optional JSON summary
    fn finish_run(&self, run_id: i64, status: RunStatus, summary: Option<&str>)
        -> StorageResult<()>;

    /// Returns the most recent run still marked as running, if any
    fn latest_running(&self) -> StorageResult<Option<RunRecord>>;

    /// Returns the most recent runs, newest first
    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;
}
