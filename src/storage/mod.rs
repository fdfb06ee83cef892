//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Known-item lookups and item upserts
//! - Per-section progress checkpoints
//! - Run records for the single-run discipline

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{ItemSink, KnownItems, ProgressStore, RunLog, StorageError, StorageResult};

use crate::FolioError;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(FolioError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, FolioError> {
    SqliteStorage::new(path)
}

/// Durable checkpoint of one section
///
/// `None` fields are "not specified": writing them leaves the stored value
/// untouched, reading them means the corresponding mode never ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionProgress {
    pub section: String,
    pub updated_at: DateTime<Utc>,
    pub last_latest_scanned_page: Option<u32>,
    pub last_latest_stopped_reason: Option<String>,
    pub last_latest_new_links: Option<u64>,
    pub last_backfill_scanned_page: Option<u32>,
    pub last_backfill_stopped_reason: Option<String>,
    pub last_backfill_new_links: Option<u64>,
    /// Resume cursor of backfill runs, always >= 1
    pub next_backfill_page: u32,
}

impl SectionProgress {
    /// Creates an empty record for a section that never ran
    pub fn new(section: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            section: section.into(),
            updated_at,
            last_latest_scanned_page: None,
            last_latest_stopped_reason: None,
            last_latest_new_links: None,
            last_backfill_scanned_page: None,
            last_backfill_stopped_reason: None,
            last_backfill_new_links: None,
            next_backfill_page: 1,
        }
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub mode: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub summary: Option<String>,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
