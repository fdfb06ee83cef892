//! Store access for the crawler, degrading instead of failing
//!
//! The crawl must keep going when the store is missing or broken: an
//! unavailable oracle makes every entry unknown, an unavailable progress
//! store disables checkpoints. Each degraded call logs a warning.
//!
//! Store calls are blocking (SQLite), so they run on the blocking pool.

use crate::crawler::controller::checkpoint;
use crate::crawler::ItemRecord;
use crate::state::{RunMode, SectionCounters};
use crate::storage::{ItemSink, KnownItems, ProgressStore, SectionProgress, StorageError};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

/// Runs a blocking store call off the async workers
async fn blocking<T, F>(f: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Database(format!("store task failed: {}", e)))?
}

/// Answers "which of these identifiers are already stored"
#[derive(Clone)]
pub struct KnownItemOracle {
    store: Option<Arc<dyn KnownItems>>,
}

impl KnownItemOracle {
    pub fn new(store: Arc<dyn KnownItems>) -> Self {
        Self { store: Some(store) }
    }

    /// An oracle with no store behind it: nothing is ever known
    pub fn unavailable() -> Self {
        Self { store: None }
    }

    /// Returns the subset of `identifiers` already stored
    ///
    /// Never fails. Without a reachable store the result is empty, which
    /// over-fetches rather than silently skipping new items.
    pub async fn lookup(&self, identifiers: &[String]) -> HashSet<String> {
        if identifiers.is_empty() {
            return HashSet::new();
        }

        let Some(store) = self.store.clone() else {
            tracing::warn!(
                "Known-item store unavailable, treating {} entries as unknown",
                identifiers.len()
            );
            return HashSet::new();
        };

        let ids = identifiers.to_vec();
        match blocking(move || store.known_identifiers(&ids)).await {
            Ok(known) => known,
            Err(e) => {
                tracing::warn!(
                    "Known-item lookup failed, treating {} entries as unknown: {}",
                    identifiers.len(),
                    e
                );
                HashSet::new()
            }
        }
    }
}

/// Reads and writes section checkpoints
#[derive(Clone)]
pub struct ProgressBook {
    store: Option<Arc<dyn ProgressStore>>,
}

impl ProgressBook {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store: Some(store) }
    }

    /// A book with no store: reads find nothing, writes are skipped
    pub fn unavailable() -> Self {
        Self { store: None }
    }

    /// Loads the checkpoint of a section, `None` if absent or unreadable
    pub async fn get(&self, section: &str) -> Option<SectionProgress> {
        let store = self.store.clone()?;
        let name = section.to_string();
        match blocking(move || store.get_progress(&name)).await {
            Ok(progress) => progress,
            Err(e) => {
                tracing::warn!("Could not read progress of '{}': {}", section, e);
                None
            }
        }
    }

    /// Writes the checkpoint of a section that just stopped
    ///
    /// Does nothing for `full` runs. Returns the record written, if any.
    pub async fn save(&self, section: &SectionCounters, mode: RunMode) -> Option<SectionProgress> {
        if !mode.is_incremental() {
            return None;
        }
        let Some(store) = self.store.clone() else {
            tracing::warn!(
                "Progress store unavailable, checkpoint of '{}' not written",
                section.name
            );
            return None;
        };

        let stored = self.get(&section.name).await;
        let record = checkpoint(section, mode, stored.as_ref(), Utc::now())?;

        let to_write = record.clone();
        match blocking(move || store.put_progress(&to_write)).await {
            Ok(()) => {
                tracing::info!(
                    "Checkpointed '{}': next backfill page {}",
                    record.section,
                    record.next_backfill_page
                );
                Some(record)
            }
            Err(e) => {
                tracing::warn!("Could not checkpoint '{}': {}", section.name, e);
                None
            }
        }
    }
}

/// Persists parsed items
#[derive(Clone)]
pub struct ItemStore {
    sink: Option<Arc<dyn ItemSink>>,
}

impl ItemStore {
    pub fn new(sink: Arc<dyn ItemSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn unavailable() -> Self {
        Self { sink: None }
    }

    /// Upserts an item; failures are logged, never propagated
    pub async fn upsert(&self, item: ItemRecord) -> bool {
        let Some(sink) = self.sink.clone() else {
            tracing::warn!("Item store unavailable, '{}' not persisted", item.doc_id);
            return false;
        };

        let doc_id = item.doc_id.clone();
        match blocking(move || sink.upsert_item(&item)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Could not store '{}': {}", doc_id, e);
                false
            }
        }
    }
}
