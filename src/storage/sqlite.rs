//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the storage traits.

use crate::crawler::ItemRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    ItemSink, KnownItems, ProgressStore, RunLog, StorageError, StorageResult,
};
use crate::storage::{RunRecord, RunStatus, SectionProgress};
use crate::FolioError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Upper bound on identifiers bound into one `IN (...)` query
const LOOKUP_CHUNK_SIZE: usize = 500;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(FolioError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, FolioError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, FolioError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl KnownItems for SqliteStorage {
    fn known_identifiers(&self, identifiers: &[String]) -> StorageResult<HashSet<String>> {
        let mut known = HashSet::new();
        if identifiers.is_empty() {
            return Ok(known);
        }

        let conn = self.conn()?;
        for chunk in identifiers.chunks(LOOKUP_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!("SELECT doc_id FROM items WHERE doc_id IN ({})", placeholders);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                row.get::<_, String>(0)
            })?;
            for row in rows {
                known.insert(row?);
            }
        }

        Ok(known)
    }
}

impl ProgressStore for SqliteStorage {
    fn get_progress(&self, section: &str) -> StorageResult<Option<SectionProgress>> {
        let conn = self.conn()?;
        let progress = conn
            .query_row(
                "SELECT section, updated_at, last_latest_scanned_page, last_latest_stopped_reason,
                 last_latest_new_links, last_backfill_scanned_page, last_backfill_stopped_reason,
                 last_backfill_new_links, next_backfill_page
                 FROM section_progress WHERE section = ?1",
                params![section],
                progress_from_row,
            )
            .optional()?;
        Ok(progress)
    }

    fn put_progress(&self, progress: &SectionProgress) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO section_progress (section, updated_at, last_latest_scanned_page,
                 last_latest_stopped_reason, last_latest_new_links, last_backfill_scanned_page,
                 last_backfill_stopped_reason, last_backfill_new_links, next_backfill_page)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(section) DO UPDATE SET
                 updated_at = excluded.updated_at,
                 last_latest_scanned_page =
                     COALESCE(excluded.last_latest_scanned_page, last_latest_scanned_page),
                 last_latest_stopped_reason =
                     COALESCE(excluded.last_latest_stopped_reason, last_latest_stopped_reason),
                 last_latest_new_links =
                     COALESCE(excluded.last_latest_new_links, last_latest_new_links),
                 last_backfill_scanned_page =
                     COALESCE(excluded.last_backfill_scanned_page, last_backfill_scanned_page),
                 last_backfill_stopped_reason =
                     COALESCE(excluded.last_backfill_stopped_reason, last_backfill_stopped_reason),
                 last_backfill_new_links =
                     COALESCE(excluded.last_backfill_new_links, last_backfill_new_links),
                 next_backfill_page = excluded.next_backfill_page",
            params![
                progress.section,
                progress.updated_at.to_rfc3339(),
                progress.last_latest_scanned_page,
                progress.last_latest_stopped_reason,
                progress.last_latest_new_links.map(to_sql_count),
                progress.last_backfill_scanned_page,
                progress.last_backfill_stopped_reason,
                progress.last_backfill_new_links.map(to_sql_count),
                progress.next_backfill_page.max(1),
            ],
        )?;
        Ok(())
    }

    fn list_progress(&self) -> StorageResult<Vec<SectionProgress>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT section, updated_at, last_latest_scanned_page, last_latest_stopped_reason,
             last_latest_new_links, last_backfill_scanned_page, last_backfill_stopped_reason,
             last_backfill_new_links, next_backfill_page
             FROM section_progress ORDER BY section",
        )?;
        let rows = stmt.query_map([], progress_from_row)?;

        let mut progress = Vec::new();
        for row in rows {
            progress.push(row?);
        }
        Ok(progress)
    }
}

impl ItemSink for SqliteStorage {
    fn upsert_item(&self, item: &ItemRecord) -> StorageResult<()> {
        let document = serde_json::to_string(item)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO items (doc_id, section, url, title, document, scraped_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(doc_id) DO UPDATE SET
                 section = excluded.section,
                 url = excluded.url,
                 title = excluded.title,
                 document = excluded.document,
                 scraped_at = excluded.scraped_at",
            params![
                item.doc_id,
                item.section,
                item.url,
                item.title,
                document,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn count_items(&self, section: Option<&str>) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = match section {
            Some(section) => conn.query_row(
                "SELECT COUNT(*) FROM items WHERE section = ?1",
                params![section],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?,
        };
        Ok(count.max(0) as u64)
    }
}

impl RunLog for SqliteStorage {
    fn create_run(&self, mode: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO runs (mode, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![mode, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        summary: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, summary = COALESCE(?3, summary)
             WHERE id = ?4",
            params![status.to_db_string(), now, summary, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn latest_running(&self) -> StorageResult<Option<RunRecord>> {
        let conn = self.conn()?;
        let run = conn
            .query_row(
                "SELECT id, mode, started_at, finished_at, config_hash, status, summary
                 FROM runs WHERE status = ?1 ORDER BY id DESC LIMIT 1",
                params![RunStatus::Running.to_db_string()],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, mode, started_at, finished_at, config_hash, status, summary
             FROM runs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], run_from_row)?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row?);
        }
        Ok(runs)
    }
}

fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn progress_from_row(row: &Row<'_>) -> rusqlite::Result<SectionProgress> {
    let next_backfill_page: u32 = row.get(8)?;
    Ok(SectionProgress {
        section: row.get(0)?,
        updated_at: parse_timestamp(row, 1)?,
        last_latest_scanned_page: row.get(2)?,
        last_latest_stopped_reason: row.get(3)?,
        last_latest_new_links: row.get::<_, Option<i64>>(4)?.map(|v| v.max(0) as u64),
        last_backfill_scanned_page: row.get(5)?,
        last_backfill_stopped_reason: row.get(6)?,
        last_backfill_new_links: row.get::<_, Option<i64>>(7)?.map(|v| v.max(0) as u64),
        next_backfill_page: next_backfill_page.max(1),
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        mode: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Failed),
        summary: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn item(doc_id: &str, section: &str, title: &str) -> ItemRecord {
        ItemRecord {
            doc_id: doc_id.to_string(),
            url: format!("https://shs.example.org/{}", doc_id),
            section: section.to_string(),
            title: Some(title.to_string()),
            ..ItemRecord::default()
        }
    }

    fn full_progress(section: &str) -> SectionProgress {
        SectionProgress {
            section: section.to_string(),
            updated_at: Utc::now(),
            last_latest_scanned_page: Some(4),
            last_latest_stopped_reason: Some("known page streak reached".to_string()),
            last_latest_new_links: Some(12),
            last_backfill_scanned_page: Some(9),
            last_backfill_stopped_reason: Some("configured backfill depth reached".to_string()),
            last_backfill_new_links: Some(30),
            next_backfill_page: 10,
        }
    }

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteStorage::new_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_open_on_disk_twice() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("folio.db");

        let storage = SqliteStorage::new(&path).unwrap();
        storage.upsert_item(&item("ouvrage/a", "Droit", "A")).unwrap();
        drop(storage);

        let storage = SqliteStorage::new(&path).unwrap();
        assert_eq!(storage.count_items(None).unwrap(), 1);
    }

    #[test]
    fn test_known_identifiers_subset() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.upsert_item(&item("ouvrage/a", "Droit", "A")).unwrap();
        storage.upsert_item(&item("ouvrage/b", "Droit", "B")).unwrap();

        let candidates = vec![
            "ouvrage/a".to_string(),
            "ouvrage/c".to_string(),
            "ouvrage/b".to_string(),
        ];
        let known = storage.known_identifiers(&candidates).unwrap();

        assert_eq!(known.len(), 2);
        assert!(known.contains("ouvrage/a"));
        assert!(known.contains("ouvrage/b"));
        assert!(!known.contains("ouvrage/c"));
    }

    #[test]
    fn test_known_identifiers_empty_input() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.known_identifiers(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_known_identifiers_spans_chunks() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let ids: Vec<String> = (0..1200).map(|i| format!("ouvrage/{}", i)).collect();
        for id in ids.iter().step_by(3) {
            storage.upsert_item(&item(id, "Droit", id)).unwrap();
        }

        let known = storage.known_identifiers(&ids).unwrap();
        assert_eq!(known.len(), 400);
        assert!(known.contains("ouvrage/1197"));
    }

    #[test]
    fn test_upsert_item_last_write_wins() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.upsert_item(&item("ouvrage/a", "Droit", "Old")).unwrap();
        storage.upsert_item(&item("ouvrage/a", "Droit", "New")).unwrap();

        assert_eq!(storage.count_items(Some("Droit")).unwrap(), 1);
        let conn = storage.conn().unwrap();
        let title: String = conn
            .query_row("SELECT title FROM items WHERE doc_id = 'ouvrage/a'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(title, "New");
    }

    #[test]
    fn test_count_items_per_section() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.upsert_item(&item("ouvrage/a", "Droit", "A")).unwrap();
        storage.upsert_item(&item("ouvrage/b", "Histoire", "B")).unwrap();
        storage.upsert_item(&item("ouvrage/c", "Histoire", "C")).unwrap();

        assert_eq!(storage.count_items(None).unwrap(), 3);
        assert_eq!(storage.count_items(Some("Histoire")).unwrap(), 2);
        assert_eq!(storage.count_items(Some("Sociologie")).unwrap(), 0);
    }

    #[test]
    fn test_missing_progress_is_none() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.get_progress("Droit").unwrap().is_none());
    }

    #[test]
    fn test_put_progress_is_idempotent() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let progress = full_progress("Droit");

        storage.put_progress(&progress).unwrap();
        assert_eq!(storage.get_progress("Droit").unwrap(), Some(progress.clone()));

        storage.put_progress(&progress).unwrap();
        assert_eq!(storage.get_progress("Droit").unwrap(), Some(progress));
    }

    #[test]
    fn test_put_progress_merges_unspecified_fields() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.put_progress(&full_progress("Droit")).unwrap();

        let mut latest_only = SectionProgress::new("Droit", Utc::now());
        latest_only.last_latest_scanned_page = Some(6);
        latest_only.last_latest_stopped_reason = Some("max pages reached".to_string());
        latest_only.last_latest_new_links = Some(0);
        latest_only.next_backfill_page = 10;
        storage.put_progress(&latest_only).unwrap();

        let stored = storage.get_progress("Droit").unwrap().unwrap();
        assert_eq!(stored.last_latest_scanned_page, Some(6));
        assert_eq!(stored.last_latest_new_links, Some(0));
        assert_eq!(stored.last_backfill_scanned_page, Some(9));
        assert_eq!(
            stored.last_backfill_stopped_reason.as_deref(),
            Some("configured backfill depth reached")
        );
        assert_eq!(stored.next_backfill_page, 10);
    }

    #[test]
    fn test_list_progress_sorted() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.put_progress(&full_progress("Histoire")).unwrap();
        storage.put_progress(&full_progress("Droit")).unwrap();

        let all = storage.list_progress().unwrap();
        let names: Vec<_> = all.iter().map(|p| p.section.as_str()).collect();
        assert_eq!(names, vec!["Droit", "Histoire"]);
    }

    #[test]
    fn test_run_lifecycle() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("latest", "abc123").unwrap();
        assert!(run_id > 0);

        let running = storage.latest_running().unwrap().unwrap();
        assert_eq!(running.id, run_id);
        assert_eq!(running.mode, "latest");

        storage
            .finish_run(run_id, RunStatus::Completed, Some("{\"reason\":\"finished\"}"))
            .unwrap();
        assert!(storage.latest_running().unwrap().is_none());

        let run = storage.recent_runs(1).unwrap().remove(0);
        assert_eq!(run.id, run_id);
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.finished_at.is_some());
        assert_eq!(run.summary.as_deref(), Some("{\"reason\":\"finished\"}"));
    }

    #[test]
    fn test_finish_unknown_run() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let result = storage.finish_run(42, RunStatus::Interrupted, None);
        assert!(matches!(result, Err(StorageError::RunNotFound(42))));
    }

    #[test]
    fn test_recent_runs_newest_first() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let first = storage.create_run("full", "h").unwrap();
        let second = storage.create_run("backfill", "h").unwrap();

        let runs = storage.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, second);
        assert_eq!(runs[1].id, first);
        assert_eq!(storage.recent_runs(1).unwrap().len(), 1);
    }
}
