//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Folio-Sweep database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mode TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    summary TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_status ON runs(status);

-- Parsed catalog items, keyed by their URL-derived identifier
CREATE TABLE IF NOT EXISTS items (
    doc_id TEXT PRIMARY KEY,
    section TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT,
    document TEXT NOT NULL,
    scraped_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_section ON items(section);

-- One checkpoint per section
CREATE TABLE IF NOT EXISTS section_progress (
    section TEXT PRIMARY KEY,
    updated_at TEXT NOT NULL,
    last_latest_scanned_page INTEGER,
    last_latest_stopped_reason TEXT,
    last_latest_new_links INTEGER,
    last_backfill_scanned_page INTEGER,
    last_backfill_stopped_reason TEXT,
    last_backfill_new_links INTEGER,
    next_backfill_page INTEGER NOT NULL DEFAULT 1 CHECK (next_backfill_page >= 1)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
