//! Run summary building and JSON output
//!
//! The summary is a pure function of the final run state. It is written as
//! pretty-printed JSON where every non-ASCII character is escaped, so the
//! file stays readable whatever encoding the consumer assumes.

use crate::state::{Limit, RunMode, RunState};
use crate::FolioError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// Final report of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub mode: RunMode,
    /// `finished`, or `cancelled` when the run was interrupted
    pub reason: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub backfill_max_new_items: Limit,
    pub scheduled_new_items: u64,
    pub total_new_items_scraped: u64,
    pub sections: BTreeMap<String, SectionSummary>,
}

/// Counters of one section at the end of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    pub start_page: u32,
    pub last_page_scanned: u32,
    pub pages_scanned: u32,
    pub known_page_streak: u32,
    pub new_links_found: u64,
    pub new_items_scraped: u64,
    pub new_items_failed: u64,
    pub stopped_reason: String,
}

/// Builds the summary of a finished run
pub fn build_summary(
    state: &RunState,
    reason: &str,
    finished_at: DateTime<Utc>,
    backfill_max_new_items: Limit,
) -> RunSummary {
    let sections = state
        .sections
        .iter()
        .map(|section| {
            let summary = SectionSummary {
                start_page: section.start_page,
                last_page_scanned: section.last_page_scanned,
                pages_scanned: section.pages_scanned,
                known_page_streak: section.known_page_streak,
                new_links_found: section.new_links_found,
                new_items_scraped: section.scraped,
                new_items_failed: section.failed,
                stopped_reason: section
                    .stop_reason()
                    .map(|r| r.to_db_string())
                    .unwrap_or_default(),
            };
            (section.name.clone(), summary)
        })
        .collect();

    RunSummary {
        mode: state.mode,
        reason: reason.to_string(),
        started_at: state.started_at,
        finished_at,
        backfill_max_new_items,
        scheduled_new_items: state.scheduled_new_items,
        total_new_items_scraped: state.total_new_items_scraped,
        sections,
    }
}

impl RunSummary {
    /// Pretty-printed, ASCII-only JSON
    pub fn to_ascii_json(&self) -> Result<String, FolioError> {
        let pretty = serde_json::to_string_pretty(self)?;
        Ok(escape_non_ascii(&pretty))
    }
}

/// Writes the summary to `path`
pub fn write_summary(summary: &RunSummary, path: &Path) -> Result<(), FolioError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut json = summary.to_ascii_json()?;
    json.push('\n');
    std::fs::write(path, json)?;
    Ok(())
}

/// Replaces every non-ASCII character with its `\uXXXX` escape
///
/// Characters outside the Basic Multilingual Plane become a surrogate pair.
/// Only valid on serialized JSON, where such characters can only appear
/// inside strings.
fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{:04x}", unit);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{SectionCounters, StopReason};
    use tempfile::TempDir;

    fn finished_state() -> RunState {
        let mut state = RunState::new(RunMode::Backfill);
        let mut droit = SectionCounters::new("Droit", 4);
        droit.mark_page_scanned(4);
        droit.mark_page_scanned(5);
        droit.new_links_found = 7;
        droit.scheduled = 7;
        droit.scraped = 6;
        droit.failed = 1;
        droit.stop(StopReason::BackfillWindowReached);
        state.add_section(droit);

        let mut economie = SectionCounters::new("Économie", 1);
        economie.stop(StopReason::ListingFetchFailed("HTTP 503".to_string()));
        state.add_section(economie);

        state.scheduled_new_items = 7;
        state.total_new_items_scraped = 6;
        state
    }

    #[test]
    fn test_build_summary() {
        let state = finished_state();
        let summary = build_summary(&state, "finished", Utc::now(), Limit::AtMost(50));

        assert_eq!(summary.mode, RunMode::Backfill);
        assert_eq!(summary.scheduled_new_items, 7);
        assert_eq!(summary.total_new_items_scraped, 6);

        let droit = &summary.sections["Droit"];
        assert_eq!(droit.start_page, 4);
        assert_eq!(droit.last_page_scanned, 5);
        assert_eq!(droit.pages_scanned, 2);
        assert_eq!(droit.new_items_scraped, 6);
        assert_eq!(droit.stopped_reason, "configured backfill depth reached");

        assert_eq!(
            summary.sections["Économie"].stopped_reason,
            "listing fetch failed: HTTP 503"
        );
    }

    #[test]
    fn test_json_shape() {
        let summary = build_summary(&finished_state(), "cancelled", Utc::now(), Limit::Unbounded);
        let json = summary.to_ascii_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["mode"], "backfill");
        assert_eq!(value["reason"], "cancelled");
        assert_eq!(value["backfill_max_new_items"], -1);
        assert_eq!(value["sections"]["Droit"]["new_links_found"], 7);
        assert!(value["started_at"].is_string());
        assert!(value["sections"]["Économie"].is_object());
    }

    #[test]
    fn test_json_is_ascii_only() {
        let summary = build_summary(&finished_state(), "finished", Utc::now(), Limit::AtMost(50));
        let json = summary.to_ascii_json().unwrap();

        assert!(json.is_ascii());
        assert!(json.contains("\\u00c9conomie"));
        assert!(json.contains("\n  \"mode\""));
    }

    #[test]
    fn test_escape_outside_basic_plane() {
        assert_eq!(escape_non_ascii("\"é𝄞\""), "\"\\u00e9\\ud834\\udd1e\"");
    }

    #[test]
    fn test_write_summary_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats").join("run.json");
        let summary = build_summary(&finished_state(), "finished", Utc::now(), Limit::AtMost(50));

        write_summary(&summary, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["total_new_items_scraped"], 6);
    }
}
