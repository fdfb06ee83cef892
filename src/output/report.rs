//! Human-readable reports printed to stdout

use crate::output::RunSummary;
use crate::state::StopReason;
use crate::storage::{ItemSink, ProgressStore, RunLog, RunRecord, SectionProgress};
use crate::FolioError;

/// Prints the summary of a finished run
pub fn print_summary(summary: &RunSummary) {
    println!("=== Run Summary ({}) ===\n", summary.mode);

    println!("Overview:");
    println!("  Outcome: {}", summary.reason);
    println!(
        "  Duration: {}s",
        (summary.finished_at - summary.started_at).num_seconds().max(0)
    );
    println!("  Items scheduled: {}", summary.scheduled_new_items);
    println!("  Items scraped: {}", summary.total_new_items_scraped);
    if summary.mode.is_incremental() {
        println!("  Backfill item budget: {}", summary.backfill_max_new_items);
    }
    println!();

    println!("Sections:");
    for (name, section) in &summary.sections {
        println!(
            "  {}: pages {}..{} ({} scanned), {} new, {} scraped, {} failed",
            name,
            section.start_page,
            section.last_page_scanned,
            section.pages_scanned,
            section.new_links_found,
            section.new_items_scraped,
            section.new_items_failed
        );
        println!("    stopped: {}", section.stopped_reason);
    }
}

/// What the store knows about past runs
#[derive(Debug, Clone)]
pub struct ProgressReport {
    pub total_items: u64,
    pub sections: Vec<SectionProgress>,
    pub recent_runs: Vec<RunRecord>,
}

/// Loads the progress report from the store
pub fn load_progress<S>(storage: &S, run_limit: usize) -> Result<ProgressReport, FolioError>
where
    S: ItemSink + ProgressStore + RunLog,
{
    Ok(ProgressReport {
        total_items: storage.count_items(None)?,
        sections: storage.list_progress()?,
        recent_runs: storage.recent_runs(run_limit)?,
    })
}

fn show(value: Option<impl std::fmt::Display>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// A stored stop reason, flagged when the section ended on an error
fn show_reason(reason: Option<&str>) -> String {
    match reason {
        Some(text) if StopReason::from_db_string(text).is_some_and(|r| r.is_failure()) => {
            format!("{} [!]", text)
        }
        other => show(other),
    }
}

/// Prints a progress report
pub fn print_progress(report: &ProgressReport) {
    println!("=== Crawl Progress ===\n");
    println!("Items stored: {}", report.total_items);
    println!();

    if report.sections.is_empty() {
        println!("No section checkpoints yet.");
    } else {
        println!("Sections:");
        for progress in &report.sections {
            println!("  {} (updated {})", progress.section, progress.updated_at.to_rfc3339());
            println!(
                "    latest:   last page {}, {} new links, {}",
                show(progress.last_latest_scanned_page),
                show(progress.last_latest_new_links),
                show_reason(progress.last_latest_stopped_reason.as_deref())
            );
            println!(
                "    backfill: last page {}, {} new links, {}",
                show(progress.last_backfill_scanned_page),
                show(progress.last_backfill_new_links),
                show_reason(progress.last_backfill_stopped_reason.as_deref())
            );
            println!("    next backfill page: {}", progress.next_backfill_page);
        }
    }
    println!();

    if !report.recent_runs.is_empty() {
        println!("Recent runs:");
        for run in &report.recent_runs {
            println!(
                "  #{} {} {} started {} finished {}",
                run.id,
                run.mode,
                run.status.to_db_string(),
                run.started_at,
                show(run.finished_at.as_deref())
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::ItemRecord;
    use crate::storage::{RunStatus, SqliteStorage};
    use chrono::Utc;

    #[test]
    fn test_load_progress() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .upsert_item(&ItemRecord {
                doc_id: "ouvrage/a".to_string(),
                section: "Droit".to_string(),
                ..ItemRecord::default()
            })
            .unwrap();
        let mut progress = SectionProgress::new("Droit", Utc::now());
        progress.next_backfill_page = 6;
        storage.put_progress(&progress).unwrap();
        let run = storage.create_run("backfill", "abc").unwrap();
        storage.finish_run(run, RunStatus::Completed, None).unwrap();

        let report = load_progress(&storage, 5).unwrap();
        assert_eq!(report.total_items, 1);
        assert_eq!(report.sections.len(), 1);
        assert_eq!(report.sections[0].next_backfill_page, 6);
        assert_eq!(report.recent_runs.len(), 1);
        assert_eq!(report.recent_runs[0].status, RunStatus::Completed);

        print_progress(&report);
    }

    #[test]
    fn test_show_placeholder() {
        assert_eq!(show(None::<u32>), "-");
        assert_eq!(show(Some(3)), "3");
        assert_eq!(show_reason(None), "-");
        assert_eq!(show_reason(Some("known page streak reached")), "known page streak reached");
        assert_eq!(
            show_reason(Some("listing fetch failed: HTTP 503")),
            "listing fetch failed: HTTP 503 [!]"
        );
    }
}
