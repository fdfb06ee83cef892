//! Crawl controller decision logic
//!
//! Everything here is synchronous and runs under the run-state lock: the
//! section tasks do the I/O, then hand the fetched page to one of these
//! functions, which updates the counters, picks the items to fetch and moves
//! the section state machine forward.
//!
//! ```text
//! NeedsPage(n) -> AwaitingPage(n) -> Deciding(n) -> NeedsPage(n + 1)
//!                                                -> Stopped(reason)
//! ```

use crate::config::CrawlLimits;
use crate::crawler::listing::{ListingEntry, ListingPage};
use crate::state::{
    Limit, PlannedEnd, RunMode, RunState, SectionCounters, SectionId, SectionPhase, StopReason,
};
use crate::storage::SectionProgress;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Outcome of deciding on one listing page
#[derive(Debug, Default)]
pub struct PageDecision {
    /// Item pages to fetch, in listing order
    pub dispatch: Vec<ListingEntry>,

    /// Next listing page to fetch; `None` once the section stopped
    pub next_page: Option<u32>,
}

impl PageDecision {
    fn stopped(dispatch: Vec<ListingEntry>) -> Self {
        Self {
            dispatch,
            next_page: None,
        }
    }
}

/// Builds the counters of a section at run start
///
/// `full` and `latest` start at page 1. `backfill` resumes at the stored
/// cursor (page 1 if the section never ran) and fixes its window end up front.
pub fn plan_section(
    mode: RunMode,
    name: &str,
    progress: Option<&SectionProgress>,
    limits: &CrawlLimits,
) -> SectionCounters {
    match mode {
        RunMode::Backfill => {
            let start = progress.map(|p| p.next_backfill_page).unwrap_or(1).max(1);
            let window = limits.backfill_pages_per_run.max(1);
            let mut counters = SectionCounters::new(name, start);
            counters.planned_end = Some(PlannedEnd {
                page: start.saturating_add(window - 1),
                reason: StopReason::BackfillWindowReached,
            });
            counters
        }
        RunMode::Full | RunMode::Latest => SectionCounters::new(name, 1),
    }
}

/// Claims the next page of a section, or `None` if the section stopped
pub fn begin_page(state: &mut RunState, id: SectionId) -> Option<u32> {
    let section = state.section_mut(id);
    match section.phase {
        SectionPhase::NeedsPage(page) => {
            section.transition(SectionPhase::AwaitingPage(page));
            Some(page)
        }
        _ => None,
    }
}

/// Stops a section from outside the decision functions (fetch failure, cancellation)
pub fn stop_section(state: &mut RunState, id: SectionId, reason: StopReason) {
    state.section_mut(id).stop(reason);
}

/// Decides on a page of a `latest` or `backfill` run
///
/// `known` holds the identifiers of the page already in the store.
pub fn decide_incremental(
    state: &mut RunState,
    id: SectionId,
    page: u32,
    listing: ListingPage,
    known: &HashSet<String>,
    limits: &CrawlLimits,
) -> PageDecision {
    let mode = state.mode;
    let budget_left = limits
        .backfill_max_new_items
        .remaining(state.scheduled_new_items);

    let section = state.section_mut(id);
    section.transition(SectionPhase::Deciding(page));

    if listing.entries.is_empty() {
        tracing::warn!("No listing entries on page {} of '{}'", page, section.name);
        section.mark_page_scanned(page);
        section.stop(StopReason::NoListingEntries);
        return PageDecision::stopped(Vec::new());
    }

    let mut unknown: Vec<ListingEntry> = listing
        .entries
        .into_iter()
        .filter(|entry| !known.contains(&entry.identifier))
        .collect();

    if let Some(left) = limits
        .max_items_per_section
        .remaining(section.committed_items())
    {
        if left == 0 {
            section.stop(StopReason::MaxItemsPerSection);
            return PageDecision::stopped(Vec::new());
        }
        unknown.truncate(usize::try_from(left).unwrap_or(usize::MAX));
    }

    if mode == RunMode::Backfill {
        match budget_left {
            Some(0) => {
                section.stop(StopReason::BackfillBudgetExhausted);
                return PageDecision::stopped(Vec::new());
            }
            Some(left) => unknown.truncate(usize::try_from(left).unwrap_or(usize::MAX)),
            None => {}
        }
    }

    let dispatched = unknown.len() as u64;
    for _ in &unknown {
        section.reserve_pending_slot();
    }
    section.mark_page_scanned(page);
    section.new_links_found += dispatched;

    if dispatched == 0 {
        section.known_page_streak += 1;
    } else {
        section.known_page_streak = 0;
    }

    tracing::debug!(
        "Section '{}' page {}: {} new, streak {}",
        section.name,
        page,
        dispatched,
        section.known_page_streak
    );

    state.scheduled_new_items += dispatched;

    match stop_reason(state, id, page, listing.last_page, limits) {
        Some(reason) => {
            state.section_mut(id).stop(reason);
            PageDecision::stopped(unknown)
        }
        None => {
            state
                .section_mut(id)
                .transition(SectionPhase::NeedsPage(page + 1));
            PageDecision {
                dispatch: unknown,
                next_page: Some(page + 1),
            }
        }
    }
}

/// Evaluates the stop conditions of an incremental run after a page was scanned
///
/// Conditions are checked in order and the first that holds wins.
pub fn stop_reason(
    state: &RunState,
    id: SectionId,
    page: u32,
    last_page_on_site: Option<u32>,
    limits: &CrawlLimits,
) -> Option<StopReason> {
    let section = state.section(id);

    if limits.max_pages.is_reached(u64::from(section.pages_scanned)) {
        return Some(StopReason::MaxPages);
    }

    if limits
        .max_items_per_section
        .is_reached(section.committed_items())
    {
        return Some(StopReason::MaxItemsPerSection);
    }

    if let Some(last) = last_page_on_site {
        if page >= last {
            return Some(StopReason::LastPageOnSite);
        }
    }

    match state.mode {
        RunMode::Latest => {
            let enough_pages = section.pages_scanned >= limits.latest_min_pages.max(1);
            let streak_reached =
                section.known_page_streak >= limits.latest_known_page_streak.max(1);
            if enough_pages && streak_reached {
                return Some(StopReason::KnownPageStreak);
            }
        }
        RunMode::Backfill => {
            if limits
                .backfill_max_new_items
                .is_reached(state.scheduled_new_items)
            {
                return Some(StopReason::BackfillBudgetExhausted);
            }
            if let Some(end) = &section.planned_end {
                if page >= end.page {
                    return Some(end.reason.clone());
                }
            }
        }
        RunMode::Full => {}
    }

    None
}

/// Decides on a page of a `full` run
///
/// Every entry is new as far as a full run is concerned. Page 1 fixes how
/// many pages the run will walk; an empty page after it is skipped.
pub fn decide_full(
    state: &mut RunState,
    id: SectionId,
    page: u32,
    listing: ListingPage,
    limits: &CrawlLimits,
) -> PageDecision {
    let section = state.section_mut(id);
    section.transition(SectionPhase::Deciding(page));

    if listing.entries.is_empty() {
        tracing::warn!("No listing entries on page {} of '{}'", page, section.name);
        if section.planned_end.is_none() {
            section.stop(StopReason::NoListingEntries);
            return PageDecision::stopped(Vec::new());
        }
        return PageDecision {
            dispatch: Vec::new(),
            next_page: advance_full(section, page, limits),
        };
    }

    let items_per_page = listing.entries.len();
    section.mark_page_scanned(page);

    let mut entries = listing.entries;
    if let Some(left) = limits
        .max_items_per_section
        .remaining(section.committed_items())
    {
        if left == 0 {
            section.stop(StopReason::MaxItemsPerSection);
            return PageDecision::stopped(Vec::new());
        }
        entries.truncate(usize::try_from(left).unwrap_or(usize::MAX));
    }

    let dispatched = entries.len() as u64;
    for _ in &entries {
        section.reserve_pending_slot();
    }
    section.new_links_found += dispatched;

    if page == section.start_page {
        let end = full_end_page(listing.last_page, items_per_page, limits);
        tracing::debug!(
            "Section '{}' will walk {} page(s) ({})",
            section.name,
            end.page,
            end.reason
        );
        section.planned_end = Some(end);
    }

    let next_page = advance_full(section, page, limits);
    state.scheduled_new_items += dispatched;

    PageDecision {
        dispatch: entries,
        next_page,
    }
}

/// Handles a listing page of a `full` run that could not be fetched
///
/// Page 1 decides the walk, so failing to fetch it stops the section. Later
/// pages are skipped and the walk moves on to the next one.
pub fn full_page_failed(
    state: &mut RunState,
    id: SectionId,
    page: u32,
    cause: &str,
    limits: &CrawlLimits,
) -> PageDecision {
    let section = state.section_mut(id);
    if section.planned_end.is_none() {
        section.stop(StopReason::ListingFetchFailed(cause.to_string()));
        return PageDecision::stopped(Vec::new());
    }

    section.transition(SectionPhase::Deciding(page));
    tracing::warn!(
        "Skipping page {} of '{}' after a failed fetch: {}",
        page,
        section.name,
        cause
    );
    PageDecision {
        dispatch: Vec::new(),
        next_page: advance_full(section, page, limits),
    }
}

/// Moves a `full` section past `page`, or stops it at its planned end or quota
fn advance_full(section: &mut SectionCounters, page: u32, limits: &CrawlLimits) -> Option<u32> {
    let reason = if limits
        .max_items_per_section
        .is_reached(section.committed_items())
    {
        Some(StopReason::MaxItemsPerSection)
    } else {
        section
            .planned_end
            .as_ref()
            .filter(|end| page >= end.page)
            .map(|end| end.reason.clone())
    };

    match reason {
        Some(reason) => {
            section.stop(reason);
            None
        }
        None => {
            section.transition(SectionPhase::NeedsPage(page + 1));
            Some(page + 1)
        }
    }
}

/// Computes the last page a `full` run walks, from what page 1 showed
///
/// Starts from the last page advertised by the site (1 if none), then caps it
/// by `max-pages` and by the number of pages needed to fill the item quota.
pub fn full_end_page(
    last_page_on_site: Option<u32>,
    items_per_page: usize,
    limits: &CrawlLimits,
) -> PlannedEnd {
    let mut end = match last_page_on_site {
        Some(last) => PlannedEnd {
            page: last,
            reason: StopReason::LastPageOnSite,
        },
        None => PlannedEnd {
            page: 1,
            reason: StopReason::PlannedPagesDone,
        },
    };

    if let Limit::AtMost(max) = limits.max_pages {
        let max = u32::try_from(max).unwrap_or(u32::MAX);
        if max < end.page {
            end = PlannedEnd {
                page: max,
                reason: StopReason::MaxPages,
            };
        }
    }

    if let (Limit::AtMost(quota), true) = (limits.max_items_per_section, items_per_page > 0) {
        let pages = quota.div_ceil(items_per_page as u64);
        let pages = u32::try_from(pages).unwrap_or(u32::MAX);
        if pages < end.page {
            end = PlannedEnd {
                page: pages,
                reason: StopReason::MaxItemsPerSection,
            };
        }
    }

    end
}

/// Records the completion of one item fetch
///
/// Releases the pending slot whatever the outcome. Returns whether the item
/// should be kept: failures are not, and neither is a success arriving after
/// the section's item quota is already filled.
pub fn record_item_completion(
    state: &mut RunState,
    id: SectionId,
    succeeded: bool,
    limits: &CrawlLimits,
) -> bool {
    let section = state.section_mut(id);
    section.consume_pending_slot();

    if !succeeded {
        section.failed += 1;
        return false;
    }

    if limits.max_items_per_section.is_reached(section.scraped) {
        tracing::debug!("Dropping item of '{}': quota already filled", section.name);
        return false;
    }

    section.scraped += 1;
    state.total_new_items_scraped += 1;
    true
}

/// Builds the checkpoint of a section that finished an incremental run
///
/// Returns `None` for `full` runs, which keep no progress.
///
/// # Resume Cursor
///
/// | Mode | `next_backfill_page` |
/// |------|----------------------|
/// | latest | `max(stored, last_scanned + 1)` |
/// | backfill | `last_scanned + 1`, or the stored cursor if no page was scanned |
pub fn checkpoint(
    section: &SectionCounters,
    mode: RunMode,
    stored: Option<&SectionProgress>,
    now: DateTime<Utc>,
) -> Option<SectionProgress> {
    let stored_cursor = stored.map(|p| p.next_backfill_page).unwrap_or(1).max(1);
    let reason = section
        .stop_reason()
        .map(|r| r.to_db_string())
        .unwrap_or_default();

    let mut progress = SectionProgress::new(section.name.clone(), now);
    match mode {
        RunMode::Full => return None,
        RunMode::Latest => {
            progress.last_latest_scanned_page = Some(section.last_page_scanned);
            progress.last_latest_stopped_reason = Some(reason);
            progress.last_latest_new_links = Some(section.new_links_found);
            progress.next_backfill_page = stored_cursor.max(section.last_page_scanned + 1);
        }
        RunMode::Backfill => {
            progress.last_backfill_scanned_page = Some(section.last_page_scanned);
            progress.last_backfill_stopped_reason = Some(reason);
            progress.last_backfill_new_links = Some(section.new_links_found);
            progress.next_backfill_page = if section.pages_scanned == 0 {
                stored_cursor.max(section.start_page)
            } else {
                section.last_page_scanned + 1
            };
        }
    }

    Some(progress)
}
