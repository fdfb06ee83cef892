//! Crawler coordinator - run orchestration
//!
//! One task per section walks its listing pages strictly in sequence, item
//! fetches run concurrently on a shared task tracker, and every decision is
//! taken by the controller functions under the run-state lock. The lock is
//! never held across an await point.

use crate::config::{CrawlSettings, Section};
use crate::crawler::controller::{
    begin_page, decide_full, decide_incremental, full_page_failed, plan_section,
    record_item_completion, stop_section,
};
use crate::crawler::oracle::{ItemStore, KnownItemOracle, ProgressBook};
use crate::crawler::{ItemParser, ListingEntry, ListingExtractor, PageFetcher};
use crate::output::{build_summary, RunSummary};
use crate::state::{RunMode, RunState, SectionId, SharedRunState, StopReason};
use crate::storage::SqliteStorage;
use crate::url::listing_page_url;
use crate::FolioError;
use chrono::Utc;
use std::sync::{Arc, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// The store collaborators of a run
#[derive(Clone)]
pub struct Stores {
    pub known: KnownItemOracle,
    pub progress: ProgressBook,
    pub items: ItemStore,
}

impl Stores {
    /// All three contracts backed by one SQLite database
    pub fn sqlite(storage: Arc<SqliteStorage>) -> Self {
        Self {
            known: KnownItemOracle::new(storage.clone()),
            progress: ProgressBook::new(storage.clone()),
            items: ItemStore::new(storage),
        }
    }

    /// No store at all: nothing known, nothing checkpointed, nothing persisted
    pub fn unavailable() -> Self {
        Self {
            known: KnownItemOracle::unavailable(),
            progress: ProgressBook::unavailable(),
            items: ItemStore::unavailable(),
        }
    }
}

struct Shared {
    settings: CrawlSettings,
    fetcher: Arc<dyn PageFetcher>,
    stores: Stores,
    extractor: ListingExtractor,
    parser: ItemParser,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    shared: Arc<Shared>,
}

fn lock(state: &SharedRunState) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Coordinator {
    /// Creates a coordinator for one run
    ///
    /// Fails only if the listing selectors or item patterns do not compile.
    pub fn new(
        settings: CrawlSettings,
        fetcher: Arc<dyn PageFetcher>,
        stores: Stores,
    ) -> Result<Self, FolioError> {
        let extractor = ListingExtractor::new(&settings.listing)?;
        let parser = ItemParser::new()?;
        Ok(Self {
            shared: Arc::new(Shared {
                settings,
                fetcher,
                stores,
                extractor,
                parser,
            }),
        })
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.shared.settings
    }

    /// Runs every section to completion and returns the run summary
    ///
    /// Never fails: a section that cannot go on records why in its stop
    /// reason. Cancelling `cancel` stops sections before their next listing
    /// page; item fetches already dispatched are allowed to finish.
    pub async fn run(&self, cancel: CancellationToken) -> RunSummary {
        let state = self.walk(&cancel).await;
        self.summarize(&state, &cancel)
    }

    /// Walks every section and waits for all dispatched item fetches
    async fn walk(&self, cancel: &CancellationToken) -> SharedRunState {
        let settings = &self.shared.settings;
        let mode = settings.mode;
        tracing::info!(
            "Starting {} run over {} section(s)",
            mode,
            settings.sections.len()
        );

        let mut state = RunState::new(mode);
        let mut planned = Vec::with_capacity(settings.sections.len());
        for section in &settings.sections {
            let progress = match mode {
                RunMode::Backfill => self.shared.stores.progress.get(&section.name).await,
                RunMode::Full | RunMode::Latest => None,
            };
            let counters = plan_section(mode, &section.name, progress.as_ref(), &settings.limits);
            tracing::info!(
                "Section '{}' starts at page {}",
                section.name,
                counters.start_page
            );
            planned.push((state.add_section(counters), section.clone()));
        }
        let state = state.into_shared();

        let tracker = TaskTracker::new();
        let handles: Vec<_> = planned
            .into_iter()
            .map(|(id, section)| {
                let task = SectionTask {
                    shared: self.shared.clone(),
                    state: state.clone(),
                    tracker: tracker.clone(),
                    cancel: cancel.clone(),
                    id,
                    section,
                };
                (id, tokio::spawn(task.run()))
            })
            .collect();

        for (id, handle) in handles {
            if let Err(e) = handle.await {
                tracing::error!("Section task {} aborted: {}", id, e);
                let counters = {
                    let mut guard = lock(&state);
                    stop_section(&mut guard, id, StopReason::SectionAborted(e.to_string()));
                    guard.section(id).clone()
                };
                self.shared.stores.progress.save(&counters, mode).await;
            }
        }

        tracker.close();
        if !tracker.is_empty() {
            tracing::info!("Waiting for {} item fetch(es) to finish", tracker.len());
        }
        tracker.wait().await;
        state
    }

    fn summarize(&self, state: &SharedRunState, cancel: &CancellationToken) -> RunSummary {
        let reason = if cancel.is_cancelled() {
            "cancelled"
        } else {
            "finished"
        };
        let guard = lock(state);
        debug_assert!(guard.all_stopped());
        if guard.total_pending() > 0 {
            tracing::warn!("{} item fetch(es) never reported back", guard.total_pending());
        }
        tracing::info!(
            "Run {}: {} item(s) scheduled, {} scraped",
            reason,
            guard.scheduled_new_items,
            guard.total_new_items_scraped
        );
        build_summary(
            &guard,
            reason,
            Utc::now(),
            self.shared.settings.limits.backfill_max_new_items,
        )
    }
}

/// The page loop of one section
struct SectionTask {
    shared: Arc<Shared>,
    state: SharedRunState,
    tracker: TaskTracker,
    cancel: CancellationToken,
    id: SectionId,
    section: Section,
}

impl SectionTask {
    async fn run(self) {
        let settings = &self.shared.settings;
        let mode = settings.mode;

        loop {
            let next = begin_page(&mut lock(&self.state), self.id);
            let Some(page) = next else {
                break;
            };

            if self.cancel.is_cancelled() {
                self.stop(StopReason::Cancelled);
                break;
            }

            let url = listing_page_url(
                &self.section.base_url,
                &settings.listing.page_parameter,
                page,
            );
            tracing::debug!("Fetching page {} of '{}': {}", page, self.section.name, url);

            let fetched = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.stop(StopReason::Cancelled);
                    break;
                }
                fetched = self.shared.fetcher.fetch(&url) => fetched,
            };
            let body = match fetched {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(
                        "Listing page {} of '{}' failed: {}",
                        page,
                        self.section.name,
                        e
                    );
                    if mode.is_incremental() {
                        self.stop(StopReason::ListingFetchFailed(e.to_string()));
                        break;
                    }
                    let decision = full_page_failed(
                        &mut lock(&self.state),
                        self.id,
                        page,
                        &e.to_string(),
                        &settings.limits,
                    );
                    if decision.next_page.is_none() {
                        break;
                    }
                    continue;
                }
            };

            let listing = self.shared.extractor.extract(&body, &url);
            let known = if mode.is_incremental() {
                let identifiers: Vec<String> = listing
                    .entries
                    .iter()
                    .map(|entry| entry.identifier.clone())
                    .collect();
                Some(self.shared.stores.known.lookup(&identifiers).await)
            } else {
                None
            };

            let decision = {
                let mut guard = lock(&self.state);
                match &known {
                    Some(known) => decide_incremental(
                        &mut guard,
                        self.id,
                        page,
                        listing,
                        known,
                        &settings.limits,
                    ),
                    None => decide_full(&mut guard, self.id, page, listing, &settings.limits),
                }
            };

            for entry in decision.dispatch {
                self.spawn_item(entry);
            }
            if decision.next_page.is_none() {
                break;
            }
        }

        let counters = lock(&self.state).section(self.id).clone();
        match counters.stop_reason() {
            Some(reason) if reason.is_failure() => tracing::warn!(
                "Section '{}' stopped after {} page(s): {}",
                counters.name,
                counters.pages_scanned,
                reason
            ),
            Some(reason) => tracing::info!(
                "Section '{}' stopped after {} page(s): {}",
                counters.name,
                counters.pages_scanned,
                reason
            ),
            None => {}
        }
        self.shared.stores.progress.save(&counters, mode).await;
    }

    fn stop(&self, reason: StopReason) {
        tracing::info!("Stopping section '{}': {}", self.section.name, reason);
        stop_section(&mut lock(&self.state), self.id, reason);
    }

    /// Fetches, parses and stores one item in the background
    fn spawn_item(&self, entry: ListingEntry) {
        let shared = self.shared.clone();
        let state = self.state.clone();
        let id = self.id;
        let section = self.section.name.clone();

        self.tracker.spawn(async move {
            let outcome = match shared.fetcher.fetch(&entry.url).await {
                Ok(html) => shared
                    .parser
                    .parse(&html, &entry.url, &section)
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            let keep = record_item_completion(
                &mut lock(&state),
                id,
                outcome.is_ok(),
                &shared.settings.limits,
            );

            match outcome {
                Ok(item) if keep => {
                    shared.stores.items.upsert(item).await;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Item {} of '{}' failed: {}", entry.identifier, section, e)
                }
            }
        });
    }
}
