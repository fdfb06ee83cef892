use crate::state::StopReason;

/// Where a section is in its page sequence
///
/// A section only ever has one listing page in flight:
///
/// ```text
/// NeedsPage(n) -> AwaitingPage(n) -> Deciding(n) -> NeedsPage(n + 1)
///                                                \-> Stopped(reason)
/// ```
///
/// Any phase that is not already stopped may also jump to `Stopped` (fetch
/// failure, cancellation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionPhase {
    NeedsPage(u32),
    AwaitingPage(u32),
    Deciding(u32),
    Stopped(StopReason),
}

impl SectionPhase {
    pub fn can_transition_to(&self, next: &SectionPhase) -> bool {
        use SectionPhase::*;
        match (self, next) {
            (Stopped(_), _) => false,
            (_, Stopped(_)) => true,
            (NeedsPage(a), AwaitingPage(b)) => a == b,
            (AwaitingPage(a), Deciding(b)) => a == b,
            (Deciding(a), NeedsPage(b)) => b > a,
            _ => false,
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped(_))
    }
}

/// The page a section run stops at, and the reason reported when it does
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEnd {
    pub page: u32,
    pub reason: StopReason,
}

/// Live counters of one section during a run
#[derive(Debug, Clone)]
pub struct SectionCounters {
    /// Section name
    pub name: String,

    /// First page this run fetched
    pub start_page: u32,

    /// Last page this run intends to scan, once known
    pub planned_end: Option<PlannedEnd>,

    /// Number of the most recently scanned page (0 if none)
    pub last_page_scanned: u32,

    /// Listing pages scanned this run
    pub pages_scanned: u32,

    /// Consecutive scanned pages whose entries were all known
    pub known_page_streak: u32,

    /// Unknown entries dispatched for fetching
    pub new_links_found: u64,

    /// Item fetches dispatched
    pub scheduled: u64,

    /// Item fetches still in flight
    pub pending: u64,

    /// Items fetched and accepted
    pub scraped: u64,

    /// Item fetches that failed
    pub failed: u64,

    /// Current phase of the page sequence
    pub phase: SectionPhase,
}

impl SectionCounters {
    pub fn new(name: impl Into<String>, start_page: u32) -> Self {
        let start_page = start_page.max(1);
        Self {
            name: name.into(),
            start_page,
            planned_end: None,
            last_page_scanned: 0,
            pages_scanned: 0,
            known_page_streak: 0,
            new_links_found: 0,
            scheduled: 0,
            pending: 0,
            scraped: 0,
            failed: 0,
            phase: SectionPhase::NeedsPage(start_page),
        }
    }

    /// Moves to the next phase
    pub fn transition(&mut self, next: SectionPhase) {
        debug_assert!(
            self.phase.can_transition_to(&next),
            "invalid section transition {:?} -> {:?}",
            self.phase,
            next
        );
        tracing::trace!("Section '{}': {:?} -> {:?}", self.name, self.phase, next);
        self.phase = next;
    }

    /// Stops the section unless it already stopped
    pub fn stop(&mut self, reason: StopReason) {
        if !self.phase.is_stopped() {
            self.transition(SectionPhase::Stopped(reason));
        }
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        match &self.phase {
            SectionPhase::Stopped(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn mark_page_scanned(&mut self, page: u32) {
        self.pages_scanned += 1;
        self.last_page_scanned = page;
    }

    /// Items counted against the per-section quota
    ///
    /// Scraped plus in flight, and never less than what was dispatched: a
    /// failed fetch keeps its slot so dispatches can never exceed the quota.
    pub fn committed_items(&self) -> u64 {
        (self.scraped + self.pending).max(self.scheduled)
    }

    /// Records one dispatched item fetch
    pub fn reserve_pending_slot(&mut self) {
        self.scheduled += 1;
        self.pending += 1;
    }

    /// Releases the slot of a finished item fetch; never goes below zero
    pub fn consume_pending_slot(&mut self) {
        self.pending = self.pending.saturating_sub(1);
    }
}
