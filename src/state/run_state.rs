use crate::state::{RunMode, SectionCounters};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// Index of a section inside a [`RunState`]
pub type SectionId = usize;

/// Shared handle on the state of a run
///
/// Section tasks read the counters to take their stop decisions while item
/// fetch completions update them, so every access goes through the mutex.
pub type SharedRunState = Arc<Mutex<RunState>>;

/// In-memory state of one run
#[derive(Debug, Clone)]
pub struct RunState {
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub sections: Vec<SectionCounters>,

    /// Item fetches dispatched across all sections
    pub scheduled_new_items: u64,

    /// Items fetched and accepted across all sections
    pub total_new_items_scraped: u64,
}

impl RunState {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            sections: Vec::new(),
            scheduled_new_items: 0,
            total_new_items_scraped: 0,
        }
    }

    /// Registers a section and returns its id
    pub fn add_section(&mut self, counters: SectionCounters) -> SectionId {
        self.sections.push(counters);
        self.sections.len() - 1
    }

    pub fn section(&self, id: SectionId) -> &SectionCounters {
        &self.sections[id]
    }

    pub fn section_mut(&mut self, id: SectionId) -> &mut SectionCounters {
        &mut self.sections[id]
    }

    /// Item fetches still in flight across all sections
    pub fn total_pending(&self) -> u64 {
        self.sections.iter().map(|s| s.pending).sum()
    }

    pub fn all_stopped(&self) -> bool {
        self.sections.iter().all(|s| s.phase.is_stopped())
    }

    pub fn into_shared(self) -> SharedRunState {
        Arc::new(Mutex::new(self))
    }
}
