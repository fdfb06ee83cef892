//! State module for tracking crawl progress
//!
//! This module provides the in-memory state of a run.
//!
//! # Components
//!
//! - `RunMode`: which of the three crawl strategies a run uses
//! - `Limit`: a page or item quota, possibly unbounded
//! - `StopReason`: why a section stopped paginating
//! - `SectionPhase` / `SectionCounters`: the per-section state machine and counters
//! - `RunState`: all sections plus run-wide counters
//! - `HostState`: per-host politeness bookkeeping for the throttle

mod host_state;
mod quota;
mod run_mode;
mod run_state;
mod section_state;
mod stop_reason;

// Re-export main types
pub use host_state::HostState;
pub use quota::Limit;
pub use run_mode::RunMode;
pub use run_state::{RunState, SectionId, SharedRunState};
pub use section_state::{PlannedEnd, SectionCounters, SectionPhase};
pub use stop_reason::StopReason;
