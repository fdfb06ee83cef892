//! Output module for run summaries and reports
//!
//! - `summary`: the JSON summary written at the end of every run
//! - `report`: stdout reports of a run and of stored progress

mod report;
mod summary;

pub use report::{load_progress, print_progress, print_summary, ProgressReport};
pub use summary::{build_summary, write_summary, RunSummary, SectionSummary};
