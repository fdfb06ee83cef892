//! Crawler module for catalog fetching and crawl control
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic behind a politeness throttle
//! - Listing and item page extraction
//! - The per-section decision logic of the three run modes
//! - Overall run coordination

pub mod controller;
mod coordinator;
mod fetcher;
mod item;
mod listing;
mod oracle;
mod throttle;

pub use coordinator::{Coordinator, Stores};
pub use fetcher::{build_http_client, FetchError, HttpFetcher, PageFetcher};
pub use item::{ItemParser, ItemRecord};
pub use listing::{ListingEntry, ListingExtractor, ListingPage};
pub use oracle::{ItemStore, KnownItemOracle, ProgressBook};
pub use throttle::{Throttle, ThrottlePermit};
