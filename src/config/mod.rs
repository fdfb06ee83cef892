//! Configuration module for Folio-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and resolving them (together with command-line overrides) into the immutable
//! settings of a run.
//!
//! # Example
//!
//! ```no_run
//! use folio_sweep::config::{load_config, CrawlSettings, Overrides};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("folio.toml")).unwrap();
//! let settings = CrawlSettings::resolve(&config, &Overrides::default()).unwrap();
//! println!("Crawling {} sections in {} mode", settings.sections.len(), settings.mode);
//! ```

mod parser;
mod settings;
mod types;
mod validation;

// Re-export types
pub use settings::{
    format_user_agent, CrawlLimits, CrawlSettings, FetchSettings, Overrides, Section,
};
pub use types::{Config, CrawlerConfig, ListingConfig, OutputConfig, SectionEntry, UserAgentConfig};

// Re-export parser functions
pub use parser::{load_config, load_config_with_hash, parse_config};
