//! Resolved, immutable run settings
//!
//! A [`Config`] is what the file says. [`CrawlSettings`] is what a run uses:
//! the file merged with command-line overrides, the mode resolved, quotas
//! turned into [`Limit`]s and section URLs parsed. It is built once at run
//! start and never mutated afterwards.

use crate::config::types::{Config, ListingConfig, UserAgentConfig};
use crate::state::{Limit, RunMode};
use crate::ConfigError;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mode: Option<String>,
    pub max_pages: Option<i64>,
    pub max_items_per_section: Option<i64>,
    pub backfill_max_new_items: Option<i64>,
    pub stats_output_path: Option<PathBuf>,
}

/// A catalog section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub base_url: Url,
}

/// Quotas and thresholds consulted by the crawl controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlLimits {
    pub max_pages: Limit,
    pub max_items_per_section: Limit,
    pub latest_min_pages: u32,
    pub latest_known_page_streak: u32,
    pub backfill_pages_per_run: u32,
    pub backfill_max_new_items: Limit,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self {
            max_pages: Limit::Unbounded,
            max_items_per_section: Limit::Unbounded,
            latest_min_pages: 3,
            latest_known_page_streak: 2,
            backfill_pages_per_run: 3,
            backfill_max_new_items: Limit::AtMost(50),
        }
    }
}

/// HTTP and politeness settings for the page fetcher
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub max_concurrent_requests: usize,
    pub max_concurrent_requests_per_host: usize,
    pub download_delay: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

/// Everything a crawl run needs, resolved up front
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub mode: RunMode,
    pub limits: CrawlLimits,
    pub sections: Vec<Section>,
    pub listing: ListingConfig,
    pub fetch: FetchSettings,
    pub database_path: PathBuf,
    pub stats_output_path: Option<PathBuf>,
}

impl CrawlSettings {
    /// Resolves the settings of a run from a validated configuration
    pub fn resolve(config: &Config, overrides: &Overrides) -> Result<Self, ConfigError> {
        let crawler = &config.crawler;

        let mode_name = overrides.mode.as_deref().unwrap_or(&crawler.mode);
        let mode = RunMode::parse_or_default(mode_name);

        let limits = CrawlLimits {
            max_pages: Limit::from(overrides.max_pages.unwrap_or(crawler.max_pages)),
            max_items_per_section: Limit::from(
                overrides
                    .max_items_per_section
                    .unwrap_or(crawler.max_items_per_section),
            ),
            latest_min_pages: crawler.latest_min_pages,
            latest_known_page_streak: crawler.latest_known_page_streak,
            backfill_pages_per_run: crawler.backfill_pages_per_run,
            backfill_max_new_items: Limit::from(
                overrides
                    .backfill_max_new_items
                    .unwrap_or(crawler.backfill_max_new_items),
            ),
        };

        let sections = config
            .sections
            .iter()
            .map(|entry| {
                let base_url = Url::parse(&entry.url).map_err(|e| {
                    ConfigError::InvalidUrl(format!("Invalid section URL '{}': {}", entry.url, e))
                })?;
                Ok(Section {
                    name: entry.name.clone(),
                    base_url,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let fetch = FetchSettings {
            user_agent: format_user_agent(&config.user_agent),
            max_concurrent_requests: crawler.max_concurrent_requests as usize,
            max_concurrent_requests_per_host: crawler.max_concurrent_requests_per_host as usize,
            download_delay: Duration::from_millis(crawler.download_delay),
            request_timeout: Duration::from_secs(crawler.request_timeout),
            max_retries: crawler.max_retries,
            retry_delay: Duration::from_millis(crawler.retry_delay),
        };

        let stats_output_path = overrides
            .stats_output_path
            .clone()
            .or_else(|| config.output.stats_output_path.as_ref().map(PathBuf::from));

        Ok(Self {
            mode,
            limits,
            sections,
            listing: config.listing.clone(),
            fetch,
            database_path: PathBuf::from(&config.output.database_path),
            stats_output_path,
        })
    }
}

/// Formats the user agent header: `Name/Version (+ContactURL; ContactEmail)`
pub fn format_user_agent(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        toml::from_str(
            r#"
[crawler]
mode = "latest"
max-items-per-section = 200

[user-agent]
crawler-name = "FolioSweep"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./folio.db"

[[section]]
name = "Droit"
url = "https://droit.example.org/publications?tab=ouvrages"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_uses_file_values_and_defaults() {
        let settings = CrawlSettings::resolve(&config(), &Overrides::default()).unwrap();

        assert_eq!(settings.mode, RunMode::Latest);
        assert_eq!(settings.limits.max_pages, Limit::Unbounded);
        assert_eq!(settings.limits.max_items_per_section, Limit::AtMost(200));
        assert_eq!(settings.limits.backfill_max_new_items, Limit::AtMost(50));
        assert_eq!(settings.limits.latest_min_pages, 3);
        assert_eq!(settings.limits.latest_known_page_streak, 2);
        assert_eq!(settings.sections.len(), 1);
        assert_eq!(settings.sections[0].name, "Droit");
        assert!(settings.stats_output_path.is_none());
        assert_eq!(
            settings.fetch.user_agent,
            "FolioSweep/1.0 (+https://example.com/about; admin@example.com)"
        );
    }

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = Overrides {
            mode: Some("backfill".to_string()),
            max_pages: Some(4),
            max_items_per_section: Some(-1),
            backfill_max_new_items: Some(-5),
            stats_output_path: Some(PathBuf::from("/tmp/stats.json")),
        };
        let settings = CrawlSettings::resolve(&config(), &overrides).unwrap();

        assert_eq!(settings.mode, RunMode::Backfill);
        assert_eq!(settings.limits.max_pages, Limit::AtMost(4));
        assert_eq!(settings.limits.max_items_per_section, Limit::Unbounded);
        assert_eq!(settings.limits.backfill_max_new_items, Limit::Unbounded);
        assert_eq!(
            settings.stats_output_path,
            Some(PathBuf::from("/tmp/stats.json"))
        );
    }

    #[test]
    fn test_unknown_mode_falls_back_to_full() {
        let overrides = Overrides {
            mode: Some("sideways".to_string()),
            ..Overrides::default()
        };
        let settings = CrawlSettings::resolve(&config(), &overrides).unwrap();
        assert_eq!(settings.mode, RunMode::Full);
    }
}
