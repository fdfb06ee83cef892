use serde::Deserialize;

/// Main configuration structure for Folio-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "section")]
    pub sections: Vec<SectionEntry>,
}

/// Crawler behavior configuration
///
/// Every quota is a signed integer in the file: a negative value means
/// "unbounded".
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Run mode name (`full`, `latest` or `backfill`)
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Maximum listing pages scanned per section
    #[serde(default = "unbounded")]
    pub max_pages: i64,

    /// Maximum items fetched per section
    #[serde(default = "unbounded")]
    pub max_items_per_section: i64,

    /// Pages a `latest` run scans before the known-streak rule may stop it
    #[serde(default = "default_latest_min_pages")]
    pub latest_min_pages: u32,

    /// Consecutive fully-known pages that stop a `latest` run
    #[serde(default = "default_latest_known_page_streak")]
    pub latest_known_page_streak: u32,

    /// Width of the page window a `backfill` run walks
    #[serde(default = "default_backfill_pages_per_run")]
    pub backfill_pages_per_run: u32,

    /// New items a whole `backfill` run may schedule across all sections
    #[serde(default = "default_backfill_max_new_items")]
    pub backfill_max_new_items: i64,

    /// Maximum number of requests in flight
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: u32,

    /// Maximum number of requests in flight to a single host
    #[serde(default = "default_max_concurrent_requests_per_host")]
    pub max_concurrent_requests_per_host: u32,

    /// Minimum time between requests to the same host (milliseconds)
    #[serde(default = "default_download_delay")]
    pub download_delay: u64,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Retries for transient fetch failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before a retry (milliseconds)
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Selectors used to read listing pages
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListingConfig {
    /// CSS selector matching the item links of a listing page
    #[serde(default = "default_entry_selector")]
    pub entry_selector: String,

    /// CSS selector matching the pagination buttons (their `aria-label` carries page numbers)
    #[serde(default = "default_pagination_selector")]
    pub pagination_selector: String,

    /// Query parameter carrying the page number
    #[serde(default = "default_page_parameter")]
    pub page_parameter: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            entry_selector: default_entry_selector(),
            pagination_selector: default_pagination_selector(),
            page_parameter: default_page_parameter(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Where the JSON run summary is written, if anywhere
    #[serde(default, rename = "stats-output-path")]
    pub stats_output_path: Option<String>,
}

/// A catalog section with its base listing URL
#[derive(Debug, Clone, Deserialize)]
pub struct SectionEntry {
    /// Stable section name, used as the progress key
    pub name: String,

    /// URL of the first listing page
    pub url: String,
}

fn default_mode() -> String {
    "full".to_string()
}

fn unbounded() -> i64 {
    -1
}

fn default_latest_min_pages() -> u32 {
    3
}

fn default_latest_known_page_streak() -> u32 {
    2
}

fn default_backfill_pages_per_run() -> u32 {
    3
}

fn default_backfill_max_new_items() -> i64 {
    50
}

fn default_max_concurrent_requests() -> u32 {
    8
}

fn default_max_concurrent_requests_per_host() -> u32 {
    2
}

fn default_download_delay() -> u64 {
    1000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_entry_selector() -> String {
    r#"a[aria-label^="Consulter l'ouvrage"]"#.to_string()
}

fn default_pagination_selector() -> String {
    r#"nav[aria-label="Pagination"] button[aria-label*="page"]"#.to_string()
}

fn default_page_parameter() -> String {
    "page".to_string()
}
