use crate::config::types::{
    Config, CrawlerConfig, ListingConfig, OutputConfig, SectionEntry, UserAgentConfig,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_listing_config(&config.listing)?;
    validate_output_config(&config.output)?;
    validate_sections(&config.sections)?;
    Ok(())
}

/// Validates crawler configuration
///
/// The mode string is deliberately not checked here: an unknown mode falls
/// back to `full` with a warning when the settings are resolved.
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.max_concurrent_requests_per_host < 1 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests_per_host must be >= 1, got {}",
            config.max_concurrent_requests_per_host
        )));
    }

    if config.max_concurrent_requests_per_host > config.max_concurrent_requests {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests_per_host ({}) cannot exceed max_concurrent_requests ({})",
            config.max_concurrent_requests_per_host, config.max_concurrent_requests
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(
            "request_timeout must be >= 1 second".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates listing selectors
fn validate_listing_config(config: &ListingConfig) -> Result<(), ConfigError> {
    for (name, selector) in [
        ("entry_selector", &config.entry_selector),
        ("pagination_selector", &config.pagination_selector),
    ] {
        Selector::parse(selector).map_err(|e| {
            ConfigError::InvalidSelector(format!("{} '{}': {:?}", name, selector, e))
        })?;
    }

    if config.page_parameter.trim().is_empty() {
        return Err(ConfigError::Validation(
            "page_parameter cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if matches!(&config.stats_output_path, Some(path) if path.is_empty()) {
        return Err(ConfigError::Validation(
            "stats_output_path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates catalog sections
fn validate_sections(sections: &[SectionEntry]) -> Result<(), ConfigError> {
    if sections.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[section]] is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for section in sections {
        if section.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "section name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(section.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate section name '{}'",
                section.name
            )));
        }

        let url = Url::parse(&section.url).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid URL '{}' for section '{}': {}",
                section.url, section.name, e
            ))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Section URL '{}' must use HTTP or HTTPS",
                section.url
            )));
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
