//! Listing page extraction
//!
//! This module handles parsing one listing page to extract:
//! - The item links it lists, in document order
//! - The highest page number advertised by its pagination control

use crate::config::ListingConfig;
use crate::url::{canonicalize_url, identifier_from_url};
use crate::ConfigError;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// One item link found on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Storage key derived from the canonical URL path
    pub identifier: String,

    /// Canonical absolute URL of the item page
    pub url: Url,
}

/// Extracted information from a listing page
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Item links in the order they appear, without duplicates
    pub entries: Vec<ListingEntry>,

    /// Highest page number found in the pagination control, if any
    pub last_page: Option<u32>,
}

/// Listing extractor with its selectors compiled once per run
#[derive(Debug)]
pub struct ListingExtractor {
    entry_selector: Selector,
    pagination_selector: Selector,
    page_number: Regex,
}

impl ListingExtractor {
    pub fn new(config: &ListingConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            entry_selector: parse_selector(&config.entry_selector)?,
            pagination_selector: parse_selector(&config.pagination_selector)?,
            page_number: Regex::new(r"\d+")
                .map_err(|e| ConfigError::Validation(e.to_string()))?,
        })
    }

    /// Parses a listing page
    ///
    /// # Entry Extraction Rules
    ///
    /// - Every element matched by the entry selector that carries an `href`
    /// - Relative links are resolved against `page_url`
    /// - Links that cannot be canonicalized or have no path are skipped
    /// - A link listed twice on the same page is kept once, at its first position
    ///
    /// # Pagination
    ///
    /// The last page is the largest integer found in the `aria-label`
    /// attributes of the pagination selector's matches. No match means the
    /// last page is unknown, which is not the same as "this is the last page".
    ///
    /// # Example
    ///
    /// ```
    /// use folio_sweep::config::ListingConfig;
    /// use folio_sweep::crawler::ListingExtractor;
    /// use url::Url;
    ///
    /// let extractor = ListingExtractor::new(&ListingConfig::default()).unwrap();
    /// let html = r#"<a aria-label="Consulter l'ouvrage X" href="/ouvrage/x/">X</a>"#;
    /// let page_url = Url::parse("https://droit.example.org/publications").unwrap();
    /// let page = extractor.extract(html, &page_url);
    /// assert_eq!(page.entries[0].identifier, "ouvrage/x");
    /// assert_eq!(page.last_page, None);
    /// ```
    pub fn extract(&self, html: &str, page_url: &Url) -> ListingPage {
        let document = Html::parse_document(html);

        ListingPage {
            entries: self.extract_entries(&document, page_url),
            last_page: self.extract_last_page(&document),
        }
    }

    fn extract_entries(&self, document: &Html, page_url: &Url) -> Vec<ListingEntry> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for element in document.select(&self.entry_selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };

            let url = match canonicalize_url(href, page_url) {
                Ok(url) => url,
                Err(e) => {
                    tracing::trace!("Skipping listing link '{}': {}", href, e);
                    continue;
                }
            };

            let Ok(identifier) = identifier_from_url(&url) else {
                continue;
            };

            if seen.insert(identifier.clone()) {
                entries.push(ListingEntry { identifier, url });
            }
        }

        entries
    }

    fn extract_last_page(&self, document: &Html) -> Option<u32> {
        document
            .select(&self.pagination_selector)
            .filter_map(|element| element.value().attr("aria-label"))
            .flat_map(|label| self.page_number.find_iter(label))
            .filter_map(|m| m.as_str().parse::<u32>().ok())
            .max()
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://droit.example.org/publications?lang=fr&page=2").unwrap()
    }

    fn extract(html: &str) -> ListingPage {
        ListingExtractor::new(&ListingConfig::default())
            .unwrap()
            .extract(html, &page_url())
    }

    fn entry(slug: &str) -> String {
        format!(
            r#"<a aria-label="Consulter l'ouvrage {slug}" href="/ouvrage/{slug}">{slug}</a>"#,
            slug = slug
        )
    }

    #[test]
    fn test_entries_in_document_order() {
        let html = format!("<main>{}{}{}</main>", entry("c"), entry("a"), entry("b"));
        let page = extract(&html);

        let ids: Vec<_> = page.entries.iter().map(|e| e.identifier.as_str()).collect();
        assert_eq!(ids, vec!["ouvrage/c", "ouvrage/a", "ouvrage/b"]);
        assert_eq!(
            page.entries[0].url.as_str(),
            "https://droit.example.org/ouvrage/c"
        );
    }

    #[test]
    fn test_ignores_other_links() {
        let html = format!(
            r#"<a href="/ouvrage/nav">Nav</a>{}<a aria-label="Consulter la revue" href="/r">R</a>"#,
            entry("a")
        );
        let page = extract(&html);
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].identifier, "ouvrage/a");
    }

    #[test]
    fn test_duplicate_links_kept_once() {
        let html = format!(
            r#"{}{}<a aria-label="Consulter l'ouvrage a" href="/ouvrage/a/#resume">again</a>"#,
            entry("a"),
            entry("b")
        );
        let page = extract(&html);
        assert_eq!(page.entries.len(), 2);
    }

    #[test]
    fn test_skips_links_without_path() {
        let html = r#"<a aria-label="Consulter l'ouvrage" href="/">Root</a>
                      <a aria-label="Consulter l'ouvrage" href="mailto:x@example.org">Mail</a>
                      <a aria-label="Consulter l'ouvrage">No href</a>"#;
        assert!(extract(html).entries.is_empty());
    }

    #[test]
    fn test_last_page_is_highest_number() {
        let html = r#"<nav aria-label="Pagination">
              <button aria-label="Aller à la page 1">1</button>
              <button aria-label="Aller à la page 2">2</button>
              <button aria-label="Aller à la page 48">48</button>
              <button aria-label="Page suivante">›</button>
            </nav>"#;
        assert_eq!(extract(html).last_page, Some(48));
    }

    #[test]
    fn test_last_page_unknown_without_pagination() {
        let html = format!("<main>{}</main>", entry("a"));
        assert_eq!(extract(&html).last_page, None);
    }

    #[test]
    fn test_empty_page() {
        let page = extract("<html><body><p>Aucun résultat</p></body></html>");
        assert!(page.entries.is_empty());
        assert!(page.last_page.is_none());
    }

    #[test]
    fn test_custom_selectors() {
        let config = ListingConfig {
            entry_selector: "li.book > a".to_string(),
            pagination_selector: "ul.pages a".to_string(),
            page_parameter: "p".to_string(),
        };
        let extractor = ListingExtractor::new(&config).unwrap();
        let html = r#"<ul><li class="book"><a href="book/one">One</a></li></ul>
                      <ul class="pages"><a aria-label="7">7</a></ul>"#;
        let page = extractor.extract(html, &page_url());

        assert_eq!(page.entries[0].identifier, "book/one");
        assert_eq!(page.last_page, Some(7));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let config = ListingConfig {
            entry_selector: "a[[".to_string(),
            ..ListingConfig::default()
        };
        assert!(matches!(
            ListingExtractor::new(&config),
            Err(ConfigError::InvalidSelector(_))
        ));
    }
}
