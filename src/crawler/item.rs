//! Item detail page extraction
//!
//! Turns one fetched item page into an [`ItemRecord`]. Every field is
//! optional: a page missing a field yields `None`, never an error.

use crate::url::identifier_from_url;
use crate::{ConfigError, UrlError};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

/// Parsed fields of one catalog item
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemRecord {
    pub doc_id: String,
    pub url: String,
    pub section: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub collection: Option<String>,
    pub isbn: Option<String>,
    pub pages: Option<u32>,
    pub price: Option<f64>,
    pub publication_date: Option<String>,
    pub online_date: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Item page parser with its selectors and patterns compiled once
#[derive(Debug)]
pub struct ItemParser {
    isbn: Selector,
    image: Selector,
    title: Selector,
    subtitle: Selector,
    author: Selector,
    publisher: Selector,
    label_span: Selector,
    price_block: Selector,
    heading: Selector,
    page_count: Regex,
    price: Regex,
    publication_date: Regex,
    online_date: Regex,
    whitespace: Regex,
}

impl ItemParser {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            isbn: selector(r#"meta[name="citation_isbn"]"#)?,
            image: selector(r#"meta[property="og:image"]"#)?,
            title: selector("h1")?,
            subtitle: selector("h1 + h2")?,
            author: selector(r#"meta[name="citation_author"]"#)?,
            publisher: selector(r#"meta[name="citation_publisher"]"#)?,
            label_span: selector(r#"span[class*="font-serif"]"#)?,
            price_block: selector("p.text-cairn-main.text-center")?,
            heading: selector("h2")?,
            page_count: regex(r"(\d+)\s*pages")?,
            price: regex(r"([\d,]+)\s*€")?,
            publication_date: regex(r"Date de parution\s*:\s*([\d/]+)")?,
            online_date: regex(r"Date de mise en ligne\s*:\s*([\d/]+)")?,
            whitespace: regex(r"\s+")?,
        })
    }

    /// Parses an item page fetched from `url`
    ///
    /// `url` must be the canonical item URL so that the record's `doc_id`
    /// matches the identifier the listing produced for it.
    pub fn parse(&self, html: &str, url: &Url, section: &str) -> Result<ItemRecord, UrlError> {
        let doc_id = identifier_from_url(url)?;
        let document = Html::parse_document(html);

        Ok(ItemRecord {
            doc_id,
            url: url.to_string(),
            section: section.to_string(),
            title: self.first_text(&document, &self.title),
            subtitle: self.first_text(&document, &self.subtitle),
            authors: document
                .select(&self.author)
                .filter_map(|e| e.value().attr("content"))
                .filter_map(|a| self.clean(a))
                .collect(),
            publisher: self.meta_content(&document, &self.publisher),
            collection: self.collection(&document),
            isbn: self.meta_content(&document, &self.isbn),
            pages: self
                .capture(&self.page_count, html)
                .and_then(|n| n.parse().ok()),
            price: self.price(&document),
            publication_date: self.capture(&self.publication_date, html),
            online_date: self.capture(&self.online_date, html),
            description: self.description(&document),
            image_url: self.meta_content(&document, &self.image),
        })
    }

    fn clean(&self, text: &str) -> Option<String> {
        let cleaned = self.whitespace.replace_all(text, " ").trim().to_string();
        (!cleaned.is_empty()).then_some(cleaned)
    }

    fn element_text(&self, element: ElementRef<'_>) -> Option<String> {
        self.clean(&element.text().collect::<Vec<_>>().join(" "))
    }

    /// Text nodes directly under the first match; nested markup is skipped
    fn first_text(&self, document: &Html, selector: &Selector) -> Option<String> {
        let element = document.select(selector).next()?;
        let own = element
            .children()
            .filter_map(|node| node.value().as_text())
            .map(|text| &**text)
            .collect::<Vec<_>>();
        self.clean(&own.join(" "))
    }

    fn meta_content(&self, document: &Html, selector: &Selector) -> Option<String> {
        document
            .select(selector)
            .filter_map(|e| e.value().attr("content"))
            .find_map(|c| self.clean(c))
    }

    fn capture(&self, pattern: &Regex, text: &str) -> Option<String> {
        pattern
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// The span right after the "Collection" label
    fn collection(&self, document: &Html) -> Option<String> {
        document
            .select(&self.label_span)
            .filter(|label| label.text().any(|t| t.contains("Collection")))
            .find_map(|label| {
                label
                    .next_siblings()
                    .filter_map(ElementRef::wrap)
                    .find(|sibling| sibling.value().name() == "span")
                    .and_then(|value| self.element_text(value))
            })
    }

    /// Price in euros; the site writes decimals with a comma
    fn price(&self, document: &Html) -> Option<f64> {
        document
            .select(&self.price_block)
            .filter_map(|block| self.capture(&self.price, &block.text().collect::<String>()))
            .find_map(|raw| raw.replace(',', ".").parse().ok())
    }

    /// Text of the first div following the "Présentation" heading
    fn description(&self, document: &Html) -> Option<String> {
        document
            .select(&self.heading)
            .filter(|heading| heading.text().any(|t| t.contains("Présentation")))
            .find_map(|heading| {
                heading
                    .next_siblings()
                    .filter_map(ElementRef::wrap)
                    .find(|sibling| sibling.value().name() == "div")
                    .and_then(|div| self.element_text(div))
            })
    }
}

fn selector(css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", css, e)))
}

fn regex(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::Validation(e.to_string()))
}
