//! Item page parser
//!
//! Extracts the two fields the table log records for each item:
//! - the content hash, located by a configurable CSS selector
//! - the item title, located by a second selector (`title` by default)
//!
//! A page without a hash is a valid outcome, not an error: the item exists
//! but has nothing to download.

use crate::crawler::task::ContentRecord;
use crate::{ConfigError, ConfigResult};
use scraper::{ElementRef, Html, Selector};

/// Parser for item pages, built once from the site configuration
#[derive(Debug, Clone)]
pub struct PageParser {
    hash: Selector,
    title: Selector,
}

impl PageParser {
    /// Compiles the hash and title selectors
    ///
    /// # Arguments
    ///
    /// * `hash_selector` - CSS selector of the element holding the hash
    /// * `title_selector` - CSS selector of the element holding the title
    ///
    /// # Returns
    ///
    /// * `Ok(PageParser)` - Both selectors compiled
    /// * `Err(ConfigError::InvalidSelector)` - A selector failed to parse
    pub fn new(hash_selector: &str, title_selector: &str) -> ConfigResult<Self> {
        Ok(Self {
            hash: compile(hash_selector)?,
            title: compile(title_selector)?,
        })
    }

    /// Parses an item page
    ///
    /// Returns `None` when the page carries no hash.
    ///
    /// # Example
    ///
    /// ```
    /// use catalog_harvest::crawler::PageParser;
    ///
    /// let parser = PageParser::new("span.hash", "title").unwrap();
    /// let html = r#"<html><head><title>Item</title></head>
    ///     <body><span class="hash">ABC123</span></body></html>"#;
    ///
    /// let record = parser.parse(42, html).unwrap();
    /// assert_eq!(record.line, "42\tABC123\tItem");
    /// ```
    pub fn parse(&self, id: u64, html: &str) -> Option<ContentRecord> {
        let document = Html::parse_document(html);

        let hash = document
            .select(&self.hash)
            .map(element_text)
            .find(|text| !text.is_empty())?;

        let title = document
            .select(&self.title)
            .next()
            .map(element_text)
            .unwrap_or_default();

        Some(ContentRecord {
            id,
            line: format!("{}\t{}\t{}", id, hash, title),
            text: html.to_string(),
        })
    }
}

fn compile(selector: &str) -> ConfigResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {}", selector, e)))
}

/// Collapses an element's text into a single line
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
