//! Web-novel episode extractor: selector fallback chains plus text cleaning.

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};

use super::clean::TextCleaner;
use super::{Extracted, Extractor};
use crate::fetch::RawDocument;

/// Tried in order; the first match wins.
pub const DEFAULT_TITLE_SELECTORS: &[&str] = &[
    ".toon-title",
    ".view-title",
    "h1.title",
    ".post-title",
    ".entry-title",
];

pub const DEFAULT_CONTENT_SELECTORS: &[&str] = &[
    "#novel_content",
    ".novel-content",
    ".view-content",
    ".entry-content",
    ".post-content",
];

pub const UNTITLED: &str = "Untitled episode";

pub(crate) fn parse_selectors(list: &[&str]) -> Result<Vec<Selector>> {
    list.iter()
        .map(|s| Selector::parse(s).map_err(|e| anyhow!("invalid selector {:?}: {}", s, e)))
        .collect()
}

pub struct NovelExtractor {
    title_selectors: Vec<Selector>,
    content_selectors: Vec<Selector>,
    cleaner: TextCleaner,
}

impl NovelExtractor {
    pub fn new() -> Result<Self> {
        Self::with_selectors(DEFAULT_TITLE_SELECTORS, DEFAULT_CONTENT_SELECTORS)
    }

    pub fn with_selectors(title: &[&str], content: &[&str]) -> Result<Self> {
        Ok(Self {
            title_selectors: parse_selectors(title)?,
            content_selectors: parse_selectors(content)?,
            cleaner: TextCleaner::new()?,
        })
    }

    fn first_match<'a>(doc: &'a Html, selectors: &[Selector]) -> Option<ElementRef<'a>> {
        selectors.iter().find_map(|sel| doc.select(sel).next())
    }

    fn episode_title(&self, doc: &Html) -> String {
        let Some(el) = Self::first_match(doc, &self.title_selectors) else {
            return UNTITLED.to_string();
        };
        if let Some(attr) = el.value().attr("title").map(str::trim).filter(|t| !t.is_empty()) {
            return attr.to_string();
        }
        let text: String = el.text().collect();
        text.lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| UNTITLED.to_string())
    }
}

impl Extractor for NovelExtractor {
    fn extract(&self, doc: &RawDocument) -> Option<Extracted> {
        let html = Html::parse_document(&doc.text());
        let content = Self::first_match(&html, &self.content_selectors)?;
        let title = self.episode_title(&html);

        let mut text = self.cleaner.clean(&content.inner_html());
        if let Some(rest) = text.strip_prefix(title.as_str()) {
            text = rest.trim().to_string();
        }
        if text.is_empty() {
            tracing::debug!(url = %doc.url, "content element present but empty");
            return None;
        }

        let body = format!("{}\n\n{}\n\n", title, text).into_bytes();
        Some(Extracted { title, body })
    }
}
