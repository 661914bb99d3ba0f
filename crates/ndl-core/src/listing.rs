//! Item-list enumeration: paginated episode lists and gallery image lists.
//!
//! Runs before a job exists; the orchestrator never calls into this module.

use anyhow::{anyhow, Result};
use scraper::{Html, Selector};
use std::time::Duration;

use crate::extract::TextCleaner;
use crate::fetch::{Fetcher, RawDocument};

/// Spacing between list page requests.
pub const PAGE_DELAY: Duration = Duration::from_millis(500);

/// Episode links on a list page.
pub const EPISODE_LINK_SELECTOR: &str = ".item-subject";

/// Series title on a list page.
pub const SERIES_TITLE_SELECTOR: &str = "#content_wrapper > div:first-child > span";

fn selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| anyhow!("invalid selector {:?}: {}", s, e))
}

/// List page URL for `page` (1-based): query string replaced by `?spage=N`.
pub fn page_url(list_url: &str, page: usize) -> String {
    let base = list_url.split('?').next().unwrap_or(list_url);
    format!("{}?spage={}", base, page)
}

/// Resolve `href` against the page it was found on. Unresolvable links are kept verbatim
/// so the policy can reject them as a source mismatch.
fn resolve(page: &str, href: &str) -> String {
    match url::Url::parse(page).and_then(|base| base.join(href)) {
        Ok(u) => u.to_string(),
        Err(_) => href.to_string(),
    }
}

/// Episode links found on one list page, in page order.
pub fn episode_links(doc: &RawDocument) -> Result<Vec<String>> {
    let sel = selector(EPISODE_LINK_SELECTOR)?;
    let html = Html::parse_document(&doc.text());
    Ok(html
        .select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .map(|href| resolve(&doc.url, href.trim()))
        .collect())
}

/// Series title from a list page, if present.
pub fn extract_series_title(doc: &RawDocument) -> Result<Option<String>> {
    let sel = selector(SERIES_TITLE_SELECTOR)?;
    let html = Html::parse_document(&doc.text());
    Ok(html
        .select(&sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty()))
}

/// Everything read from a novel's list pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeList {
    /// Series title from the first list page, if it loaded and has one.
    pub series_title: Option<String>,
    /// Episode links, newest first as the site lists them.
    pub refs: Vec<String>,
}

/// Fetch list pages `1..=pages` once each and collect the series title and every
/// episode link. Pages that fail to load are logged and skipped.
pub async fn collect_item_refs(
    fetcher: &dyn Fetcher,
    list_url: &str,
    pages: usize,
) -> Result<EpisodeList> {
    let mut list = EpisodeList::default();
    for page in 1..=pages {
        let url = page_url(list_url, page);
        match fetcher.fetch(&url).await {
            Ok(doc) => {
                if page == 1 {
                    list.series_title = extract_series_title(&doc)?;
                }
                let links = episode_links(&doc)?;
                tracing::debug!(page, found = links.len(), "list page parsed");
                list.refs.extend(links);
            }
            Err(e) => tracing::warn!(page, url = %url, "list page failed: {}", e),
        }
        if page < pages {
            tokio::time::sleep(PAGE_DELAY).await;
        }
    }
    tracing::info!(total = list.refs.len(), pages, "episode list collected");
    Ok(list)
}

/// Image URLs (`src`, else lazy-load `data-src`) matched by `image_selector` on a
/// gallery page, keeping only absolute http(s) URLs after resolution.
pub fn collect_image_refs(doc: &RawDocument, image_selector: &str) -> Result<Vec<String>> {
    let sel = selector(image_selector)?;
    let html = Html::parse_document(&doc.text());
    let refs: Vec<String> = html
        .select(&sel)
        .filter_map(|el| {
            let v = el.value();
            v.attr("src")
                .filter(|s| !s.trim().is_empty())
                .or_else(|| v.attr("data-src"))
        })
        .map(|src| resolve(&doc.url, src.trim()))
        .filter(|u| u.starts_with("http:") || u.starts_with("https:"))
        .collect();
    if refs.is_empty() {
        tracing::warn!(selector = image_selector, "no images matched");
    }
    Ok(refs)
}

/// Page `<title>`, cleaned, as a fallback job title for galleries.
pub fn page_title(doc: &RawDocument) -> Result<Option<String>> {
    let sel = selector("title")?;
    let html = Html::parse_document(&doc.text());
    let cleaner = TextCleaner::new()?;
    Ok(html
        .select(&sel)
        .next()
        .map(|el| cleaner.clean(&el.inner_html()))
        .filter(|t| !t.is_empty()))
}
