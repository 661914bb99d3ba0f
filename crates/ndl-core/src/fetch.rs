//! Fetcher collaborator: turns an item reference into raw document bytes.
//!
//! The orchestrator only sees the [`Fetcher`] trait. [`CurlFetcher`] is the
//! production implementation (libcurl easy handle on a blocking thread).

use async_trait::async_trait;
use std::str;
use std::time::Duration;

use crate::config::HttpConfig;

/// Raw response for one item.
#[derive(Debug, Clone, Default)]
pub struct RawDocument {
    /// Effective URL after redirects (or the item reference for non-HTTP fetchers).
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawDocument {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Failure reported by a fetcher. Carries no retry hint; classification is
/// left to [`crate::policy`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or timeout failure.
    #[error("transport: {0}")]
    Transport(String),
    /// Non-2xx HTTP status.
    #[error("HTTP {0}")]
    Http(u32),
    /// The blocking fetch task panicked or was cancelled.
    #[error("fetch task: {0}")]
    Task(String),
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, item_ref: &str) -> Result<RawDocument, FetchError>;
}

/// libcurl-backed HTTP GET fetcher.
#[derive(Debug, Clone, Default)]
pub struct CurlFetcher {
    http: HttpConfig,
}

impl CurlFetcher {
    pub fn new(http: HttpConfig) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Fetcher for CurlFetcher {
    async fn fetch(&self, item_ref: &str) -> Result<RawDocument, FetchError> {
        let url = item_ref.to_string();
        let http = self.http.clone();
        tokio::task::spawn_blocking(move || get(&url, &http))
            .await
            .map_err(|e| FetchError::Task(e.to_string()))?
    }
}

/// Performs a GET and buffers the whole body.
///
/// Follows redirects. Runs in the current thread; call from `spawn_blocking`
/// if used from async code.
pub fn get(url: &str, http: &HttpConfig) -> Result<RawDocument, FetchError> {
    let transport = |e: curl::Error| FetchError::Transport(e.to_string());

    let mut body: Vec<u8> = Vec::new();
    let mut content_type: Option<String> = None;

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(transport)?;
    easy.follow_location(true).map_err(transport)?;
    easy.max_redirections(10).map_err(transport)?;
    easy.connect_timeout(Duration::from_secs(http.connect_timeout_secs))
        .map_err(transport)?;
    easy.timeout(Duration::from_secs(http.timeout_secs))
        .map_err(transport)?;
    if let Some(ref ua) = http.user_agent {
        easy.useragent(ua).map_err(transport)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(line) = str::from_utf8(data) {
                    if let Some((name, value)) = line.split_once(':') {
                        if name.trim().eq_ignore_ascii_case("content-type") {
                            content_type = Some(value.trim().to_string());
                        }
                    }
                }
                true
            })
            .map_err(transport)?;
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(transport)?;
        transfer.perform().map_err(transport)?;
    }

    let code = easy.response_code().map_err(transport)?;
    if !(200..300).contains(&code) {
        tracing::debug!(url, code, "GET returned non-success status");
        return Err(FetchError::Http(code));
    }

    let effective = easy
        .effective_url()
        .ok()
        .flatten()
        .unwrap_or(url)
        .to_string();

    Ok(RawDocument {
        url: effective,
        content_type,
        body,
    })
}
