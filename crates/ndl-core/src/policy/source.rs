//! Expected-origin patterns for item references.

use serde::{Deserialize, Serialize};

/// Which item references belong to the job's source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum SourcePattern {
    /// Reference must start with this string (e.g. `https://booktoki`).
    Prefix(String),
    /// Reference must be an http(s) URL on this host or one of its subdomains.
    Host(String),
    /// Any http(s) URL.
    AnyHttp,
}

impl SourcePattern {
    pub fn matches(&self, item_ref: &str) -> bool {
        match self {
            SourcePattern::Prefix(prefix) => item_ref.starts_with(prefix.as_str()),
            SourcePattern::Host(host) => match http_url(item_ref) {
                Some(u) => u.host_str().is_some_and(|h| {
                    let h = h.to_ascii_lowercase();
                    let want = host.to_ascii_lowercase();
                    h == want || h.ends_with(&format!(".{}", want))
                }),
                None => false,
            },
            SourcePattern::AnyHttp => http_url(item_ref).is_some(),
        }
    }
}

fn http_url(item_ref: &str) -> Option<url::Url> {
    url::Url::parse(item_ref)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
}
