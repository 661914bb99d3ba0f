//! Extractor collaborators: raw document -> `{title, body}` record.
//!
//! Extraction is pure data transformation; nothing is kept between calls.
//! `None` means "no content found", which the policy reads as a probable
//! challenge page.

mod clean;
mod image;
mod novel;

pub use clean::TextCleaner;
pub use image::ImageExtractor;
pub use novel::NovelExtractor;

use crate::fetch::RawDocument;
use crate::naming;

/// One extracted item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub title: String,
    /// Bytes handed to the archive writer.
    pub body: Vec<u8>,
}

pub trait Extractor: Send + Sync {
    fn extract(&self, doc: &RawDocument) -> Option<Extracted>;

    /// Archive entry name for an item. `number` is the user-facing item number
    /// and `total` the size of the whole item list (for zero padding). Depends
    /// only on the item, never on what was extracted from it.
    fn record_name(&self, number: usize, total: usize, _item_ref: &str) -> String {
        naming::record_name(number, total, "txt")
    }
}
