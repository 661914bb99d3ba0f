//! Gallery image extractor: any non-empty body is the record.

use super::{Extracted, Extractor};
use crate::fetch::RawDocument;
use crate::naming;

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageExtractor;

impl Extractor for ImageExtractor {
    fn extract(&self, doc: &RawDocument) -> Option<Extracted> {
        if doc.body.is_empty() {
            return None;
        }
        if let Some(ct) = doc.content_type.as_deref() {
            if ct.starts_with("text/html") {
                // An HTML page where an image was expected is a challenge/interstitial.
                return None;
            }
        }
        Some(Extracted {
            title: doc.url.clone(),
            body: doc.body.clone(),
        })
    }

    fn record_name(&self, number: usize, total: usize, item_ref: &str) -> String {
        naming::record_name(number, total, &naming::url_extension(item_ref))
    }
}
