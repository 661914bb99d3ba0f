//! Markup-to-text cleaning for episode bodies.

use anyhow::Result;
use regex::Regex;

/// Placeholder left where an inline image was.
pub const IMAGE_PLACEHOLDER: &str = "[image skipped]";

const ENTITIES: &[(&str, &str)] = &[
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&#39;", "'"),
    ("&nbsp;", " "),
    ("&ndash;", "-"),
    ("&mdash;", "--"),
    ("&lsquo;", "'"),
    ("&rsquo;", "'"),
    ("&ldquo;", "\""),
    ("&rdquo;", "\""),
    // Last, so "&amp;lt;" becomes "&lt;" rather than "<".
    ("&amp;", "&"),
];

/// Compiled patterns for turning an element's inner HTML into plain text.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    div: Regex,
    para: Regex,
    br: Regex,
    img: Regex,
    tag: Regex,
    spaces: Regex,
    blank_runs: Regex,
}

impl TextCleaner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            div: Regex::new(r"(?i)</?div[^>]*>")?,
            para: Regex::new(r"(?i)</?p(\s[^>]*)?>")?,
            br: Regex::new(r"(?i)<br\s*/?>")?,
            img: Regex::new(r"(?i)<img[^>]*>")?,
            tag: Regex::new(r"<[^>]*>")?,
            spaces: Regex::new(r" {2,}")?,
            blank_runs: Regex::new(r"\n{3,}")?,
        })
    }

    /// Paragraphs and line breaks become blank-line separated lines, images a
    /// placeholder, remaining tags are dropped and entities unescaped.
    pub fn clean(&self, html: &str) -> String {
        let s = self.div.replace_all(html, "");
        let s = self.para.replace_all(&s, "\n");
        let s = self.br.replace_all(&s, "\n");
        let s = self.img.replace_all(&s, IMAGE_PLACEHOLDER);
        let s = self.tag.replace_all(&s, "");
        let s = self.spaces.replace_all(&s, " ");
        let s = unescape_entities(&s);

        let joined = s
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        self.blank_runs.replace_all(&joined, "\n\n").into_owned()
    }
}

pub fn unescape_entities(text: &str) -> String {
    let mut out = text.to_string();
    for (entity, replacement) in ENTITIES {
        if out.contains(entity) {
            out = out.replace(entity, replacement);
        }
    }
    out
}
