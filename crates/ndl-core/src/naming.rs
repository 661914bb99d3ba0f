//! Filename-safe names for checkpoints, staged records and artifacts.

/// Characters rejected by common filesystems (and by browsers' download dialogs).
const ILLEGAL: &[char] = &['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Prefix of every checkpoint key; kept stable so old checkpoints stay loadable.
pub const CHECKPOINT_KEY_PREFIX: &str = "ndl-checkpoint-";

/// Sanitizes a title for use as a filename stem.
///
/// - Replaces `/ \ ? % * : | " < >`, NUL and other control characters with `_`
/// - Trims leading/trailing whitespace and dots
/// - Limits length to 200 bytes so suffixes like `(1~300).txt` still fit NAME_MAX
///
/// Distinct titles may sanitize to the same string; callers treat those as the same job.
pub fn sanitize_filename(name: &str) -> String {
    const MAX_STEM: usize = 200;

    let replaced: String = name
        .chars()
        .map(|c| {
            if ILLEGAL.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c.is_whitespace() || c == '.');
    let mut take = trimmed.len().min(MAX_STEM);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    let out = &trimmed[..take];
    if out.is_empty() {
        "untitled".to_string()
    } else {
        out.to_string()
    }
}

/// Storage key for a job's checkpoint.
pub fn checkpoint_key(title: &str) -> String {
    format!("{}{}", CHECKPOINT_KEY_PREFIX, sanitize_filename(title))
}

/// Number of decimal digits needed to print `total` (at least 1).
pub fn pad_width(total: usize) -> usize {
    total.max(1).to_string().len()
}

/// Deterministic record name: user-facing number zero-padded to the width of
/// `total`, plus an extension. Sorting names sorts items, and a re-fetched item
/// always lands on the same name.
pub fn record_name(number: usize, total: usize, ext: &str) -> String {
    format!("{:0width$}.{}", number, ext, width = pad_width(total))
}

/// File extension of the last path segment of a URL, lowercased (`jpg` when absent).
pub fn url_extension(item_ref: &str) -> String {
    const FALLBACK: &str = "jpg";
    let Ok(parsed) = url::Url::parse(item_ref) else {
        return FALLBACK.to_string();
    };
    let last = parsed
        .path_segments()
        .and_then(|mut s| s.next_back())
        .unwrap_or("");
    match last.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            ext.to_ascii_lowercase()
        }
        _ => FALLBACK.to_string(),
    }
}
