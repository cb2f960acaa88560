// src/text.rs
//! Text primitives shared by ingest, dedupe and enrichment: title tokenizer,
//! Jaccard similarity, HTML stripping and char-safe truncation.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashSet;

/// Marker appended by [`truncate`].
pub const ELLIPSIS: char = '…';

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "for", "to", "in", "on", "of", "at", "with", "from", "by",
];

/// Tokenize a headline for similarity comparison.
///
/// Lowercases, replaces everything outside `[a-z0-9]` and whitespace with a
/// space, splits on whitespace and drops stopwords. Non-ASCII scripts vanish
/// entirely, so a pure CJK title yields no tokens.
pub fn normalize_title(title: &str) -> Vec<String> {
    if title.is_empty() {
        return Vec::new();
    }
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|t| !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Jaccard index of the two token sets, in `[0.0, 1.0]`.
///
/// An empty side never matches anything, including another empty side.
pub fn jaccard_similarity<S: AsRef<str>>(a: &[S], b: &[S]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let set_a: HashSet<&str> = a.iter().map(AsRef::as_ref).collect();
    let set_b: HashSet<&str> = b.iter().map(AsRef::as_ref).collect();
    let inter = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    inter as f64 / union as f64
}

/// Decode entities, drop tags, collapse whitespace.
pub fn strip_html(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let decoded = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]+>").expect("tag regex"));
    let no_tags = re_tags.replace_all(&decoded, " ");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    re_ws.replace_all(&no_tags, " ").trim().to_string()
}

/// Cap `text` at `limit` chars. A cut text keeps `limit - 1` chars, trailing
/// whitespace removed, plus [`ELLIPSIS`].
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit.saturating_sub(1)).collect();
    let mut out = head.trim_end().to_string();
    out.push(ELLIPSIS);
    out
}
