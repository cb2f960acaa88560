// src/ingest/sources.rs
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::types::Source;

/// Load the JSON source list: `[{"id", "name", "url", "lang"?, "priority"?}, ...]`.
pub fn load_sources(path: &Path) -> Result<Vec<Source>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    parse_sources(&content).with_context(|| format!("parsing sources in {}", path.display()))
}

pub fn parse_sources(s: &str) -> Result<Vec<Source>> {
    let mut sources: Vec<Source> = serde_json::from_str(s)?;
    sources.retain(|src| !src.url.trim().is_empty());
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_for_lang_and_priority() {
        let json = r#"[
            {"id": "fed", "name": "Federal Reserve", "url": "https://fed.test/rss", "priority": 3},
            {"id": "caixin", "name": "Caixin", "url": "https://cx.test/rss", "lang": "zh-CN"},
            {"id": "blank", "name": "Blank", "url": "  "}
        ]"#;
        let out = parse_sources(json).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].language, "en");
        assert_eq!(out[0].priority, 3);
        assert_eq!(out[1].language, "zh-CN");
        assert_eq!(out[1].priority, 1);
    }

    #[test]
    fn missing_required_field_is_an_error() {
        assert!(parse_sources(r#"[{"id": "x", "url": "u"}]"#).is_err());
    }
}
