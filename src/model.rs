// src/model.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One headline flowing through the pipeline.
///
/// `link` is the identity of the story: two items with the same link are the
/// same story, within a run and across runs (see [`crate::state::Ledger`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub published: DateTime<Utc>,
    pub summary: String,
    pub source: String,
    pub language: String, // e.g. "en", "zh-CN"
    pub priority: i32,    // source weight, higher wins

    // Filled by enrichment only.
    #[serde(default)]
    pub title_en: Option<String>,
    #[serde(default)]
    pub title_zh: Option<String>,
    #[serde(default)]
    pub summary_en: Option<String>,
    #[serde(default)]
    pub summary_zh: Option<String>,
}

impl NewsItem {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        published: DateTime<Utc>,
        summary: impl Into<String>,
        source: impl Into<String>,
        language: impl Into<String>,
        priority: i32,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            published,
            summary: summary.into(),
            source: source.into(),
            language: language.into(),
            priority,
            title_en: None,
            title_zh: None,
            summary_en: None,
            summary_zh: None,
        }
    }
}
