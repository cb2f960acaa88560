// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::model::NewsItem;

fn default_lang() -> String {
    "en".to_string()
}

fn default_priority() -> i32 {
    1
}

/// One configured feed, as listed in the sources file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "lang", default = "default_lang")]
    pub language: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>>;
    fn name(&self) -> &str;
}
