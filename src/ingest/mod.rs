// src/ingest/mod.rs
pub mod rss;
pub mod sources;
pub mod types;

use metrics::counter;
use tracing::{info, warn};

use crate::ingest::rss::RssFeedProvider;
use crate::ingest::types::{FeedProvider, Source};
use crate::model::NewsItem;

pub use sources::load_sources;

/// One HTTP provider per configured source, in list order.
pub fn providers_for(sources: Vec<Source>) -> Vec<Box<dyn FeedProvider>> {
    sources
        .into_iter()
        .map(|s| Box::new(RssFeedProvider::from_source(s)) as Box<dyn FeedProvider>)
        .collect()
}

/// Fetch every provider in turn. A failing feed is logged and skipped.
pub async fn fetch_all(providers: &[Box<dyn FeedProvider>]) -> Vec<NewsItem> {
    let mut raw = Vec::new();
    for p in providers {
        info!(target: "ingest", provider = p.name(), "fetching");
        match p.fetch_latest().await {
            Ok(mut v) => raw.append(&mut v),
            Err(e) => {
                warn!(target: "ingest", error = ?e, provider = p.name(), "provider error");
                counter!("digest_feed_errors_total").increment(1);
            }
        }
    }
    raw
}
