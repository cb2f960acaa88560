// src/dedupe.rs
//! Recency window + near-duplicate collapsing.
//!
//! Dedup is a single greedy pass: every item is compared against the titles of
//! the representatives kept so far (not against every prior item). A match at
//! or above the threshold folds the item into that representative, keeping
//! whichever of the two wins on `(priority, published)`.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::model::NewsItem;
use crate::text::{jaccard_similarity, normalize_title};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.86;

/// Keep items published within the last `lookback_hours`.
pub fn filter_recent(items: Vec<NewsItem>, lookback_hours: i64) -> Vec<NewsItem> {
    filter_recent_at(items, lookback_hours, Utc::now())
}

/// Same as [`filter_recent`] with an explicit clock. Order is preserved. A
/// window too large for the calendar keeps everything.
pub fn filter_recent_at(
    items: Vec<NewsItem>,
    lookback_hours: i64,
    now: DateTime<Utc>,
) -> Vec<NewsItem> {
    let Some(cutoff) = hours_before(now, lookback_hours) else {
        return items;
    };
    items
        .into_iter()
        .filter(|it| it.published >= cutoff)
        .collect()
}

/// `now - hours`, or `None` when that is not a representable instant.
pub fn hours_before(now: DateTime<Utc>, hours: i64) -> Option<DateTime<Utc>> {
    Duration::try_hours(hours).and_then(|d| now.checked_sub_signed(d))
}

/// Collapse near-duplicate headlines. Output order is the order in which
/// representatives were first admitted.
pub fn dedupe_items(items: Vec<NewsItem>, similarity_threshold: f64) -> Vec<NewsItem> {
    let before = items.len();
    let mut kept: Vec<NewsItem> = Vec::new();
    let mut kept_tokens: Vec<Vec<String>> = Vec::new();

    for item in items {
        let tokens = normalize_title(&item.title);
        let hit = kept_tokens
            .iter()
            .position(|existing| jaccard_similarity(&tokens, existing) >= similarity_threshold);

        match hit {
            Some(idx) => {
                let current = &kept[idx];
                if (item.priority, item.published) > (current.priority, current.published) {
                    kept[idx] = item;
                    kept_tokens[idx] = tokens;
                }
            }
            None => {
                kept.push(item);
                kept_tokens.push(tokens);
            }
        }
    }

    info!(target: "dedupe", before, after = kept.len(), "deduped items");
    kept
}
