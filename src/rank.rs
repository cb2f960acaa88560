// src/rank.rs
//! Edition-aware ranking.
//!
//! Heuristic order: `(priority + edition_boost, published)` descending, where
//! the boost is +1.0 per edition keyword found (case-insensitive substring) in
//! `title + " " + summary`.
//!
//! External reranking hands the top candidates to a [`RankingJudge`] and applies
//! the returned id order. Any failure keeps the heuristic order untouched.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::model::NewsItem;

/// Beijing-focus boost terms (lowercase; matched against lowercased text).
const BJ_KEYWORDS: &[&str] = &[
    "china",
    "chinese",
    "beijing",
    "shanghai",
    "shenzhen",
    "hong kong",
    "hongkong",
    "rmb",
    "yuan",
    "pboc",
    "a-share",
    "a shares",
    "china stocks",
    "china economy",
    "cn",
    "中国",
    "中资",
    "人民币",
    "央行",
    "港股",
    "沪深",
    "上证",
    "深证",
    "a股",
];

/// New-York-focus boost terms.
const NY_KEYWORDS: &[&str] = &[
    "u.s.",
    "us ",
    "united states",
    "america",
    "fed",
    "federal reserve",
    "wall street",
    "s&p",
    "nasdaq",
    "dow",
    "treasury",
    "cpi",
    "jobs report",
    "nfp",
    "sec",
    "white house",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edition {
    Beijing,
    NewYork,
    Other,
}

impl Edition {
    /// Map an edition label by prefix: "BJ 08:00" → Beijing, "NY 08:00" → NewYork.
    pub fn from_label(label: &str) -> Self {
        if label.starts_with("BJ") {
            Edition::Beijing
        } else if label.starts_with("NY") {
            Edition::NewYork
        } else {
            Edition::Other
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Edition::Beijing => BJ_KEYWORDS,
            Edition::NewYork => NY_KEYWORDS,
            Edition::Other => &[],
        }
    }
}

/// +1.0 for every edition keyword contained in the item's title or summary.
pub fn edition_boost(item: &NewsItem, edition: Edition) -> f64 {
    let keywords = edition.keywords();
    if keywords.is_empty() {
        return 0.0;
    }
    let text = format!("{} {}", item.title, item.summary).to_lowercase();
    keywords.iter().filter(|k| text.contains(*k)).count() as f64
}

/// Heuristic ranking, truncated to `max_items`.
pub fn rank_items(items: Vec<NewsItem>, max_items: usize, edition_label: &str) -> Vec<NewsItem> {
    let edition = Edition::from_label(edition_label);
    let mut scored: Vec<(f64, NewsItem)> = items
        .into_iter()
        .map(|it| (it.priority as f64 + edition_boost(&it, edition), it))
        .collect();

    scored.sort_by(|(sa, a), (sb, b)| {
        sb.partial_cmp(sa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.published.cmp(&a.published))
    });

    scored
        .into_iter()
        .take(max_items)
        .map(|(_, it)| it)
        .collect()
}

// ------------------------------------------------------------
// External reranking
// ------------------------------------------------------------

/// Ordering returned by an external judge. Ids are 1-based positions in the
/// candidate list that was presented.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankVerdict {
    pub order: Vec<i64>,
    pub scores: HashMap<String, f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum RerankError {
    #[error("ranking request failed: {0}")]
    Request(String),
    #[error("ranking response malformed: {0}")]
    Malformed(String),
    #[error("ranking judge not configured")]
    NotConfigured,
}

/// Anything that can order a candidate list for an edition.
#[async_trait]
pub trait RankingJudge: Send + Sync {
    async fn judge(
        &self,
        candidates: &[NewsItem],
        edition_label: &str,
    ) -> Result<RankVerdict, RerankError>;
    fn name(&self) -> &'static str;
}

/// Reorder `candidates` by the 1-based `order`. Out-of-range and repeated ids
/// are ignored; candidates the order never mentions follow in their original
/// relative order. Returns `None` when the order names no valid candidate.
pub fn apply_external_order(candidates: Vec<NewsItem>, order: &[i64]) -> Option<Vec<NewsItem>> {
    let n = candidates.len();
    let mut slots: Vec<Option<NewsItem>> = candidates.into_iter().map(Some).collect();
    let mut ranked = Vec::with_capacity(n);

    for &id in order {
        let Some(idx) = id.checked_sub(1).and_then(|i| usize::try_from(i).ok()) else {
            continue;
        };
        if let Some(item) = slots.get_mut(idx).and_then(Option::take) {
            ranked.push(item);
        }
    }

    if ranked.is_empty() {
        return None;
    }
    ranked.extend(slots.into_iter().flatten());
    Some(ranked)
}

/// Ask `judge` to reorder the first `candidates` items; the remainder keeps its
/// heuristic order behind them. Falls back to the input order on any failure.
pub async fn rerank_items(
    mut items: Vec<NewsItem>,
    edition_label: &str,
    judge: &dyn RankingJudge,
    candidates: usize,
) -> Vec<NewsItem> {
    if items.is_empty() || candidates == 0 {
        return items;
    }
    let window = candidates.min(items.len());

    let verdict = match judge.judge(&items[..window], edition_label).await {
        Ok(v) => v,
        Err(e) => {
            warn!(target: "rank", judge = judge.name(), error = %e, "rerank failed, keeping heuristic order");
            return items;
        }
    };
    if verdict.order.is_empty() {
        warn!(target: "rank", judge = judge.name(), "rerank returned empty order, keeping heuristic order");
        return items;
    }

    let rest = items.split_off(window);
    let Some(mut ranked) = apply_external_order(items.clone(), &verdict.order) else {
        warn!(target: "rank", judge = judge.name(), "rerank order matched no candidate, keeping heuristic order");
        items.extend(rest);
        return items;
    };
    ranked.extend(rest);

    info!(target: "rank", judge = judge.name(), window, scored = verdict.scores.len(), "applied external ranking");
    ranked
}
