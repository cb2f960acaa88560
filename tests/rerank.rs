// tests/rerank.rs
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use fin_news_digest::rank::{rank_items, rerank_items, RankVerdict, RankingJudge, RerankError};
use fin_news_digest::NewsItem;

enum Reply {
    Order(Vec<i64>),
    Fail,
}

struct MockJudge {
    reply: Reply,
    saw: Mutex<Vec<String>>,
}

impl MockJudge {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            saw: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RankingJudge for MockJudge {
    async fn judge(&self, candidates: &[NewsItem], _edition: &str) -> Result<RankVerdict, RerankError> {
        *self.saw.lock().unwrap() = candidates.iter().map(|c| c.link.clone()).collect();
        match &self.reply {
            Reply::Order(order) => Ok(RankVerdict {
                order: order.clone(),
                scores: HashMap::new(),
            }),
            Reply::Fail => Err(RerankError::Request("connection refused".into())),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn three() -> Vec<NewsItem> {
    let now = Utc::now();
    ["1", "2", "3"]
        .iter()
        .enumerate()
        .map(|(i, link)| {
            NewsItem::new(
                format!("Story {link}"),
                *link,
                now - Duration::hours(i as i64),
                "",
                "Wire",
                "en",
                1,
            )
        })
        .collect()
}

fn links(items: &[NewsItem]) -> Vec<&str> {
    items.iter().map(|i| i.link.as_str()).collect()
}

#[tokio::test]
async fn partial_order_puts_unmentioned_items_last() {
    let judge = MockJudge::new(Reply::Order(vec![2, 1]));
    let out = rerank_items(three(), "Manual", &judge, 30).await;
    assert_eq!(links(&out), vec!["2", "1", "3"]);
}

#[tokio::test]
async fn failing_judge_keeps_heuristic_order() {
    let judge = MockJudge::new(Reply::Fail);
    let out = rerank_items(three(), "Manual", &judge, 30).await;
    assert_eq!(links(&out), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn empty_or_bogus_order_keeps_heuristic_order() {
    let judge = MockJudge::new(Reply::Order(vec![]));
    let out = rerank_items(three(), "Manual", &judge, 30).await;
    assert_eq!(links(&out), vec!["1", "2", "3"]);

    let judge = MockJudge::new(Reply::Order(vec![0, -4, 99]));
    let out = rerank_items(three(), "Manual", &judge, 30).await;
    assert_eq!(links(&out), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn only_the_candidate_window_is_judged() {
    let judge = MockJudge::new(Reply::Order(vec![2, 1]));
    let out = rerank_items(three(), "Manual", &judge, 2).await;
    assert_eq!(*judge.saw.lock().unwrap(), vec!["1".to_string(), "2".to_string()]);
    assert_eq!(links(&out), vec!["2", "1", "3"]);
}

#[tokio::test]
async fn duplicate_ids_are_ignored() {
    let judge = MockJudge::new(Reply::Order(vec![3, 3, 1, 3]));
    let ranked = rank_items(three(), 10, "Manual");
    let out = rerank_items(ranked, "Manual", &judge, 30).await;
    assert_eq!(links(&out), vec!["3", "1", "2"]);
}
