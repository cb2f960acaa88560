// src/llm/summary.rs
use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use super::ChatClient;
use crate::model::NewsItem;

pub const DEFAULT_SUMMARY_ITEMS: usize = 12;

/// Produces the optional overview paragraph placed above the item list.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, items: &[NewsItem], edition_label: &str) -> Option<String>;
}

pub fn build_summary_prompt(items: &[NewsItem], edition_label: &str) -> String {
    let mut lines = vec![
        "请根据以下金融新闻标题与摘要，写一段中文综合评价（120-180字）。".to_string(),
        "要求：\n- 点出最重要的宏观/政策/市场驱动\n- 语气客观专业\n- 不要列点\n- 不要引号\n".to_string(),
        format!("Edition focus: {edition_label}"),
        "新闻列表：".to_string(),
    ];
    for item in items {
        lines.push(format!("- {} | {} | {}", item.title, item.source, item.summary));
    }
    lines.join("\n")
}

pub struct OpenAiSummarizer {
    client: ChatClient,
    max_items: usize,
}

impl OpenAiSummarizer {
    pub fn new(client: ChatClient, max_items: usize) -> Self {
        Self { client, max_items }
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, items: &[NewsItem], edition_label: &str) -> Option<String> {
        if items.is_empty() || !self.client.is_configured() {
            return None;
        }
        let top = &items[..items.len().min(self.max_items)];
        let schema = json!({
            "type": "object",
            "properties": {"summary": {"type": "string"}},
            "required": ["summary"],
            "additionalProperties": false,
        });

        let value = match self
            .client
            .complete_json(
                "You output JSON only.",
                &build_summary_prompt(top, edition_label),
                "news_summary",
                schema,
            )
            .await
        {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "llm", error = %e, "summary request failed");
                return None;
            }
        };

        value
            .get("summary")
            .and_then(|s| s.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}
