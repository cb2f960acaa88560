// src/llm/ranker.rs
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use super::{ChatClient, ChatError};
use crate::model::NewsItem;
use crate::rank::{RankVerdict, RankingJudge, RerankError};

pub const DEFAULT_CANDIDATES: usize = 30;

const SYSTEM_PROMPT: &str = "You are a strict JSON-only ranking engine.";

/// Enumerated `[id] title | source | summary` list plus editorial rules.
pub fn build_rank_prompt(candidates: &[NewsItem], edition_label: &str) -> String {
    let mut lines = vec![
        "You are a financial news editor. Rank items by importance and market impact.".to_string(),
        "Edition focus:".to_string(),
        format!("- {edition_label}"),
        "Rules:".to_string(),
        "- Prefer major policy decisions, macro releases, central bank actions, market-moving company news.".to_string(),
        "- Prefer high-impact, timely, and reputable sources.".to_string(),
        "- Avoid duplicated or low-signal items.".to_string(),
        "- Output JSON only.".to_string(),
        "Items:".to_string(),
    ];
    for (idx, item) in candidates.iter().enumerate() {
        lines.push(format!(
            "[{}] {} | {} | {}",
            idx + 1,
            item.title,
            item.source,
            item.summary
        ));
    }
    lines.push("Return JSON with: order (array of item ids) and scores (map id->0-100).".to_string());
    lines.join("\n")
}

impl From<ChatError> for RerankError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::NotConfigured => RerankError::NotConfigured,
            ChatError::Malformed(m) => RerankError::Malformed(m),
            other => RerankError::Request(other.to_string()),
        }
    }
}

pub struct OpenAiRanker {
    client: ChatClient,
}

impl OpenAiRanker {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RankingJudge for OpenAiRanker {
    async fn judge(
        &self,
        candidates: &[NewsItem],
        edition_label: &str,
    ) -> Result<RankVerdict, RerankError> {
        #[derive(Deserialize)]
        struct Reply {
            order: Vec<i64>,
            #[serde(default)]
            scores: HashMap<String, f64>,
        }

        let schema = json!({
            "type": "object",
            "properties": {
                "order": {"type": "array", "items": {"type": "integer"}},
                "scores": {"type": "object", "additionalProperties": {"type": "number"}},
            },
            "required": ["order", "scores"],
            "additionalProperties": false,
        });
        let prompt = build_rank_prompt(candidates, edition_label);
        let value = self
            .client
            .complete_json(SYSTEM_PROMPT, &prompt, "news_ranker", schema)
            .await?;
        let reply: Reply =
            serde_json::from_value(value).map_err(|e| RerankError::Malformed(e.to_string()))?;
        Ok(RankVerdict {
            order: reply.order,
            scores: reply.scores,
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
