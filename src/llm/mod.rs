// src/llm/mod.rs
//! OpenAI-compatible chat client used for external ranking and the Chinese
//! overview paragraph. Both callers treat every failure as "no answer".

pub mod ranker;
pub mod summary;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

pub use ranker::OpenAiRanker;
pub use summary::{OpenAiSummarizer, Summarizer};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("no API key configured")]
    NotConfigured,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

pub struct ChatClient {
    http: reqwest::Client,
    cfg: ChatConfig,
}

impl ChatClient {
    pub fn new(cfg: ChatConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("fin-news-digest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(cfg.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, cfg }
    }

    pub fn is_configured(&self) -> bool {
        !self.cfg.api_key.trim().is_empty()
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.cfg.base_url.trim_end_matches('/'))
    }

    /// Send one system + user exchange constrained by a strict JSON schema and
    /// return the decoded JSON object from the first choice.
    pub async fn complete_json(
        &self,
        system: &str,
        user: &str,
        schema_name: &str,
        schema: Value,
    ) -> Result<Value, ChatError> {
        if !self.is_configured() {
            return Err(ChatError::NotConfigured);
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            response_format: Value,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let req = Req {
            model: &self.cfg.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            response_format: json_schema_format(schema_name, schema),
        };

        let resp = self
            .http
            .post(self.url())
            .bearer_auth(&self.cfg.api_key)
            .json(&req)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ChatError::Status(resp.status().as_u16()));
        }
        let body: Resp = resp.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ChatError::Malformed("no choices".to_string()))?;
        serde_json::from_str(&content).map_err(|e| ChatError::Malformed(e.to_string()))
    }
}

fn json_schema_format(name: &str, schema: Value) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": name,
            "strict": true,
            "schema": schema,
        }
    })
}
