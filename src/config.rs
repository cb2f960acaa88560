// src/config.rs
//! Environment-driven configuration. Every key `NAME` falls back to `FIN_NAME`.

use std::path::PathBuf;
use std::time::Duration;

use crate::llm::ranker::DEFAULT_CANDIDATES;
use crate::llm::summary::DEFAULT_SUMMARY_ITEMS;
use crate::llm::{ChatConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::market::MarketConfig;
use crate::notify::SmtpSettings;
use crate::translate::{RetryPolicy, TranslatorConfig};

pub const DEFAULT_SOURCES_FILE: &str = "config/sources.json";
pub const DEFAULT_STATE_FILE: &str = "state/sent.json";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("RECIPIENTS is empty")]
    MissingRecipients,
    #[error("SMTP_HOST is empty")]
    MissingSmtpHost,
    #[error("SMTP_FROM or SMTP_USER must be set")]
    MissingSender,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub recipients: Vec<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub smtp_from: String,
    pub smtp_use_tls: bool,

    pub translate_provider: String,
    pub translate_endpoint: String,
    pub translate_api_key: String,
    pub translate_sleep_seconds: f64,
    pub translate_max_retries: u32,
    pub translate_backoff_base_seconds: f64,
    pub translate_backoff_max_seconds: f64,
    pub translate_cache_max_entries: usize,

    pub lookback_hours: i64,
    pub state_ttl_hours: i64,
    pub max_items: usize,
    pub sources_file: PathBuf,
    pub state_file: PathBuf,
    pub log_level: String,

    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub openai_rerank: bool,
    pub openai_rerank_candidates: usize,
    pub openai_summary: bool,
    pub openai_summary_items: usize,

    pub market_snapshot: bool,
    pub alpha_vantage_api_key: String,
    pub alpha_vantage_sleep_seconds: f64,
}

fn parse_bool(raw: Option<String>, default: bool) -> bool {
    match raw {
        Some(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        None => default,
    }
}

fn parse_num<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn secs(v: f64) -> Duration {
    Duration::try_from_secs_f64(v.max(0.0)).unwrap_or(Duration::ZERO)
}

impl Config {
    /// Read from the process environment (call `dotenvy::dotenv()` first).
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| -> Option<String> {
            lookup(name)
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(&format!("FIN_{name}")).filter(|v| !v.is_empty()))
        };
        let text = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let recipients = get("RECIPIENTS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            recipients,
            smtp_host: text("SMTP_HOST", ""),
            smtp_port: parse_num(get("SMTP_PORT"), 587),
            smtp_user: text("SMTP_USER", ""),
            smtp_pass: text("SMTP_PASS", ""),
            smtp_from: text("SMTP_FROM", ""),
            smtp_use_tls: parse_bool(get("SMTP_USE_TLS"), true),

            translate_provider: text("TRANSLATE_PROVIDER", "mymemory"),
            translate_endpoint: text("TRANSLATE_ENDPOINT", ""),
            translate_api_key: text("TRANSLATE_API_KEY", ""),
            translate_sleep_seconds: parse_num(get("TRANSLATE_SLEEP_SECONDS"), 1.0),
            translate_max_retries: parse_num(get("TRANSLATE_MAX_RETRIES"), 3),
            translate_backoff_base_seconds: parse_num(get("TRANSLATE_BACKOFF_BASE_SECONDS"), 1.0),
            translate_backoff_max_seconds: parse_num(get("TRANSLATE_BACKOFF_MAX_SECONDS"), 30.0),
            translate_cache_max_entries: parse_num(get("TRANSLATE_CACHE_MAX_ENTRIES"), 2048),

            lookback_hours: parse_num(get("LOOKBACK_HOURS"), 36),
            state_ttl_hours: parse_num(get("STATE_TTL_HOURS"), 72),
            max_items: parse_num(get("MAX_ITEMS"), 40),
            sources_file: PathBuf::from(text("SOURCES_FILE", DEFAULT_SOURCES_FILE)),
            state_file: PathBuf::from(text("STATE_FILE", DEFAULT_STATE_FILE)),
            log_level: text("LOG_LEVEL", "info"),

            openai_api_key: text("OPENAI_API_KEY", ""),
            openai_model: text("OPENAI_MODEL", DEFAULT_MODEL),
            openai_base_url: text("OPENAI_BASE_URL", DEFAULT_BASE_URL),
            openai_rerank: parse_bool(get("OPENAI_RERANK"), false),
            openai_rerank_candidates: parse_num(get("OPENAI_RERANK_CANDIDATES"), DEFAULT_CANDIDATES),
            openai_summary: parse_bool(get("OPENAI_SUMMARY"), false),
            openai_summary_items: parse_num(get("OPENAI_SUMMARY_ITEMS"), DEFAULT_SUMMARY_ITEMS),

            market_snapshot: parse_bool(get("MARKET_SNAPSHOT"), false),
            alpha_vantage_api_key: text("ALPHA_VANTAGE_API_KEY", ""),
            alpha_vantage_sleep_seconds: parse_num(get("ALPHA_VANTAGE_SLEEP_SECONDS"), 12.0),
        }
    }

    /// Fatal checks, run before any network or state activity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recipients.is_empty() {
            return Err(ConfigError::MissingRecipients);
        }
        if self.smtp_host.trim().is_empty() {
            return Err(ConfigError::MissingSmtpHost);
        }
        if self.sender().is_none() {
            return Err(ConfigError::MissingSender);
        }
        Ok(())
    }

    /// `SMTP_FROM`, else `SMTP_USER`.
    pub fn sender(&self) -> Option<&str> {
        [self.smtp_from.as_str(), self.smtp_user.as_str()]
            .into_iter()
            .find(|s| !s.trim().is_empty())
    }

    pub fn translator(&self) -> TranslatorConfig {
        TranslatorConfig {
            provider: self.translate_provider.clone(),
            endpoint: self.translate_endpoint.clone(),
            api_key: self.translate_api_key.clone(),
            sleep: secs(self.translate_sleep_seconds),
            retry: RetryPolicy {
                max_retries: self.translate_max_retries,
                backoff_base: secs(self.translate_backoff_base_seconds),
                backoff_max: secs(self.translate_backoff_max_seconds),
            },
            cache_max_entries: self.translate_cache_max_entries,
            ..TranslatorConfig::default()
        }
    }

    pub fn chat(&self) -> ChatConfig {
        ChatConfig {
            api_key: self.openai_api_key.clone(),
            model: self.openai_model.clone(),
            base_url: self.openai_base_url.clone(),
            ..ChatConfig::default()
        }
    }

    pub fn smtp(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            use_tls: self.smtp_use_tls,
            user: self.smtp_user.clone(),
            password: self.smtp_pass.clone(),
        }
    }

    pub fn llm_enabled(&self) -> bool {
        !self.openai_api_key.trim().is_empty()
    }

    /// Snapshot requested and an Alpha Vantage key present.
    pub fn market_enabled(&self) -> bool {
        self.market_snapshot && !self.alpha_vantage_api_key.trim().is_empty()
    }

    pub fn market(&self) -> MarketConfig {
        MarketConfig {
            api_key: self.alpha_vantage_api_key.clone(),
            sleep: secs(self.alpha_vantage_sleep_seconds),
            ..MarketConfig::default()
        }
    }
}
