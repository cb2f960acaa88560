// src/translate/mod.rs
//! Translation client: provider selection, shared LRU cache, retry with
//! backoff, and graceful fallback to the original text.
//!
//! A translation never fails from the caller's point of view. Whatever goes
//! wrong (network, throttling, bad JSON, missing field) the input comes back
//! unchanged, and that result is memoized like any other.

pub mod cache;
pub mod providers;
pub mod retry;
pub mod transport;

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

pub use cache::{CacheKey, TranslationCache};
pub use providers::Provider;
pub use retry::RetryPolicy;
pub use transport::{HttpReply, HttpRequest, HttpTransport, ReqwestTransport, TransportError};

/// The cache is created once per run (or per process) and handed to every
/// translator built during that time.
pub type SharedCache = Arc<Mutex<TranslationCache>>;

pub fn new_shared_cache(max_entries: usize) -> SharedCache {
    Arc::new(Mutex::new(TranslationCache::new(max_entries)))
}

/// One capability: turn `text` from `source_lang` into `target_lang`.
#[async_trait]
pub trait Translate: Send + Sync {
    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> String;
    fn provider_name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    pub provider: String,
    pub endpoint: String,
    pub api_key: String,
    /// Pause after every successful network call.
    pub sleep: Duration,
    pub retry: RetryPolicy,
    pub cache_max_entries: usize,
    pub timeout: Duration,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            provider: "mymemory".to_string(),
            endpoint: String::new(),
            api_key: String::new(),
            sleep: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            cache_max_entries: cache::DEFAULT_CACHE_ENTRIES,
            timeout: transport::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct Translator<T: HttpTransport = ReqwestTransport> {
    provider: Provider,
    transport: T,
    retry: RetryPolicy,
    sleep: Duration,
    timeout: Duration,
    cache: SharedCache,
}

/// Build a network translator from config. Resizes `cache` to the configured
/// capacity; unknown provider names yield a pass-through translator.
pub fn build_translator(cfg: &TranslatorConfig, cache: SharedCache) -> Translator {
    Translator::with_transport(cfg, cache, ReqwestTransport::new())
}

impl<T: HttpTransport> Translator<T> {
    pub fn with_transport(cfg: &TranslatorConfig, cache: SharedCache, transport: T) -> Self {
        cache
            .lock()
            .expect("translation cache poisoned")
            .resize(cfg.cache_max_entries);
        Self {
            provider: Provider::from_name(&cfg.provider, &cfg.endpoint, &cfg.api_key),
            transport,
            retry: cfg.retry,
            sleep: cfg.sleep,
            timeout: cfg.timeout,
            cache,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn translate_impl(&self, text: &str, source_lang: &str, target_lang: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let Some(endpoint) = self.provider.endpoint() else {
            return text.to_string();
        };
        let label = self.provider.label();

        // 1) Cache lookup.
        let key = CacheKey::new(label, endpoint, source_lang, target_lang, text);
        let cached = self.cache.lock().expect("translation cache poisoned").get(&key);
        if let Some(hit) = cached {
            debug!(target: "translate", provider = label, "cache hit");
            return hit;
        }

        // 2) Network call with retries.
        let result = match self
            .provider
            .build_request(text, source_lang, target_lang, self.timeout)
        {
            None => text.to_string(),
            Some(req) => {
                match retry::request_with_retries(&self.transport, &req, label, &self.retry).await {
                    None => text.to_string(),
                    Some(reply) => {
                        let out = match serde_json::from_str::<serde_json::Value>(&reply.body) {
                            Ok(body) => self
                                .provider
                                .extract(&body)
                                .unwrap_or_else(|| text.to_string()),
                            Err(e) => {
                                warn!(target: "translate", provider = label, error = %e, "translation response was not valid JSON, returning original text");
                                text.to_string()
                            }
                        };
                        if !self.sleep.is_zero() {
                            tokio::time::sleep(self.sleep).await;
                        }
                        out
                    }
                }
            }
        };

        // 3) Memoize, including fallbacks.
        self.cache
            .lock()
            .expect("translation cache poisoned")
            .insert(key, result.clone());
        result
    }
}

#[async_trait]
impl<T: HttpTransport> Translate for Translator<T> {
    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> String {
        self.translate_impl(text, source_lang, target_lang).await
    }

    fn provider_name(&self) -> &'static str {
        self.provider.label()
    }
}

/// Pass-through translator; handy where no translation is wanted at all.
pub struct NullTranslator;

#[async_trait]
impl Translate for NullTranslator {
    async fn translate(&self, text: &str, _source_lang: &str, _target_lang: &str) -> String {
        text.to_string()
    }

    fn provider_name(&self) -> &'static str {
        "none"
    }
}
