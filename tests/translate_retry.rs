// tests/translate_retry.rs
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use fin_news_digest::translate::retry::{parse_retry_after, request_with_retries};
use fin_news_digest::translate::{
    new_shared_cache, HttpReply, HttpRequest, HttpTransport, RetryPolicy, SharedCache, Translate,
    Translator, TranslatorConfig, TransportError,
};

/// Replays a fixed script of replies; once exhausted every call times out.
struct Scripted {
    script: Mutex<VecDeque<Result<HttpReply, TransportError>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<HttpRequest>>,
}

impl Scripted {
    fn new(script: Vec<Result<HttpReply, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for Scripted {
    async fn execute(&self, req: &HttpRequest) -> Result<HttpReply, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(req.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(TransportError::Timeout))
    }
}

fn mymemory_ok(text: &str) -> Result<HttpReply, TransportError> {
    Ok(HttpReply::ok(format!(
        r#"{{"responseData": {{"translatedText": "{text}"}}}}"#
    )))
}

fn cfg(provider: &str, max_retries: u32) -> TranslatorConfig {
    TranslatorConfig {
        provider: provider.to_string(),
        endpoint: "http://lt.local/translate".to_string(),
        sleep: Duration::ZERO,
        retry: RetryPolicy::immediate(max_retries),
        ..TranslatorConfig::default()
    }
}

fn translator(
    provider: &str,
    max_retries: u32,
    script: Vec<Result<HttpReply, TransportError>>,
) -> (Translator<Scripted>, SharedCache) {
    let cache = new_shared_cache(16);
    let t = Translator::with_transport(&cfg(provider, max_retries), cache.clone(), Scripted::new(script));
    (t, cache)
}

#[tokio::test]
async fn cache_hit_skips_the_network() {
    let (t, _cache) = translator("mymemory", 3, vec![mymemory_ok("美联储加息")]);
    let first = t.translate("Fed raises rates", "en", "zh-CN").await;
    let second = t.translate("Fed raises rates", "en", "zh-CN").await;
    assert_eq!(first, "美联储加息");
    assert_eq!(second, "美联储加息");
    assert_eq!(t.transport().calls(), 1);
}

#[tokio::test]
async fn recovers_after_max_retries_failures() {
    let script = vec![
        Err(TransportError::Timeout),
        Ok(HttpReply::status(503)),
        Err(TransportError::Request("reset".into())),
        mymemory_ok("黄金创新高"),
    ];
    let (t, _cache) = translator("mymemory", 3, script);
    assert_eq!(t.translate("Gold hits record", "en", "zh-CN").await, "黄金创新高");
    assert_eq!(t.transport().calls(), 4);
}

#[tokio::test]
async fn persistent_failure_returns_original_and_memoizes_it() {
    let (t, cache) = translator("mymemory", 2, vec![]);
    assert_eq!(t.translate("Oil slides", "en", "zh-CN").await, "Oil slides");
    assert_eq!(t.transport().calls(), 3);

    // The fallback is cached: no further calls for the same text.
    assert_eq!(t.translate("Oil slides", "en", "zh-CN").await, "Oil slides");
    assert_eq!(t.transport().calls(), 3);
    assert_eq!(cache.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn throttled_then_ok_honours_retry_after() {
    let throttled = HttpReply {
        status: 429,
        retry_after: Some("0".to_string()),
        body: String::new(),
    };
    let (t, _cache) = translator("mymemory", 3, vec![Ok(throttled), mymemory_ok("日元走弱")]);
    assert_eq!(t.translate("Yen weakens", "en", "zh-CN").await, "日元走弱");
    assert_eq!(t.transport().calls(), 2);
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let (t, _cache) = translator("mymemory", 3, vec![Ok(HttpReply::status(400)), mymemory_ok("x")]);
    assert_eq!(t.translate("Bad request", "en", "zh-CN").await, "Bad request");
    assert_eq!(t.transport().calls(), 1);
}

#[tokio::test]
async fn malformed_or_incomplete_body_falls_back() {
    let (t, _cache) = translator(
        "mymemory",
        0,
        vec![Ok(HttpReply::ok("<html>oops</html>")), Ok(HttpReply::ok(r#"{"responseData": {}}"#))],
    );
    assert_eq!(t.translate("first", "en", "zh-CN").await, "first");
    assert_eq!(t.translate("second", "en", "zh-CN").await, "second");
    assert_eq!(t.transport().calls(), 2);
}

#[tokio::test]
async fn empty_text_never_calls_out() {
    let (t, cache) = translator("mymemory", 3, vec![mymemory_ok("x")]);
    assert_eq!(t.translate("", "en", "zh-CN").await, "");
    assert_eq!(t.transport().calls(), 0);
    assert!(cache.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_provider_passes_text_through() {
    let (t, _cache) = translator("deepl", 3, vec![mymemory_ok("x")]);
    assert_eq!(t.provider_name(), "none");
    assert_eq!(t.translate("Stocks rally", "en", "zh-CN").await, "Stocks rally");
    assert_eq!(t.transport().calls(), 0);
}

#[tokio::test]
async fn libretranslate_posts_json_and_reads_translated_text() {
    let (t, _cache) = translator(
        "libretranslate",
        1,
        vec![Ok(HttpReply::ok(r#"{"translatedText": "China stocks rally"}"#))],
    );
    assert_eq!(t.translate("A股上涨", "zh-CN", "en").await, "China stocks rally");
    let seen = t.transport().seen.lock().unwrap();
    assert_eq!(seen[0].url, "http://lt.local/translate");
    assert_eq!(seen[0].json.as_ref().unwrap()["source"], "zh-CN");
}

#[tokio::test]
async fn shared_cache_is_resized_to_config() {
    let cache = new_shared_cache(16);
    let mut c = cfg("mymemory", 0);
    c.cache_max_entries = 1;
    let script = vec![mymemory_ok("一"), mymemory_ok("二"), mymemory_ok("一")];
    let t = Translator::with_transport(&c, cache.clone(), Scripted::new(script));
    assert_eq!(cache.lock().unwrap().capacity(), 1);

    t.translate("one", "en", "zh-CN").await;
    t.translate("two", "en", "zh-CN").await;
    // "one" was evicted by "two", so it goes back to the network.
    t.translate("one", "en", "zh-CN").await;
    assert_eq!(t.transport().calls(), 3);
    assert_eq!(cache.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn retry_loop_gives_up_on_repeated_server_errors() {
    let transport = Scripted::new(vec![
        Ok(HttpReply::status(500)),
        Ok(HttpReply::status(502)),
        Ok(HttpReply::status(503)),
    ]);
    let req = HttpRequest {
        method: fin_news_digest::translate::transport::Method::Get,
        url: "http://t.local".into(),
        query: vec![],
        json: None,
        timeout: Duration::from_secs(1),
    };
    let out = request_with_retries(&transport, &req, "test", &RetryPolicy::immediate(2)).await;
    assert!(out.is_none());
    assert_eq!(transport.calls(), 3);
}

#[test]
fn backoff_schedule_is_capped() {
    let p = RetryPolicy {
        max_retries: 5,
        backoff_base: Duration::from_secs(1),
        backoff_max: Duration::from_secs(30),
    };
    let delays: Vec<u64> = (0..7).map(|a| p.delay_for(a).as_secs()).collect();
    assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
    assert_eq!(parse_retry_after(Some(" 12 ")), Some(Duration::from_secs(12)));
    assert_eq!(parse_retry_after(Some("Wed, 21 Oct 2015 07:28:00 GMT")), None);
}

#[tokio::test(start_paused = true)]
async fn pacing_pause_follows_network_replies_only() {
    let cfg = TranslatorConfig {
        sleep: Duration::from_secs(2),
        ..cfg("mymemory", 0)
    };
    let t = Translator::with_transport(
        &cfg,
        new_shared_cache(16),
        Scripted::new(vec![mymemory_ok("美联储加息")]),
    );

    let start = tokio::time::Instant::now();
    assert_eq!(t.translate("Fed raises rates", "en", "zh-CN").await, "美联储加息");
    let first = start.elapsed();
    assert!(first >= Duration::from_secs(2) && first < Duration::from_millis(2100), "{first:?}");

    let start = tokio::time::Instant::now();
    assert_eq!(t.translate("Fed raises rates", "en", "zh-CN").await, "美联储加息");
    assert!(start.elapsed() < Duration::from_millis(1));
    assert_eq!(t.transport().calls(), 1);
}

fn throttled(retry_after: &str) -> Result<HttpReply, TransportError> {
    Ok(HttpReply {
        status: 429,
        retry_after: Some(retry_after.to_string()),
        body: String::new(),
    })
}

fn slow_policy() -> TranslatorConfig {
    TranslatorConfig {
        retry: RetryPolicy {
            max_retries: 2,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(10),
        },
        ..cfg("mymemory", 2)
    }
}

#[tokio::test(start_paused = true)]
async fn retry_after_sets_the_wait() {
    let t = Translator::with_transport(
        &slow_policy(),
        new_shared_cache(16),
        Scripted::new(vec![throttled("7"), mymemory_ok("黄金创新高")]),
    );
    let start = tokio::time::Instant::now();
    assert_eq!(t.translate("Gold hits record", "en", "zh-CN").await, "黄金创新高");
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(7) && waited < Duration::from_secs(8), "{waited:?}");
    assert_eq!(t.transport().calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn retry_after_is_capped_by_backoff_max() {
    let t = Translator::with_transport(
        &slow_policy(),
        new_shared_cache(16),
        Scripted::new(vec![throttled("120"), mymemory_ok("黄金创新高")]),
    );
    let start = tokio::time::Instant::now();
    t.translate("Gold hits record", "en", "zh-CN").await;
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(11), "{waited:?}");
}
