// tests/market.rs
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use fin_news_digest::market::{snapshot_section, MarketConfig, MarketSnapshot};
use fin_news_digest::translate::{HttpReply, HttpRequest, HttpTransport, TransportError};

/// Answers by query parameters. QQQ is down, FEZ is rate limited, silver
/// times out; everything else has data.
#[derive(Default)]
struct Desk {
    seen: Mutex<Vec<HttpRequest>>,
}

fn param<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.query
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn quote(symbol: &str) -> String {
    format!(
        r#"{{"Global Quote": {{"01. symbol": "{symbol}", "05. price": "512.2500",
            "07. latest trading day": "2025-06-10", "09. change": "-1.5000",
            "10. change percent": "-0.2920%"}}}}"#
    )
}

const GOLD: &str = r#"{"name": "Gold", "data": [
    {"date": "2025-06-09", "value": "2300.00"},
    {"date": "2025-06-10", "value": "2323.00"}
]}"#;

const COINS: &str = r#"{
    "bitcoin": {"usd": 65000.0, "usd_24h_change": -2.0, "last_updated_at": 1749556800},
    "ethereum": {"usd": 3500, "usd_24h_change": 1.5}
}"#;

#[async_trait]
impl HttpTransport for Desk {
    async fn execute(&self, req: &HttpRequest) -> Result<HttpReply, TransportError> {
        self.seen.lock().unwrap().push(req.clone());
        match (param(req, "function"), param(req, "symbol")) {
            (Some("GLOBAL_QUOTE"), Some("QQQ")) => Ok(HttpReply::status(503)),
            (Some("GLOBAL_QUOTE"), Some("FEZ")) => {
                Ok(HttpReply::ok(r#"{"Note": "Thank you for using Alpha Vantage!"}"#))
            }
            (Some("GLOBAL_QUOTE"), Some(sym)) => Ok(HttpReply::ok(quote(sym))),
            (Some("GOLD_SILVER_HISTORY"), Some("GOLD")) => Ok(HttpReply::ok(GOLD)),
            (Some("GOLD_SILVER_HISTORY"), _) => Err(TransportError::Timeout),
            _ => Ok(HttpReply::ok(COINS)),
        }
    }
}

fn snapshot(api_key: &str, sleep: Duration) -> MarketSnapshot<Desk> {
    let cfg = MarketConfig {
        api_key: api_key.to_string(),
        sleep,
        alpha_vantage_url: "http://av.local/query".to_string(),
        coingecko_url: "http://cg.local/price".to_string(),
        ..MarketConfig::default()
    };
    MarketSnapshot::with_transport(cfg, Desk::default())
}

#[tokio::test]
async fn failed_symbols_drop_out_of_their_group() {
    let snap = snapshot("demo", Duration::ZERO);
    let sections = snap.build().await;

    let titles: Vec<_> = sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "US Major Markets",
            "Europe Major Markets",
            "China Major Markets",
            "Gold & Silver",
            "Crypto"
        ]
    );

    let us: Vec<_> = sections[0].items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(us, vec!["S&P 500", "Dow Jones"]);
    let eu: Vec<_> = sections[1].items.iter().map(|i| i.symbol.as_str()).collect();
    assert_eq!(eu, vec!["VGK", "EWU"]);
    assert_eq!(sections[2].items.len(), 3);

    let spy = &sections[0].items[0];
    assert_eq!(spy.price, Some(512.25));
    assert_eq!(spy.change, Some(-1.5));
    assert_eq!(spy.change_percent, Some(-0.292));
    assert_eq!(spy.as_of, "2025-06-10");

    let gold = &sections[3].items[0];
    assert_eq!(sections[3].items.len(), 1);
    assert_eq!(gold.name, "Gold");
    assert_eq!(gold.price, Some(2323.0));
    assert_eq!(gold.change, Some(23.0));
    assert!((gold.change_percent.unwrap() - 1.0).abs() < 1e-9);
    assert_eq!(gold.as_of, "2025-06-10");

    let btc = &sections[4].items[0];
    assert_eq!(btc.symbol, "BTC");
    assert_eq!(btc.change, Some(-1300.0));
    assert_eq!(btc.as_of, "2025-06-10 12:00 UTC");
    assert_eq!(sections[4].items[1].as_of, "");

    // The key travels with every Alpha Vantage request, never to CoinGecko.
    let seen = snap_requests(&snap);
    assert_eq!(seen.len(), 12);
    for req in &seen {
        let keyed = param(req, "apikey") == Some("demo");
        assert_eq!(keyed, req.url.starts_with("http://av.local"));
    }
}

fn snap_requests(snap: &MarketSnapshot<Desk>) -> Vec<HttpRequest> {
    snap.transport().seen.lock().unwrap().clone()
}

#[tokio::test]
async fn no_key_means_no_snapshot_and_no_calls() {
    let snap = snapshot("  ", Duration::ZERO);
    assert!(snap.build().await.is_empty());
    assert!(snap_requests(&snap).is_empty());
}

#[tokio::test(start_paused = true)]
async fn alpha_vantage_calls_are_paced() {
    let snap = snapshot("demo", Duration::from_secs(12));
    let start = tokio::time::Instant::now();
    snap.build().await;
    // Nine quotes and two metals, CoinGecko unpaced.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(11 * 12), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(11 * 12 + 1), "{elapsed:?}");
}

#[tokio::test]
async fn rendered_block_colours_moves() {
    let snap = snapshot("demo", Duration::ZERO);
    let block = snapshot_section(&snap.build().await).unwrap();
    let html = block.html.unwrap();
    assert!(html.contains("S&amp;P 500"));
    assert!(html.contains("color:#dc2626;")); // SPY down
    assert!(html.contains("color:#16a34a;")); // gold up
    assert!(block.body.contains("Gold (GOLD): 2323.00 USD +23.00 (+1.00%) 2025-06-10"));
}
