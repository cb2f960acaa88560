// src/market.rs
//! Market snapshot: ETF proxies for the major index groups, gold and silver,
//! and the two largest coins. Every quote degrades on its own; a failed
//! symbol is logged and left out of the section.

use chrono::DateTime;
use html_escape::encode_text;
use metrics::counter;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::notify::ExtraSection;
use crate::translate::transport::{
    HttpRequest, HttpTransport, Method, ReqwestTransport, TransportError, DEFAULT_REQUEST_TIMEOUT,
};

pub const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co/query";
pub const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
pub const SNAPSHOT_SECTION_TITLE: &str = "Market Snapshot";

const UP: &str = "#16a34a";
const DOWN: &str = "#dc2626";
const FLAT: &str = "#64748b";

/// (symbol, display name) per index group.
const INDEX_GROUPS: [(&str, [(&str, &str); 3]); 3] = [
    (
        "US Major Markets",
        [("SPY", "S&P 500"), ("QQQ", "Nasdaq 100"), ("DIA", "Dow Jones")],
    ),
    (
        "Europe Major Markets",
        [("VGK", "Europe"), ("FEZ", "Euro Stoxx 50"), ("EWU", "UK FTSE")],
    ),
    (
        "China Major Markets",
        [("FXI", "China Large Cap"), ("KWEB", "China Tech"), ("ASHR", "China A-Shares")],
    ),
];
const METALS: [&str; 2] = ["GOLD", "SILVER"];
const COINS: [(&str, &str); 2] = [("bitcoin", "BTC"), ("ethereum", "ETH")];

#[derive(Debug, Clone, PartialEq)]
pub struct MarketItem {
    pub name: String,
    pub symbol: String,
    pub price: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub currency: String,
    pub as_of: String,
}

impl MarketItem {
    /// Green up, red down, slate for flat or unknown.
    pub fn change_color(&self) -> &'static str {
        match self.change.or(self.change_percent) {
            Some(v) if v > 0.0 => UP,
            Some(v) if v < 0.0 => DOWN,
            _ => FLAT,
        }
    }

    fn price_text(&self) -> String {
        match self.price {
            Some(p) => format!("{p:.2} {}", self.currency),
            None => "n/a".to_string(),
        }
    }

    fn change_text(&self) -> String {
        match (self.change, self.change_percent) {
            (Some(c), Some(p)) => format!("{c:+.2} ({p:+.2}%)"),
            (Some(c), None) => format!("{c:+.2}"),
            (None, Some(p)) => format!("{p:+.2}%"),
            (None, None) => "n/a".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketSection {
    pub title: String,
    pub items: Vec<MarketItem>,
}

#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no data for {0}")]
    Empty(String),
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub api_key: String,
    /// Pause after every Alpha Vantage request (free tier is 5 calls/min).
    pub sleep: Duration,
    pub alpha_vantage_url: String,
    pub coingecko_url: String,
    pub timeout: Duration,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            sleep: Duration::from_secs(12),
            alpha_vantage_url: ALPHA_VANTAGE_URL.to_string(),
            coingecko_url: COINGECKO_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

// --- wire shapes ---

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(rename = "Global Quote", default)]
    quote: Option<GlobalQuote>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "07. latest trading day", default)]
    latest_day: String,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetalHistory {
    #[serde(default)]
    data: Vec<MetalPoint>,
    #[serde(rename = "Time Series (Daily)", default)]
    daily: BTreeMap<String, DailyBar>,
}

#[derive(Debug, Deserialize)]
struct MetalPoint {
    #[serde(default)]
    date: String,
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "4. close")]
    close: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoinQuote {
    usd: Option<f64>,
    usd_24h_change: Option<f64>,
    last_updated_at: Option<i64>,
}

fn parse_num(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches('%').trim().parse().ok()
}

fn value_num(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_num(s),
        _ => None,
    }
}

/// Newest and previous closes from either metals history layout.
fn latest_two(history: MetalHistory) -> Option<(String, Option<f64>, Option<f64>)> {
    let mut points: Vec<(String, Option<f64>)> = if !history.data.is_empty() {
        history
            .data
            .into_iter()
            .map(|p| (p.date, p.value.as_ref().and_then(value_num)))
            .collect()
    } else {
        history
            .daily
            .into_iter()
            .map(|(date, bar)| (date, bar.close.as_deref().and_then(parse_num)))
            .collect()
    };
    // ISO dates sort lexically.
    points.sort_by(|a, b| b.0.cmp(&a.0));
    let mut it = points.into_iter();
    let (date, latest) = it.next()?;
    let prev = it.next().and_then(|(_, v)| v);
    Some((date, latest, prev))
}

pub struct MarketSnapshot<T: HttpTransport = ReqwestTransport> {
    cfg: MarketConfig,
    transport: T,
}

impl MarketSnapshot {
    pub fn new(cfg: MarketConfig) -> Self {
        Self::with_transport(cfg, ReqwestTransport::new())
    }
}

impl<T: HttpTransport> MarketSnapshot<T> {
    pub fn with_transport(cfg: MarketConfig, transport: T) -> Self {
        Self { cfg, transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn get_json<R: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<R, MarketError> {
        let req = HttpRequest {
            method: Method::Get,
            url: url.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            json: None,
            timeout: self.cfg.timeout,
        };
        let reply = self.transport.execute(&req).await?;
        if !reply.is_success() {
            return Err(MarketError::Status(reply.status));
        }
        Ok(serde_json::from_str(&reply.body)?)
    }

    async fn pace(&self) {
        if !self.cfg.sleep.is_zero() {
            tokio::time::sleep(self.cfg.sleep).await;
        }
    }

    /// Latest daily quote for an exchange-traded symbol.
    pub async fn quote(&self, symbol: &str) -> Result<MarketItem, MarketError> {
        let env: QuoteEnvelope = self
            .get_json(
                &self.cfg.alpha_vantage_url,
                &[
                    ("function", "GLOBAL_QUOTE"),
                    ("symbol", symbol),
                    ("apikey", self.cfg.api_key.as_str()),
                ],
            )
            .await?;
        // Rate-limit notes arrive as 200 with no quote.
        let q = env
            .quote
            .filter(|q| q.price.is_some())
            .ok_or_else(|| MarketError::Empty(symbol.to_string()))?;
        Ok(MarketItem {
            name: symbol.to_string(),
            symbol: symbol.to_string(),
            price: q.price.as_deref().and_then(parse_num),
            change: q.change.as_deref().and_then(parse_num),
            change_percent: q.change_percent.as_deref().and_then(parse_num),
            currency: "USD".to_string(),
            as_of: q.latest_day,
        })
    }

    /// Day-over-day move from the metals history endpoint.
    pub async fn metal(&self, symbol: &str) -> Result<MarketItem, MarketError> {
        let history: MetalHistory = self
            .get_json(
                &self.cfg.alpha_vantage_url,
                &[
                    ("function", "GOLD_SILVER_HISTORY"),
                    ("symbol", symbol),
                    ("interval", "daily"),
                    ("apikey", self.cfg.api_key.as_str()),
                ],
            )
            .await?;
        let (as_of, price, prev) =
            latest_two(history).ok_or_else(|| MarketError::Empty(symbol.to_string()))?;
        let change = price.zip(prev).map(|(p, q)| p - q);
        let change_percent = change.zip(prev).and_then(|(c, q)| (q != 0.0).then(|| c / q * 100.0));
        let name = if matches!(symbol, "GOLD" | "XAU") { "Gold" } else { "Silver" };
        Ok(MarketItem {
            name: name.to_string(),
            symbol: symbol.to_string(),
            price,
            change,
            change_percent,
            currency: "USD".to_string(),
            as_of,
        })
    }

    /// BTC and ETH spot with 24h change. Coins missing from the reply are skipped.
    pub async fn coins(&self) -> Result<Vec<MarketItem>, MarketError> {
        let ids = COINS.map(|(id, _)| id).join(",");
        let data: HashMap<String, CoinQuote> = self
            .get_json(
                &self.cfg.coingecko_url,
                &[
                    ("ids", ids.as_str()),
                    ("vs_currencies", "usd"),
                    ("include_24hr_change", "true"),
                    ("include_last_updated_at", "true"),
                ],
            )
            .await?;
        Ok(COINS
            .iter()
            .filter_map(|(id, ticker)| {
                let info = data.get(*id)?;
                let price = info.usd?;
                let change = info.usd_24h_change.map(|pct| price * pct / 100.0);
                let as_of = info
                    .last_updated_at
                    .and_then(|ts| DateTime::from_timestamp(ts, 0))
                    .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_default();
                Some(MarketItem {
                    name: ticker.to_string(),
                    symbol: ticker.to_string(),
                    price: Some(price),
                    change,
                    change_percent: info.usd_24h_change,
                    currency: "USD".to_string(),
                    as_of,
                })
            })
            .collect())
    }

    /// Collect every group. Returns nothing without an API key; groups whose
    /// every symbol failed are dropped.
    pub async fn build(&self) -> Vec<MarketSection> {
        if self.cfg.api_key.trim().is_empty() {
            debug!(target: "market", "no Alpha Vantage key; snapshot skipped");
            return Vec::new();
        }

        let mut sections = Vec::new();
        for (title, group) in INDEX_GROUPS {
            let mut items = Vec::new();
            for (symbol, label) in group {
                match self.quote(symbol).await {
                    Ok(mut item) => {
                        item.name = label.to_string();
                        items.push(item);
                    }
                    Err(e) => {
                        counter!("digest_market_quote_failures_total").increment(1);
                        warn!(target: "market", symbol, error = %e, "quote unavailable");
                    }
                }
                self.pace().await;
            }
            push_section(&mut sections, title, items);
        }

        let mut metals = Vec::new();
        for symbol in METALS {
            match self.metal(symbol).await {
                Ok(item) => metals.push(item),
                Err(e) => {
                    counter!("digest_market_quote_failures_total").increment(1);
                    warn!(target: "market", symbol, error = %e, "metal history unavailable");
                }
            }
            self.pace().await;
        }
        push_section(&mut sections, "Gold & Silver", metals);

        match self.coins().await {
            Ok(coins) => push_section(&mut sections, "Crypto", coins),
            Err(e) => {
                counter!("digest_market_quote_failures_total").increment(1);
                warn!(target: "market", error = %e, "crypto prices unavailable");
            }
        }

        let quotes: usize = sections.iter().map(|s| s.items.len()).sum();
        info!(target: "market", sections = sections.len(), quotes, "market snapshot built");
        sections
    }
}

fn push_section(out: &mut Vec<MarketSection>, title: &str, items: Vec<MarketItem>) {
    if !items.is_empty() {
        out.push(MarketSection {
            title: title.to_string(),
            items,
        });
    }
}

/// One digest block for the whole snapshot: a plain listing plus an HTML table
/// with colour-coded changes. `None` when there is nothing to show.
pub fn snapshot_section(sections: &[MarketSection]) -> Option<ExtraSection> {
    if sections.is_empty() {
        return None;
    }
    let mut text = String::new();
    let mut html = String::new();
    for s in sections {
        let _ = writeln!(text, "{}", s.title);
        let _ = write!(
            html,
            "<h3 style=\"font-size:14px;margin:8px 0 4px;\">{}</h3>\
             <table style=\"border-collapse:collapse;width:100%;font-size:13px;\">",
            encode_text(&s.title)
        );
        for it in &s.items {
            let _ = writeln!(
                text,
                "  {} ({}): {} {} {}",
                it.name,
                it.symbol,
                it.price_text(),
                it.change_text(),
                it.as_of
            );
            let _ = write!(
                html,
                "<tr><td>{}</td><td style=\"text-align:right;\">{}</td>\
                 <td style=\"text-align:right;color:{};\">{}</td>\
                 <td style=\"color:#64748b;text-align:right;\">{}</td></tr>",
                encode_text(&it.name),
                encode_text(&it.price_text()),
                it.change_color(),
                encode_text(&it.change_text()),
                encode_text(&it.as_of)
            );
        }
        html.push_str("</table>");
    }
    Some(ExtraSection {
        title: SNAPSHOT_SECTION_TITLE.to_string(),
        body: text.trim_end().to_string(),
        html: Some(html),
    })
}
