// src/digest.rs
//! One digest run, end to end:
//!
//! validate config → fetch → recency filter → dedupe → ledger filter → rank
//! (→ external rerank) → translate → summary → build → send → persist ledger.
//!
//! The ledger is written only after the mail went out. Marking happens earlier,
//! inside the ledger filter, so anything that passed it counts as sent once the
//! run succeeds, even if `max_items` cut it from the email.

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::config::{Config, ConfigError};
use crate::dedupe::{dedupe_items, filter_recent_at, DEFAULT_SIMILARITY_THRESHOLD};
use crate::enrich::add_bilingual_fields;
use crate::ingest::{fetch_all, load_sources, providers_for, types::FeedProvider};
use crate::llm::Summarizer;
use crate::model::NewsItem;
use crate::notify::{subject_for, DigestMessage, ExtraSection, Mailer};
use crate::rank::{rank_items, rerank_items, RankingJudge};
use crate::state::Ledger;
use crate::translate::Translate;

pub const SUMMARY_SECTION_TITLE: &str = "今日综述";
const PREVIEW_ADDRESS: &str = "preview@example.com";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_items_fetched_total", "Items returned by all feeds.");
        describe_counter!(
            "digest_items_deduped_total",
            "Items removed by the recency window or near-duplicate collapsing."
        );
        describe_counter!(
            "digest_items_suppressed_total",
            "Items suppressed because the ledger already lists their link."
        );
        describe_counter!("digest_runs_total", "Digest runs by outcome.");
    });
}

/// Where the run gets its feeds from.
pub enum Feeds {
    /// Load `cfg.sources_file` and fetch every source over HTTP.
    SourcesFile,
    Providers(Vec<Box<dyn FeedProvider>>),
}

impl Feeds {
    fn resolve(self, cfg: &Config) -> Result<Vec<Box<dyn FeedProvider>>> {
        match self {
            Feeds::Providers(p) => Ok(p),
            Feeds::SourcesFile => Ok(providers_for(load_sources(&cfg.sources_file)?)),
        }
    }
}

/// Collaborators of one run. `judge` and `summarizer` are only consulted when
/// the matching config switch is on.
pub struct Pipeline<'a> {
    pub feeds: Feeds,
    pub translator: &'a dyn Translate,
    pub judge: Option<&'a dyn RankingJudge>,
    pub summarizer: Option<&'a dyn Summarizer>,
    /// Opaque sections from other collaborators (e.g. a market snapshot).
    pub extra_sections: Vec<ExtraSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Sent { items: usize },
    NothingToSend,
}

/// Recency window then near-duplicate collapsing.
pub fn prefilter(raw: Vec<NewsItem>, lookback_hours: i64, now: DateTime<Utc>) -> Vec<NewsItem> {
    let fetched = raw.len();
    let recent = filter_recent_at(raw, lookback_hours, now);
    let deduped = dedupe_items(recent, DEFAULT_SIMILARITY_THRESHOLD);
    counter!("digest_items_fetched_total").increment(fetched as u64);
    counter!("digest_items_deduped_total").increment((fetched - deduped.len()) as u64);
    deduped
}

/// Heuristic order over everything, optional external rerank of the head,
/// then the `max_items` cut.
async fn rank_stage(
    items: Vec<NewsItem>,
    cfg: &Config,
    edition: &str,
    judge: Option<&dyn RankingJudge>,
) -> Vec<NewsItem> {
    let total = items.len();
    let mut ranked = rank_items(items, total, edition);
    if cfg.openai_rerank {
        if let Some(judge) = judge {
            ranked = rerank_items(ranked, edition, judge, cfg.openai_rerank_candidates).await;
        }
    }
    ranked.truncate(cfg.max_items);
    ranked
}

async fn sections_for(
    items: &[NewsItem],
    cfg: &Config,
    edition: &str,
    summarizer: Option<&dyn Summarizer>,
    extra: Vec<ExtraSection>,
) -> Vec<ExtraSection> {
    let mut sections = Vec::new();
    if cfg.openai_summary {
        if let Some(s) = summarizer {
            if let Some(body) = s.summarize(items, edition).await {
                sections.push(ExtraSection::text(SUMMARY_SECTION_TITLE, body));
            }
        }
    }
    sections.extend(extra);
    sections
}

/// Run one edition. Returns `NothingToSend` (without touching the ledger file)
/// when no item survives filtering.
pub async fn run_digest(
    cfg: &Config,
    edition: &str,
    pipeline: Pipeline<'_>,
    mailer: &dyn Mailer,
) -> Result<RunOutcome> {
    ensure_metrics_described();
    cfg.validate()?;
    let sender = cfg.sender().ok_or(ConfigError::MissingSender)?.to_string();
    let now = Utc::now();

    let providers = pipeline.feeds.resolve(cfg)?;
    let raw = fetch_all(&providers).await;
    let candidates = prefilter(raw, cfg.lookback_hours, now);

    let mut ledger = Ledger::load(&cfg.state_file);
    let before = candidates.len();
    let fresh = ledger.filter_and_record_at(candidates, cfg.state_ttl_hours, now);
    counter!("digest_items_suppressed_total").increment((before - fresh.len()) as u64);

    let mut ranked = rank_stage(fresh, cfg, edition, pipeline.judge).await;
    if ranked.is_empty() {
        warn!(target: "digest", edition, "no items to send");
        counter!("digest_runs_total", "outcome" => "empty").increment(1);
        return Ok(RunOutcome::NothingToSend);
    }

    add_bilingual_fields(&mut ranked, pipeline.translator).await;
    let sections = sections_for(&ranked, cfg, edition, pipeline.summarizer, pipeline.extra_sections).await;

    let msg = DigestMessage::build(
        subject_for(edition, now),
        sender,
        cfg.recipients.clone(),
        &ranked,
        edition,
        &sections,
        now,
    );
    mailer.send(&msg).await?;
    ledger.save(&cfg.state_file)?;

    counter!("digest_runs_total", "outcome" => "sent").increment(1);
    info!(target: "digest", edition, items = ranked.len(), "digest sent");
    Ok(RunOutcome::Sent {
        items: ranked.len(),
    })
}

/// Build the message a run would send, without the ledger and without
/// delivery. Config is not validated; missing addresses get placeholders.
pub async fn preview_digest(
    cfg: &Config,
    edition: &str,
    pipeline: Pipeline<'_>,
) -> Result<DigestMessage> {
    ensure_metrics_described();
    let now = Utc::now();

    let providers = pipeline.feeds.resolve(cfg)?;
    let raw = fetch_all(&providers).await;
    let candidates = prefilter(raw, cfg.lookback_hours, now);
    let mut ranked = rank_stage(candidates, cfg, edition, pipeline.judge).await;

    add_bilingual_fields(&mut ranked, pipeline.translator).await;
    let sections = sections_for(&ranked, cfg, edition, pipeline.summarizer, pipeline.extra_sections).await;

    let sender = cfg.sender().unwrap_or(PREVIEW_ADDRESS).to_string();
    Ok(DigestMessage::build(
        subject_for(edition, now),
        sender,
        vec![PREVIEW_ADDRESS.to_string()],
        &ranked,
        edition,
        &sections,
        now,
    ))
}
