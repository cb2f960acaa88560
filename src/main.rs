//! fin-digest binary entrypoint.
//! Loads `.env`, configures tracing, wires collaborators and runs one or both
//! editions sequentially.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fin_news_digest::config::Config;
use fin_news_digest::digest::{preview_digest, run_digest, Feeds, Pipeline, RunOutcome};
use fin_news_digest::llm::{ChatClient, OpenAiRanker, OpenAiSummarizer, Summarizer};
use fin_news_digest::market::{snapshot_section, MarketSnapshot};
use fin_news_digest::notify::{ExtraSection, SmtpMailer};
use fin_news_digest::rank::RankingJudge;
use fin_news_digest::schedule::{editions_due, scheduled_editions};
use fin_news_digest::translate::{build_translator, new_shared_cache};

#[derive(Debug, Parser)]
#[command(name = "fin-digest", version, about = "Bilingual financial news email digest")]
struct Cli {
    /// Edition label; "NY…" and "BJ…" prefixes select keyword boosts.
    #[arg(long, default_value = "Manual")]
    edition: String,

    /// Send the NY and BJ morning editions back to back.
    #[arg(long)]
    scheduled: bool,

    /// Send only the editions whose 08:00 local window is open right now.
    #[arg(long, conflicts_with = "scheduled")]
    window: bool,

    /// Write the HTML body to this path instead of sending (ledger untouched).
    #[arg(long, value_name = "PATH")]
    preview: Option<PathBuf>,
}

fn truthy_env(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y"))
        .unwrap_or(false)
}

/// `RUST_LOG` wins; otherwise `LOG_LEVEL` from config.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_ascii_lowercase()));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Market block for the digest, empty unless enabled and keyed.
async fn market_sections(cfg: &Config) -> Vec<ExtraSection> {
    if !cfg.market_enabled() {
        return Vec::new();
    }
    let snapshot = MarketSnapshot::new(cfg.market()).build().await;
    snapshot_section(&snapshot).into_iter().collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let cfg = Config::from_env();
    init_tracing(&cfg.log_level);

    // One cache for the whole process, shared by every edition.
    let cache = new_shared_cache(cfg.translate_cache_max_entries);
    let translator = build_translator(&cfg.translator(), cache);

    let ranker = (cfg.openai_rerank && cfg.llm_enabled())
        .then(|| OpenAiRanker::new(ChatClient::new(cfg.chat())));
    let summarizer = (cfg.openai_summary && cfg.llm_enabled())
        .then(|| OpenAiSummarizer::new(ChatClient::new(cfg.chat()), cfg.openai_summary_items));

    let pipeline = |extra_sections: Vec<ExtraSection>| Pipeline {
        feeds: Feeds::SourcesFile,
        translator: &translator,
        judge: ranker.as_ref().map(|r| r as &dyn RankingJudge),
        summarizer: summarizer.as_ref().map(|s| s as &dyn Summarizer),
        extra_sections,
    };

    if let Some(path) = cli.preview {
        let market = market_sections(&cfg).await;
        let msg = preview_digest(&cfg, &cli.edition, pipeline(market)).await?;
        std::fs::write(&path, &msg.html_body)
            .with_context(|| format!("writing preview to {}", path.display()))?;
        info!(path = %path.display(), "preview saved");
        return Ok(());
    }

    cfg.validate()?;
    let mailer = SmtpMailer::new(&cfg.smtp())?;

    let editions: Vec<String> =
        if cli.scheduled || truthy_env("FORCE_SEND") || truthy_env("SCHEDULED_RUN") {
            scheduled_editions()
        } else if cli.window {
            editions_due(Utc::now())
        } else {
            vec![cli.edition.clone()]
        };
    if editions.is_empty() {
        info!("no matching schedule window; skipping");
        return Ok(());
    }

    // Fetched once and shared by every edition of this run.
    let market = market_sections(&cfg).await;
    for edition in &editions {
        match run_digest(&cfg, edition, pipeline(market.clone()), &mailer).await? {
            RunOutcome::Sent { items } => info!(%edition, items, "edition sent"),
            RunOutcome::NothingToSend => warn!(%edition, "edition skipped: nothing new"),
        }
    }
    Ok(())
}
