// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod dedupe;
pub mod digest;
pub mod enrich;
pub mod ingest;
pub mod llm;
pub mod market;
pub mod model;
pub mod notify;
pub mod rank;
pub mod schedule;
pub mod state;
pub mod text;
pub mod translate;

// ---- Re-exports for a stable public API ----
pub use crate::config::{Config, ConfigError};
pub use crate::digest::{preview_digest, run_digest, Feeds, Pipeline, RunOutcome};
pub use crate::model::NewsItem;
pub use crate::state::Ledger;
