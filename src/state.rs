// src/state.rs
//! Sent-item ledger: the only memory carried from one run to the next.
//!
//! On disk: `{"sent": {"<link>": "<RFC 3339 timestamp>", ...}}`.
//!
//! Items are marked as sent when they pass [`Ledger::filter_and_record`], not
//! when the email is confirmed delivered. If delivery later fails in the same
//! run the ledger is simply not saved; but a story dropped downstream (e.g. by
//! `max_items`) is still recorded and will not come back on a later run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::dedupe::hours_before;
use crate::model::NewsItem;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    sent: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    sent: BTreeMap<String, DateTime<Utc>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the ledger from `path`. A missing, unreadable or malformed file
    /// yields an empty ledger; entries with an unparseable timestamp are dropped.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                debug!(target: "state", path = %path.display(), error = %e, "no ledger file, starting empty");
                return Self::default();
            }
        };
        let file: LedgerFile = match serde_json::from_str(&raw) {
            Ok(f) => f,
            Err(e) => {
                warn!(target: "state", path = %path.display(), error = %e, "corrupt ledger file, starting empty");
                return Self::default();
            }
        };

        let mut sent = BTreeMap::new();
        for (link, ts) in file.sent {
            match DateTime::parse_from_rfc3339(&ts) {
                Ok(dt) => {
                    sent.insert(link, dt.with_timezone(&Utc));
                }
                Err(_) => warn!(target: "state", %link, %ts, "dropping ledger entry with bad timestamp"),
            }
        }
        info!(target: "state", entries = sent.len(), "ledger loaded");
        Self { sent }
    }

    /// Write the full ledger to `path` via a sibling temp file and a rename, so
    /// a crash mid-write leaves the previous file intact.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating state dir {}", parent.display()))?;
        }
        let file = LedgerFile {
            sent: self
                .sent
                .iter()
                .map(|(k, v)| (k.clone(), v.to_rfc3339()))
                .collect(),
        };
        let json = serde_json::to_string_pretty(&file).context("serializing ledger")?;

        let tmp = path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(json.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;

        info!(target: "state", entries = self.sent.len(), path = %path.display(), "ledger saved");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    pub fn contains(&self, link: &str) -> bool {
        self.sent.contains_key(link)
    }

    pub fn sent_at(&self, link: &str) -> Option<DateTime<Utc>> {
        self.sent.get(link).copied()
    }

    /// Record `link` as sent at `at`, overwriting any earlier stamp.
    pub fn mark(&mut self, link: impl Into<String>, at: DateTime<Utc>) {
        self.sent.insert(link.into(), at);
    }

    /// Drop entries stamped before `cutoff`. Returns how many were removed.
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.sent.len();
        self.sent.retain(|_, ts| *ts >= cutoff);
        before - self.sent.len()
    }

    /// Prune expired entries, drop items already in the ledger, and mark every
    /// survivor as sent now.
    pub fn filter_and_record(&mut self, items: Vec<NewsItem>, ttl_hours: i64) -> Vec<NewsItem> {
        self.filter_and_record_at(items, ttl_hours, Utc::now())
    }

    pub fn filter_and_record_at(
        &mut self,
        items: Vec<NewsItem>,
        ttl_hours: i64,
        now: DateTime<Utc>,
    ) -> Vec<NewsItem> {
        // An unrepresentable TTL keeps every entry.
        let pruned = hours_before(now, ttl_hours).map_or(0, |cutoff| self.prune_before(cutoff));

        let total = items.len();
        let mut remaining = Vec::with_capacity(total);
        for item in items {
            if self.contains(&item.link) {
                continue;
            }
            self.mark(item.link.clone(), now);
            remaining.push(item);
        }

        info!(
            target: "state",
            pruned,
            suppressed = total - remaining.len(),
            kept = remaining.len(),
            "ledger filter applied"
        );
        remaining
    }
}
