// src/ingest/rss.rs
//! RSS / Atom feed provider.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::time::Duration;

use super::types::{FeedProvider, Source};
use crate::model::NewsItem;
use crate::text::{strip_html, truncate};

pub const FEED_SUMMARY_LIMIT: usize = 360;
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Feed-format-neutral view of one entry.
struct RawEntry {
    title: String,
    link: String,
    published: Option<DateTime<Utc>>,
    summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedKind {
    /// RSS 2.0, or RSS 1.0 under `<rdf:RDF>`.
    Rss,
    Atom,
}

impl FeedKind {
    fn entry_tag(self) -> &'static [u8] {
        match self {
            FeedKind::Rss => b"item",
            FeedKind::Atom => b"entry",
        }
    }
}

/// Child element of an entry whose text we keep.
#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    PubDate,
    Published,
    Updated,
    Summary,
    Content,
}

impl Field {
    /// RSS children are matched on the qualified name so that extension
    /// elements such as `<atom:link>` never stand in for `<link>`.
    fn for_rss(qname: &[u8]) -> Option<Field> {
        match qname {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"pubDate" => Some(Field::PubDate),
            b"dc:date" => Some(Field::Updated),
            b"description" => Some(Field::Summary),
            b"content:encoded" => Some(Field::Content),
            _ => None,
        }
    }

    /// Atom links carry their target in attributes, not text.
    fn for_atom(local: &[u8]) -> Option<Field> {
        match local {
            b"title" => Some(Field::Title),
            b"published" => Some(Field::Published),
            b"updated" => Some(Field::Updated),
            b"summary" => Some(Field::Summary),
            b"content" => Some(Field::Content),
            _ => None,
        }
    }
}

#[derive(Default)]
struct EntryBuilder {
    title: String,
    link: String,
    alternate: Option<String>,
    first_link: Option<String>,
    pub_date: String,
    published: String,
    updated: String,
    summary: String,
    content: String,
}

impl EntryBuilder {
    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::PubDate => &mut self.pub_date,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
            Field::Summary => &mut self.summary,
            Field::Content => &mut self.content,
        }
    }

    fn atom_link(&mut self, e: &BytesStart<'_>) {
        let mut href = None;
        let mut rel = None;
        for attr in e.attributes().flatten() {
            match attr.key.as_ref() {
                b"href" => href = attr.unescape_value().ok().map(|v| v.trim().to_string()),
                b"rel" => rel = attr.unescape_value().ok().map(|v| v.into_owned()),
                _ => {}
            }
        }
        let Some(href) = href.filter(|h| !h.is_empty()) else {
            return;
        };
        if self.alternate.is_none() && matches!(rel.as_deref(), None | Some("alternate")) {
            self.alternate = Some(href.clone());
        }
        if self.first_link.is_none() {
            self.first_link = Some(href);
        }
    }

    fn finish(self, kind: FeedKind) -> RawEntry {
        let (link, published) = match kind {
            FeedKind::Rss => (
                self.link.trim().to_string(),
                parse_rfc2822(&self.pub_date).or_else(|| parse_rfc3339(&self.updated)),
            ),
            FeedKind::Atom => (
                self.alternate.or(self.first_link).unwrap_or_default(),
                parse_rfc3339(&self.published).or_else(|| parse_rfc3339(&self.updated)),
            ),
        };
        let summary = if self.summary.trim().is_empty() {
            self.content
        } else {
            self.summary
        };
        RawEntry {
            title: self.title,
            link,
            published,
            summary,
        }
    }
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// HTML entities that are not XML entities make the parser bail.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

/// Classify the document by its root element.
fn feed_kind(xml: &str) -> Result<FeedKind> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().context("reading feed root")? {
            Event::Start(e) | Event::Empty(e) => {
                return match e.local_name().as_ref() {
                    b"rss" | b"RDF" => Ok(FeedKind::Rss),
                    b"feed" => Ok(FeedKind::Atom),
                    other => Err(anyhow!(
                        "unsupported feed root <{}>",
                        String::from_utf8_lossy(other)
                    )),
                };
            }
            Event::Eof => return Err(anyhow!("feed document has no root element")),
            _ => {}
        }
    }
}

/// Walk the document once, collecting entries wherever they sit. Text of a
/// field is concatenated across nested markup and CDATA blocks, so inline
/// `<b>` in a description or interleaved extension elements between entries
/// do not lose anything.
fn parse_entries(xml: &str) -> Result<Vec<RawEntry>> {
    let xml = scrub_html_entities_for_xml(xml);
    let kind = feed_kind(&xml)?;

    let mut reader = Reader::from_str(&xml);
    let mut out = Vec::new();
    let mut current: Option<EntryBuilder> = None;
    // Nesting below the entry element; 1 means a direct child is open.
    let mut depth = 0usize;
    let mut field: Option<Field> = None;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("malformed feed near byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => match current.as_mut() {
                Some(entry) => {
                    depth += 1;
                    if depth == 1 {
                        field = match kind {
                            FeedKind::Rss => Field::for_rss(e.name().as_ref()),
                            FeedKind::Atom => {
                                if e.local_name().as_ref() == b"link" {
                                    entry.atom_link(&e);
                                }
                                Field::for_atom(e.local_name().as_ref())
                            }
                        };
                    }
                }
                None if e.local_name().as_ref() == kind.entry_tag() => {
                    current = Some(EntryBuilder::default());
                    depth = 0;
                    field = None;
                }
                None => {}
            },
            Event::Empty(e) => {
                if let Some(entry) = current.as_mut() {
                    if depth == 0 && kind == FeedKind::Atom && e.local_name().as_ref() == b"link" {
                        entry.atom_link(&e);
                    }
                }
            }
            Event::End(_) => {
                if current.is_some() {
                    if depth == 0 {
                        if let Some(entry) = current.take() {
                            out.push(entry.finish(kind));
                        }
                    } else {
                        depth -= 1;
                        if depth == 0 {
                            field = None;
                        }
                    }
                }
            }
            Event::Text(t) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    match t.unescape() {
                        Ok(text) => entry.slot(f).push_str(&text),
                        Err(_) => entry.slot(f).push_str(&String::from_utf8_lossy(&t)),
                    }
                }
            }
            Event::CData(c) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    entry.slot(f).push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Parse a feed document into items stamped with `source`'s name, language
/// and priority. Entries without a title or link are skipped; a missing date
/// becomes `now`.
pub fn parse_feed(xml: &str, source: &Source, now: DateTime<Utc>) -> Result<Vec<NewsItem>> {
    let entries = parse_entries(xml)?;
    let mut out = Vec::with_capacity(entries.len());
    for e in entries {
        let title = strip_html(&e.title);
        if title.is_empty() || e.link.is_empty() {
            continue;
        }
        let summary = truncate(&strip_html(&e.summary), FEED_SUMMARY_LIMIT);
        let summary = if summary.is_empty() { title.clone() } else { summary };
        out.push(NewsItem::new(
            title,
            e.link,
            e.published.unwrap_or(now),
            summary,
            source.name.clone(),
            source.language.clone(),
            source.priority,
        ));
    }
    Ok(out)
}

pub struct RssFeedProvider {
    source: Source,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http(reqwest::Client),
}

impl RssFeedProvider {
    pub fn from_source(source: Source) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fin-news-digest/", env!("CARGO_PKG_VERSION")))
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            source,
            mode: Mode::Http(client),
        }
    }

    /// Serve a fixed document instead of hitting the network.
    pub fn from_fixture(source: Source, xml: &str) -> Self {
        Self {
            source,
            mode: Mode::Fixture(xml.to_string()),
        }
    }
}

#[async_trait]
impl FeedProvider for RssFeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        let now = Utc::now();
        let items = match &self.mode {
            Mode::Fixture(xml) => parse_feed(xml, &self.source, now)?,
            Mode::Http(client) => {
                let resp = client
                    .get(&self.source.url)
                    .send()
                    .await
                    .with_context(|| format!("fetching {}", self.source.url))?;
                if !resp.status().is_success() {
                    return Err(anyhow!("{} returned {}", self.source.url, resp.status()));
                }
                let body = resp.text().await.context("reading feed body")?;
                parse_feed(&body, &self.source, now)
                    .with_context(|| format!("parsing feed {}", self.source.name))?
            }
        };
        counter!("digest_feed_items_total").increment(items.len() as u64);
        Ok(items)
    }

    fn name(&self) -> &str {
        &self.source.name
    }
}
