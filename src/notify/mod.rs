// src/notify/mod.rs
//! Digest message rendering (plain + HTML) and delivery.

pub mod email;

use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write as _;

use crate::model::NewsItem;

pub use email::{Mailer, SmtpMailer, SmtpSettings};

/// Block rendered above the item list (LLM overview, market snapshot, ...).
/// `body` goes into the plain part and, escaped, into the HTML part unless
/// `html` carries a pre-rendered fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraSection {
    pub title: String,
    pub body: String,
    pub html: Option<String>,
}

impl ExtraSection {
    pub fn text(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            html: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMessage {
    pub subject: String,
    pub from: String,
    pub to: Vec<String>,
    pub text_body: String,
    pub html_body: String,
}

pub fn subject_for(edition_label: &str, now: DateTime<Utc>) -> String {
    format!(
        "Global Finance Digest [{}] {}",
        edition_label,
        now.format("%Y-%m-%d")
    )
}

impl DigestMessage {
    pub fn build(
        subject: String,
        from: String,
        to: Vec<String>,
        items: &[NewsItem],
        edition_label: &str,
        sections: &[ExtraSection],
        now: DateTime<Utc>,
    ) -> Self {
        let date_str = now.format("%Y-%m-%d %H:%M UTC").to_string();
        Self {
            subject,
            from,
            to,
            text_body: render_text(items, edition_label, sections, &date_str),
            html_body: render_html(items, edition_label, sections, &date_str),
        }
    }
}

fn field<'a>(primary: &'a Option<String>, fallback: &'a str) -> &'a str {
    primary.as_deref().unwrap_or(fallback)
}

fn render_text(items: &[NewsItem], edition: &str, sections: &[ExtraSection], date: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Global Finance Digest [{edition}]");
    let _ = writeln!(out, "{date} | {} items", items.len());
    let _ = writeln!(out);

    for s in sections {
        let _ = writeln!(out, "== {} ==", s.title);
        let _ = writeln!(out, "{}", s.body);
        let _ = writeln!(out);
    }

    for (i, it) in items.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, field(&it.title_en, &it.title));
        if let Some(zh) = &it.title_zh {
            let _ = writeln!(out, "   {zh}");
        }
        let _ = writeln!(out, "   {}", field(&it.summary_en, &it.summary));
        if let Some(zh) = &it.summary_zh {
            let _ = writeln!(out, "   {zh}");
        }
        let _ = writeln!(
            out,
            "   {} | {}",
            it.source,
            it.published.format("%Y-%m-%d %H:%M UTC")
        );
        let _ = writeln!(out, "   {}", it.link);
        let _ = writeln!(out);
    }
    out
}

fn render_html(items: &[NewsItem], edition: &str, sections: &[ExtraSection], date: &str) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"></head>\n");
    out.push_str("<body style=\"font-family:Arial,Helvetica,sans-serif;color:#0f172a;max-width:720px;margin:0 auto;\">\n");
    let _ = writeln!(
        out,
        "<h1 style=\"font-size:20px;\">Global Finance Digest [{}]</h1>",
        encode_text(edition)
    );
    let _ = writeln!(
        out,
        "<p style=\"color:#64748b;\">{} &middot; {} items</p>",
        encode_text(date),
        items.len()
    );

    for s in sections {
        let inner = match &s.html {
            Some(fragment) => fragment.clone(),
            None => format!("<p style=\"margin:0;\">{}</p>", encode_text(&s.body)),
        };
        let _ = writeln!(
            out,
            "<div style=\"background:#f1f5f9;padding:12px;margin:12px 0;\"><h2 style=\"font-size:16px;margin:0 0 6px;\">{}</h2>{}</div>",
            encode_text(&s.title),
            inner
        );
    }

    out.push_str("<ol>\n");
    for it in items {
        out.push_str("<li style=\"margin-bottom:14px;\">");
        let _ = write!(
            out,
            "<a href=\"{}\"><strong>{}</strong></a>",
            encode_double_quoted_attribute(&it.link),
            encode_text(field(&it.title_en, &it.title))
        );
        if let Some(zh) = &it.title_zh {
            let _ = write!(out, "<br><strong>{}</strong>", encode_text(zh));
        }
        let _ = write!(
            out,
            "<br><span>{}</span>",
            encode_text(field(&it.summary_en, &it.summary))
        );
        if let Some(zh) = &it.summary_zh {
            let _ = write!(out, "<br><span>{}</span>", encode_text(zh));
        }
        let _ = write!(
            out,
            "<br><small style=\"color:#64748b;\">{} &middot; {}</small>",
            encode_text(&it.source),
            it.published.format("%Y-%m-%d %H:%M UTC")
        );
        out.push_str("</li>\n");
    }
    out.push_str("</ol>\n</body></html>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn subject_uses_utc_date() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 23, 59, 0).unwrap();
        assert_eq!(subject_for("NY 08:00", now), "Global Finance Digest [NY 08:00] 2025-03-04");
    }

    #[test]
    fn html_is_escaped_and_bilingual() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 8, 0, 0).unwrap();
        let mut it = NewsItem::new("S&P <record>", "https://x.test/?a=1&b=\"2\"", now, "Stocks up", "Reuters", "en", 2);
        it.title_zh = Some("标普创纪录".into());
        let sections = vec![
            ExtraSection::text("综述", "市场走强"),
            ExtraSection {
                title: "Markets".into(),
                body: "SPY +0.4%".into(),
                html: Some("<table><tr><td>SPY</td></tr></table>".into()),
            },
        ];
        let msg = DigestMessage::build("s".into(), "f@x.test".into(), vec!["t@x.test".into()], &[it], "NY 08:00", &sections, now);

        assert!(msg.html_body.contains("S&amp;P &lt;record&gt;"));
        assert!(msg.html_body.contains("标普创纪录"));
        assert!(msg.html_body.contains("&quot;2&quot;"));
        assert!(msg.text_body.contains("1. S&P <record>"));
        assert!(msg.text_body.contains("== 综述 =="));
        assert!(msg.text_body.contains("SPY +0.4%"));
        assert!(msg.html_body.contains("<table><tr><td>SPY</td></tr></table>"));
    }
}
