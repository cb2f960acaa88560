// src/notify/email.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::info;

use super::DigestMessage;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, msg: &DigestMessage) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub user: String,
    pub password: String,
}

pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpMailer {
    pub fn new(s: &SmtpSettings) -> Result<Self> {
        let builder = if s.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&s.host)
                .with_context(|| format!("invalid SMTP host {}", s.host))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&s.host)
        };
        let mut builder = builder.port(s.port).timeout(Some(Duration::from_secs(30)));
        if !s.user.is_empty() {
            builder = builder.credentials(Credentials::new(s.user.clone(), s.password.clone()));
        }
        Ok(Self {
            mailer: builder.build(),
            host: format!("{}:{}", s.host, s.port),
        })
    }
}

/// One multipart/alternative message addressed to every recipient.
pub fn to_lettre(msg: &DigestMessage) -> Result<Message> {
    let from: Mailbox = msg
        .from
        .parse()
        .with_context(|| format!("invalid sender {}", msg.from))?;
    let mut builder = Message::builder().from(from).subject(msg.subject.clone());
    for rcpt in &msg.to {
        let mbox: Mailbox = rcpt
            .parse()
            .with_context(|| format!("invalid recipient {rcpt}"))?;
        builder = builder.to(mbox);
    }
    builder
        .multipart(MultiPart::alternative_plain_html(
            msg.text_body.clone(),
            msg.html_body.clone(),
        ))
        .context("build email")
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, msg: &DigestMessage) -> Result<()> {
        let email = to_lettre(msg)?;
        info!(target: "notify", host = %self.host, recipients = msg.to.len(), "sending digest email");
        self.mailer.send(email).await.context("send email")?;
        Ok(())
    }
}
