// src/translate/retry.rs
//! Exponential backoff around one outbound call.
//!
//! - transport error: retry after `min(max, base * 2^attempt)`
//! - 408 / 429 / 5xx: same schedule, but an integer `Retry-After` wins,
//!   clamped into `[base, max]`
//! - any other non-2xx, or retries exhausted: `None`

use std::time::Duration;
use tracing::warn;

use super::transport::{HttpReply, HttpRequest, HttpTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that retries without sleeping; for tests and dry runs.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }

    fn delay_with_hint(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after
            .unwrap_or_else(|| self.delay_for(attempt))
            .max(self.backoff_base)
            .min(self.backoff_max)
    }
}

pub fn should_retry_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..600).contains(&status)
}

/// Integer-seconds `Retry-After`; HTTP-date values are ignored.
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    let v = value?.trim();
    if v.is_empty() || !v.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    v.parse::<u64>().ok().map(Duration::from_secs)
}

async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

/// Run `req` through `transport` under `policy`. Returns the successful reply,
/// or `None` when the caller should fall back to its original input.
pub async fn request_with_retries(
    transport: &dyn HttpTransport,
    req: &HttpRequest,
    provider: &str,
    policy: &RetryPolicy,
) -> Option<HttpReply> {
    let attempts = policy.max_retries + 1;
    let mut attempt: u32 = 0;
    loop {
        let reply = match transport.execute(req).await {
            Ok(r) => r,
            Err(e) => {
                if attempt >= policy.max_retries {
                    warn!(target: "translate", provider, attempts = attempt + 1, error = %e, "translation request failed, giving up");
                    return None;
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    target: "translate",
                    provider,
                    attempt = attempt + 1,
                    attempts,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "translation request error, retrying"
                );
                pause(delay).await;
                attempt += 1;
                continue;
            }
        };

        if should_retry_status(reply.status) {
            if attempt >= policy.max_retries {
                warn!(target: "translate", provider, status = reply.status, attempts = attempt + 1, "translation request still failing, giving up");
                return None;
            }
            let hint = parse_retry_after(reply.retry_after.as_deref());
            let delay = policy.delay_with_hint(attempt, hint);
            warn!(
                target: "translate",
                provider,
                status = reply.status,
                attempt = attempt + 1,
                attempts,
                delay_ms = delay.as_millis() as u64,
                "translation request throttled or server error, retrying"
            );
            pause(delay).await;
            attempt += 1;
            continue;
        }

        if !reply.is_success() {
            warn!(target: "translate", provider, status = reply.status, "translation request rejected, returning original text");
            return None;
        }
        return Some(reply);
    }
}
