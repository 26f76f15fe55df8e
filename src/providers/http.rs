//! Shared HTTP plumbing for provider adapters.
//!
//! Wraps a single `reqwest` client with bounded retry for transient network
//! failures and maps HTTP status classes onto the error taxonomy the failover
//! orchestrator dispatches on.

use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{Result, TallyError};

use super::ProviderKind;

#[derive(Clone)]
pub struct ProviderHttp {
    client: Client,
    max_retries: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl ProviderHttp {
    pub fn new(request_timeout_secs: u64, retry: &RetryConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("tally-ingest/0.1")
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()
            .map_err(|e| TallyError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: retry.max_retries.max(1),
            base_delay_ms: retry.base_delay_ms,
            max_delay_ms: retry.max_delay_ms,
        })
    }

    /// GET a JSON document, retrying transient failures only.
    ///
    /// 4xx/5xx/429 responses are classified and returned on the first
    /// occurrence; only timeouts and connection errors consume the retry
    /// budget.
    pub async fn get_json(
        &self,
        provider: ProviderKind,
        url: &str,
        query: &[(&str, String)],
        headers: Option<HeaderMap>,
    ) -> Result<Value> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.try_get(provider, url, query, headers.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    warn!(
                        "{}: attempt {} failed: {}. Retrying...",
                        provider, attempt, e
                    );
                    sleep(self.backoff_delay(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_get(
        &self,
        provider: ProviderKind,
        url: &str,
        query: &[(&str, String)],
        headers: Option<HeaderMap>,
    ) -> Result<Value> {
        debug!("{}: GET {}", provider, url);

        let mut req = self.client.get(url);

        if !query.is_empty() {
            req = req.query(query);
        }

        if let Some(headers) = headers {
            req = req.headers(headers);
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                return Err(TallyError::Transient(format!(
                    "{} request timeout: {}",
                    provider, url
                )));
            }
            Err(e) if e.is_connect() => {
                return Err(TallyError::Transient(format!(
                    "{} connection error: {}",
                    provider, e
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let status = resp.status();
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) if e.is_timeout() => {
                return Err(TallyError::Transient(format!(
                    "{} response read timeout: {}",
                    provider, url
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if status.as_u16() == 429 {
            return Err(TallyError::RateLimited(format!(
                "{} rate limited: {}",
                provider, url
            )));
        }

        if status.is_client_error() {
            return Err(TallyError::ClientError {
                status: status.as_u16(),
                message: format!("{} {}: {}", provider, url, text),
            });
        }

        if !status.is_success() {
            return Err(TallyError::Provider(format!(
                "{} {} failed: status={} body={}",
                provider, url, status, text
            )));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text)
            .map_err(|e| TallyError::Provider(format!("invalid JSON from {}: {}", provider, e)))
    }

    /// Exponential backoff with jitter, capped at `max_delay_ms`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let base = self.base_delay_ms.saturating_mul(1u64 << shift);
        let capped = base.min(self.max_delay_ms);

        // Add jitter: up to +25%
        let jitter_range = capped / 4;
        let jitter = if jitter_range > 0 {
            use std::time::{SystemTime, UNIX_EPOCH};
            let seed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64;
            seed % jitter_range
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }
}
