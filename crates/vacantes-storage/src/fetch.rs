//! Listing page GET with bounded retries.

use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::{Response, StatusCode};
use thiserror::Error;
use tracing::{debug, info_span, warn, Instrument};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

impl FetchError {
    /// Throttling, server-side failures, timeouts and refused connections may clear up
    /// on their own; anything else (4xx, bad URL, decode failure) will not.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::HttpStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || (500..600).contains(status)
            }
            FetchError::Request(err) => err.is_timeout() || err.is_connect(),
        }
    }
}

/// `attempts` counts the first request; pauses double from `first_pause` up to `max_pause`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub first_pause: Duration,
    pub max_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            first_pause: Duration::from_millis(500),
            max_pause: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Pause taken after the failed attempt number `failed` (1-based).
    pub fn pause_after(&self, failed: u32) -> Duration {
        let doublings = failed.saturating_sub(1).min(16);
        self.first_pause
            .saturating_mul(1 << doublings)
            .min(self.max_pause)
    }
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout: Duration::from_secs(20),
            retry: RetryPolicy::default(),
        }
    }
}

/// A successful response body, decoded with the charset the server declared
/// (UTF-8 when it declared none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedText {
    pub url: String,
    pub text: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .gzip(true)
            .brotli(true);
        if let Some(agent) = config.user_agent {
            builder = builder.user_agent(agent);
        }
        Ok(Self {
            client: builder.build().context("building http client")?,
            retry: config.retry,
        })
    }

    /// Shared client, reused by other outbound callers.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub async fn get_text(&self, url: &str) -> Result<FetchedText, FetchError> {
        self.get_with_retry(url)
            .instrument(info_span!("http_fetch", url))
            .await
    }

    async fn get_with_retry(&self, url: &str) -> Result<FetchedText, FetchError> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.get_once(url).await {
                Ok(page) => {
                    debug!(attempt, bytes = page.text.len(), "fetched page");
                    return Ok(page);
                }
                Err(err) if err.is_transient() && attempt < attempts => {
                    let pause = self.retry.pause_after(attempt);
                    warn!(error = %err, attempt, pause_ms = pause.as_millis() as u64, "transient fetch failure");
                    tokio::time::sleep(pause).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn get_once(&self, url: &str) -> Result<FetchedText, FetchError> {
        let response: Response = self.client.get(url).send().await?;
        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
            });
        }
        let text = response.text().await?;
        Ok(FetchedText {
            url: final_url,
            text,
            fetched_at: Utc::now(),
        })
    }
}
