//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests returning raw body bytes
//! - Retry with exponential backoff for transient failures
//! - Error classification (transient vs permanent)

use crate::config::{Config, FetcherConfig};
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Raw response content of a successful fetch
#[derive(Debug, Clone)]
pub struct RawContent {
    /// The URL as requested
    pub url: String,

    /// Final URL after redirects
    pub final_url: String,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value, without parameters
    pub content_type: Option<String>,

    /// Charset declared in the Content-Type header
    pub charset: Option<String>,

    /// Undecoded body
    pub body: Vec<u8>,
}

impl RawContent {
    /// Returns true if the response declares an HTML media type
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(ct) => ct.contains("html"),
            None => self
                .body
                .iter()
                .find(|b| !b.is_ascii_whitespace())
                .map_or(false, |b| *b == b'<'),
        }
    }
}

/// Errors produced while fetching a URL
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Malformed URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported URL scheme '{scheme}' in {url}")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Network error for {url}: {reason}")]
    Network { url: String, reason: String },
}

impl FetchError {
    /// Returns true if a retry may succeed
    ///
    /// Network errors, timeouts, 5xx and 429 are transient; everything else
    /// fails immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::InvalidUrl { .. } | Self::UnsupportedScheme { .. } => false,
        }
    }

    /// HTTP status of the failure, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Network {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

/// Exponential backoff policy for transient failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetcherConfig::default())
    }
}

/// Builds an HTTP client with proper configuration
///
/// The User-Agent is `CrawlerName/Version (+ContactURL; ContactEmail)`.
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.header_value())
        .timeout(Duration::from_secs(config.fetcher.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.fetcher.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// One failed request, with the server's requested delay if any
struct FailedAttempt {
    error: FetchError,
    retry_after: Option<Duration>,
}

/// Fetches URLs with the configured retry policy
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Builds the HTTP client and retry policy from the configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self::new(
            build_http_client(config)?,
            RetryPolicy::from_config(&config.fetcher),
        ))
    }

    /// The underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Malformed URL, non-HTTP(S) scheme | Immediate failure |
    /// | HTTP 4xx (except 429) | Immediate failure |
    /// | HTTP 429, 5xx | Retry with backoff (Retry-After honored) |
    /// | Timeout, connection error | Retry with backoff |
    pub async fn fetch(&self, url: &str) -> Result<RawContent, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme {
                url: url.to_string(),
                scheme: parsed.scheme().to_string(),
            });
        }

        let mut attempt = 0;
        loop {
            match self.fetch_once(url, parsed.clone()).await {
                Ok(raw) => return Ok(raw),
                Err(failed) if failed.error.is_transient() && attempt < self.policy.max_retries => {
                    let delay = failed
                        .retry_after
                        .map(|d| d.min(self.policy.max_backoff))
                        .unwrap_or_else(|| self.policy.backoff(attempt));
                    attempt += 1;
                    debug!(
                        url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %failed.error,
                        "Retrying fetch"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failed) => return Err(failed.error),
            }
        }
    }

    async fn fetch_once(&self, url: &str, target: Url) -> Result<RawContent, FailedAttempt> {
        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| FailedAttempt {
                error: FetchError::from_reqwest(url, e),
                retry_after: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FailedAttempt {
                retry_after: retry_after(&response),
                error: FetchError::Http {
                    url: url.to_string(),
                    status: status.as_u16(),
                },
            });
        }

        let final_url = response.url().to_string();
        let (content_type, charset) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(parse_content_type)
            .unwrap_or((None, None));

        let body = response.bytes().await.map_err(|e| FailedAttempt {
            error: FetchError::from_reqwest(url, e),
            retry_after: None,
        })?;

        Ok(RawContent {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            content_type,
            charset,
            body: body.to_vec(),
        })
    }
}

/// Reads an integer-seconds Retry-After header
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Splits a Content-Type header into the lowercased media type and charset
pub fn parse_content_type(header: &str) -> (Option<String>, Option<String>) {
    let mut parts = header.split(';');
    let media_type = parts
        .next()
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty());

    let charset = parts.find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_ascii_lowercase())
        } else {
            None
        }
    });

    (media_type, charset)
}
