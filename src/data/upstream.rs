//! Azure release-communications API client
//!
//! This module fetches a single announcement from the upstream API and
//! normalizes it into an [`UpdateRecord`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::{UpdateId, UpdateRecord};
use crate::config::Config;

/// Errors that can occur when fetching an announcement
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed before a response was read
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Upstream answered with a status other than 2xx or 404
    #[error("Upstream returned HTTP {0}")]
    Status(StatusCode),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl FetchError {
    /// Transport failures and 5xx responses may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::RequestFailed(_) => true,
            FetchError::Status(status) => status.is_server_error(),
            FetchError::ParseError(_) => false,
        }
    }
}

/// Linear backoff between attempts
///
/// The wait before attempt `n + 1` is `base_delay * n`. One attempt means
/// no retries at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay unit multiplied by the attempt number
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after `attempt` failed
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Anything that can produce an announcement for an identifier
///
/// `Ok(None)` is a legitimate "no such announcement" answer, distinct from
/// an error.
#[async_trait]
pub trait UpdateFetcher: Send + Sync {
    async fn fetch_update(&self, id: &UpdateId) -> Result<Option<UpdateRecord>, FetchError>;
}

/// Payload shape returned by the release-communications endpoint
///
/// Only the fields we keep are declared; the rest are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleasePayload {
    title: String,
    description: String,
    #[serde(default)]
    impact_description: Option<String>,
    #[serde(default)]
    disclosure_date: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Client for the Azure release-communications API
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    http_client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ReleaseClient {
    /// Creates a client for the given base URL with no retries
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::none(),
        }
    }

    /// Creates a client from validated configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.upstream_base_url.clone()).with_retry(config.retry_policy())
    }

    /// Swaps in a custom HTTP client
    pub fn with_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// URL of the announcement resource for `id`
    pub fn update_url(&self, id: &UpdateId) -> String {
        format!("{}/releasecommunications/{}", self.base_url, id)
    }

    /// One GET, no retries
    async fn fetch_once(&self, id: &UpdateId) -> Result<Option<UpdateRecord>, FetchError> {
        let url = self.update_url(id);
        debug!(%url, "fetching update from upstream");

        let response = self
            .http_client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let text = response.text().await?;
        let payload: ReleasePayload = serde_json::from_str(&text)?;

        Ok(Some(normalize(id, payload)))
    }
}

#[async_trait]
impl UpdateFetcher for ReleaseClient {
    async fn fetch_update(&self, id: &UpdateId) -> Result<Option<UpdateRecord>, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.fetch_once(id).await {
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(%id, attempt, ?delay, error = %e, "upstream fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}

/// Maps the upstream payload onto a record keyed by the requested id
fn normalize(id: &UpdateId, payload: ReleasePayload) -> UpdateRecord {
    UpdateRecord::new(id.clone(), payload.title, payload.description)
        .with_impact_description(payload.impact_description)
        .with_disclosure_date(payload.disclosure_date)
        .with_tags(payload.tags.unwrap_or_default())
}
