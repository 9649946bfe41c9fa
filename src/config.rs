//! Runtime configuration
//!
//! Values come from the command line (or their `UPDATESNAP_*` environment
//! fallbacks) once at startup, are validated here, and are then passed
//! explicitly to the constructors that need them.

use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use crate::data::RetryPolicy;

/// Default time-to-live for stored entries in hours
pub const DEFAULT_TTL_HOURS: u64 = 12;

/// Default upstream base URL
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://www.microsoft.com";

/// Default time-to-live for the in-process cache in seconds
pub const DEFAULT_MEMORY_TTL_SECS: u64 = 60;

/// Longest accepted store TTL (ten years)
pub const MAX_TTL_HOURS: u64 = 10 * 365 * 24;

/// Longest accepted in-process TTL (one day)
pub const MAX_MEMORY_TTL_SECS: u64 = 24 * 60 * 60;

/// Default number of records held in the in-process cache
pub const DEFAULT_MEMORY_CAPACITY: usize = 256;

/// Errors raised for configuration that cannot be used
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TTL must be at least one hour")]
    ZeroTtl,

    #[error("TTL of {0} hours exceeds the maximum of {max} hours", max = MAX_TTL_HOURS)]
    TtlTooLong(u64),

    #[error("In-process TTL of {0} seconds exceeds the maximum of {max} seconds", max = MAX_MEMORY_TTL_SECS)]
    MemoryTtlTooLong(u64),

    #[error("Invalid upstream base URL '{0}': {1}")]
    InvalidBaseUrl(String, String),

    #[error("Retry attempts must be at least 1")]
    ZeroRetryAttempts,
}

/// Settings shared by the fetcher, the stores and the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How long a stored entry stays fresh
    pub ttl_hours: u64,
    /// Base URL of the release-communications API
    pub upstream_base_url: String,
    /// How long the in-process cache keeps a record (0 disables it)
    pub memory_ttl_secs: u64,
    /// Maximum records in the in-process cache (0 disables it)
    pub memory_capacity: usize,
    /// Total fetch attempts per lookup
    pub retry_attempts: u32,
    /// Backoff unit between attempts in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ttl_hours: DEFAULT_TTL_HOURS,
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            memory_ttl_secs: DEFAULT_MEMORY_TTL_SECS,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            retry_attempts: 1,
            retry_delay_ms: 500,
        }
    }
}

impl Config {
    /// Checks every field and returns the configuration unchanged if usable
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.ttl_hours == 0 {
            return Err(ConfigError::ZeroTtl);
        }
        if self.ttl_hours > MAX_TTL_HOURS {
            return Err(ConfigError::TtlTooLong(self.ttl_hours));
        }
        if self.memory_ttl_secs > MAX_MEMORY_TTL_SECS {
            return Err(ConfigError::MemoryTtlTooLong(self.memory_ttl_secs));
        }

        let url = Url::parse(&self.upstream_base_url).map_err(|e| {
            ConfigError::InvalidBaseUrl(self.upstream_base_url.clone(), e.to_string())
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl(
                self.upstream_base_url.clone(),
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        if self.retry_attempts == 0 {
            return Err(ConfigError::ZeroRetryAttempts);
        }

        Ok(self)
    }

    /// Lifetime of a stored entry, clamped to [`MAX_TTL_HOURS`]
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours.min(MAX_TTL_HOURS) as i64)
    }

    /// Lifetime of an in-process entry, or `None` when that layer is off
    pub fn memory_ttl(&self) -> Option<chrono::Duration> {
        if self.memory_ttl_secs == 0 || self.memory_capacity == 0 {
            None
        } else {
            let secs = self.memory_ttl_secs.min(MAX_MEMORY_TTL_SECS);
            Some(chrono::Duration::seconds(secs as i64))
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            base_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}
