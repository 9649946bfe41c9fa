//! Read-through lookup of announcements
//!
//! [`UpdateService::get_or_fetch`] serves a record from the in-process cache
//! or the store while it is fresh, and otherwise fetches it from upstream
//! and writes it back with a new expiry.
//!
//! Concurrent misses for the same id may each fetch and write; the last
//! write wins.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{MemoryCache, StoreError, UpdateStore};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::data::{FetchError, IdError, UpdateFetcher, UpdateId, UpdateRecord};

/// Errors surfaced to callers of a lookup
#[derive(Debug, Error)]
pub enum LookupError {
    /// The identifier was rejected before any I/O
    #[error(transparent)]
    InvalidId(#[from] IdError),

    /// Upstream could not be reached or answered with an error
    #[error("Upstream fetch failed: {0}")]
    Upstream(#[from] FetchError),
}

/// Cache-or-fetch orchestrator over a fetcher and a store
pub struct UpdateService {
    fetcher: Arc<dyn UpdateFetcher>,
    store: Arc<dyn UpdateStore>,
    memory: Option<MemoryCache>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl UpdateService {
    /// Creates a service with the wall clock and no in-process layer
    pub fn new(fetcher: Arc<dyn UpdateFetcher>, store: Arc<dyn UpdateStore>, ttl: Duration) -> Self {
        Self {
            fetcher,
            store,
            memory: None,
            clock: Arc::new(SystemClock),
            ttl,
        }
    }

    /// Creates a service using the TTL and in-process cache settings from `config`
    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn UpdateFetcher>,
        store: Arc<dyn UpdateStore>,
    ) -> Self {
        let service = Self::new(fetcher, store, config.ttl());
        match config.memory_ttl() {
            Some(memory_ttl) => service.with_memory_cache(config.memory_capacity, memory_ttl),
            None => service,
        }
    }

    /// Replaces the clock, including the one used by an in-process cache
    /// added afterwards
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Puts a bounded in-process cache in front of the store
    pub fn with_memory_cache(mut self, capacity: usize, ttl: Duration) -> Self {
        self.memory = Some(MemoryCache::new(capacity, ttl, self.clock.clone()));
        self
    }

    /// TTL applied to freshly fetched records
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Validates `raw_id` and looks it up
    ///
    /// Returns `Ok(None)` when upstream has no such announcement.
    pub async fn get_or_fetch(&self, raw_id: &str) -> Result<Option<UpdateRecord>, LookupError> {
        let id = UpdateId::parse(raw_id)?;
        Ok(self.get_or_fetch_id(&id).await?)
    }

    /// Looks up an already validated identifier
    pub async fn get_or_fetch_id(&self, id: &UpdateId) -> Result<Option<UpdateRecord>, FetchError> {
        if let Some(record) = self.memory.as_ref().and_then(|memory| memory.get(id)) {
            debug!(%id, "in-process cache hit");
            return Ok(Some(record));
        }

        let now = self.clock.now();
        match self.store.get(id).await {
            Ok(Some(entry)) if entry.is_fresh(now) => {
                debug!(%id, "store cache hit");
                self.remember(&entry.record, entry.expires_at);
                return Ok(Some(entry.record));
            }
            Ok(Some(_)) => debug!(%id, "stored entry expired"),
            Ok(None) => debug!(%id, "cache miss"),
            Err(e) => warn!(%id, error = %e, "store read failed, treating as miss"),
        }

        let Some(record) = self.fetcher.fetch_update(id).await? else {
            debug!(%id, "upstream has no such update");
            return Ok(None);
        };

        // A TTL too large to represent leaves the row without an expiry
        let expires_at = self.clock.now().checked_add_signed(self.ttl);
        match self.store.put(id, &record, expires_at).await {
            Ok(()) => info!(%id, ?expires_at, "refreshed cached update"),
            Err(e) => warn!(%id, error = %e, "failed to write update back to store"),
        }
        self.remember(&record, expires_at);

        Ok(Some(record))
    }

    /// Deletes expired rows from the store and the in-process cache
    pub async fn sweep_expired(&self) -> Result<u64, StoreError> {
        if let Some(memory) = &self.memory {
            memory.purge_expired();
        }
        let removed = self.store.sweep_expired(self.clock.now()).await?;
        info!(removed, "swept expired updates");
        Ok(removed)
    }

    fn remember(&self, record: &UpdateRecord, expires_at: Option<DateTime<Utc>>) {
        if let Some(memory) = &self.memory {
            memory.insert(record.clone(), expires_at);
        }
    }
}
