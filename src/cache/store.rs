//! Persistent store contract and the in-memory implementation

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::data::{UpdateId, UpdateRecord};

/// Errors raised by a store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize cache entry: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid stored timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

/// A stored record together with its bookkeeping timestamps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached record
    pub record: UpdateRecord,
    /// When the row was first written
    pub created_at: DateTime<Utc>,
    /// When the row was last overwritten
    pub updated_at: DateTime<Utc>,
    /// When the row goes stale; `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Whether the entry may still be served at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

/// Keyed storage for cached records
///
/// `put` is an upsert: writing an id twice replaces the payload and the
/// expiry and keeps the original `created_at`.
#[async_trait]
pub trait UpdateStore: Send + Sync {
    /// Point lookup by identifier
    async fn get(&self, id: &UpdateId) -> Result<Option<CacheEntry>, StoreError>;

    /// Inserts or replaces the row for `id`
    async fn put(
        &self,
        id: &UpdateId,
        record: &UpdateRecord,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Deletes every row whose expiry is at or before `now`
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Builds the entry written by `put`, carrying `created_at` over from any
/// previous row
pub(crate) fn upserted_entry(
    previous: Option<&CacheEntry>,
    record: &UpdateRecord,
    expires_at: Option<DateTime<Utc>>,
) -> CacheEntry {
    let now = Utc::now();
    CacheEntry {
        record: record.clone(),
        created_at: previous.map_or(now, |p| p.created_at),
        updated_at: now,
        expires_at,
    }
}

/// Process-local store, used for tests and `--store memory`
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<UpdateId, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl UpdateStore for MemoryStore {
    async fn get(&self, id: &UpdateId) -> Result<Option<CacheEntry>, StoreError> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn put(
        &self,
        id: &UpdateId,
        record: &UpdateRecord,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        let entry = upserted_entry(entries.get(id), record, expires_at);
        entries.insert(id.clone(), entry);
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(id: &str, title: &str) -> (UpdateId, UpdateRecord) {
        let id = UpdateId::parse(id).unwrap();
        let record = UpdateRecord::new(id.clone(), title, "D");
        (id, record)
    }

    #[test]
    fn test_entry_without_expiry_is_always_fresh() {
        let (_, record) = record("1", "T");
        let entry = CacheEntry {
            record,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            expires_at: None,
        };
        let far_future = Utc.with_ymd_and_hms(2999, 1, 1, 0, 0, 0).unwrap();
        assert!(entry.is_fresh(far_future));
    }

    #[test]
    fn test_entry_is_stale_at_its_expiry() {
        let (_, record) = record("1", "T");
        let expires_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let entry = CacheEntry {
            record,
            created_at: expires_at - Duration::hours(12),
            updated_at: expires_at - Duration::hours(12),
            expires_at: Some(expires_at),
        };

        assert!(entry.is_fresh(expires_at - Duration::seconds(1)));
        assert!(!entry.is_fresh(expires_at));
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        let (id, record) = record("123456", "T");
        let expires_at = Some(Utc::now() + Duration::hours(12));

        store.put(&id, &record, expires_at).await.unwrap();
        let entry = store.get(&id).await.unwrap().expect("Entry should exist");

        assert_eq!(entry.record, record);
        assert_eq!(entry.expires_at, expires_at);
    }

    #[tokio::test]
    async fn test_memory_store_missing_key() {
        let store = MemoryStore::new();
        let id = UpdateId::parse("1").unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_put_replaces_row() {
        let store = MemoryStore::new();
        let (id, first) = record("9", "first");
        let (_, second) = record("9", "second");
        let later = Utc::now() + Duration::hours(24);

        store.put(&id, &first, Some(Utc::now())).await.unwrap();
        let created_at = store.get(&id).await.unwrap().unwrap().created_at;
        store.put(&id, &second, Some(later)).await.unwrap();

        let entry = store.get(&id).await.unwrap().unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(entry.record.title(), "second");
        assert_eq!(entry.expires_at, Some(later));
        assert_eq!(entry.created_at, created_at);
    }

    #[tokio::test]
    async fn test_memory_store_sweep_removes_only_expired() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let (old_id, old) = record("1", "old");
        let (new_id, new) = record("2", "new");
        let (forever_id, forever) = record("3", "forever");

        store.put(&old_id, &old, Some(now - Duration::hours(1))).await.unwrap();
        store.put(&new_id, &new, Some(now + Duration::hours(1))).await.unwrap();
        store.put(&forever_id, &forever, None).await.unwrap();

        assert_eq!(store.sweep_expired(now).await.unwrap(), 1);
        assert!(store.get(&old_id).await.unwrap().is_none());
        assert!(store.get(&new_id).await.unwrap().is_some());
        assert!(store.get(&forever_id).await.unwrap().is_some());
    }
}
