//! Bounded in-process cache in front of the persistent store
//!
//! Entries live for a short TTL measured on an injected [`Clock`], and never
//! past the expiry of the stored row they mirror. When the cache is full,
//! expired entries are dropped first, then the oldest insert.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::data::{UpdateId, UpdateRecord};

#[derive(Debug, Clone)]
struct Slot {
    record: UpdateRecord,
    inserted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// A small TTL cache keyed by identifier
#[derive(Debug)]
pub struct MemoryCache {
    slots: Mutex<HashMap<UpdateId, Slot>>,
    capacity: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    /// Creates a cache holding at most `capacity` records for `ttl` each
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::with_capacity(capacity)),
            capacity,
            ttl,
            clock,
        }
    }

    /// Returns an unexpired record for `id`
    pub fn get(&self, id: &UpdateId) -> Option<UpdateRecord> {
        let now = self.clock.now();
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        match slots.get(id) {
            Some(slot) if now < slot.expires_at => Some(slot.record.clone()),
            Some(_) => {
                slots.remove(id);
                None
            }
            None => None,
        }
    }

    /// Stores `record`, evicting to stay within capacity
    ///
    /// The slot expires after the cache TTL or at `store_expiry`, whichever
    /// comes first.
    pub fn insert(&self, record: UpdateRecord, store_expiry: Option<DateTime<Utc>>) {
        if self.capacity == 0 {
            return;
        }
        let now = self.clock.now();
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());

        if !slots.contains_key(record.id()) && slots.len() >= self.capacity {
            slots.retain(|_, slot| now < slot.expires_at);
            if slots.len() >= self.capacity {
                let oldest = slots
                    .iter()
                    .min_by_key(|(_, slot)| slot.inserted_at)
                    .map(|(id, _)| id.clone());
                if let Some(oldest) = oldest {
                    slots.remove(&oldest);
                }
            }
        }

        let local_expiry = now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let expires_at = match store_expiry {
            Some(store_expiry) => store_expiry.min(local_expiry),
            None => local_expiry,
        };
        slots.insert(
            record.id().clone(),
            Slot {
                record,
                inserted_at: now,
                expires_at,
            },
        );
    }

    /// Drops every expired entry and returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let before = slots.len();
        slots.retain(|_, slot| now < slot.expires_at);
        before - slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn record(id: &str) -> UpdateRecord {
        UpdateRecord::new(UpdateId::parse(id).unwrap(), format!("title {}", id), "D")
    }

    fn cache(capacity: usize) -> (MemoryCache, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let cache = MemoryCache::new(capacity, Duration::seconds(60), Arc::new(clock.clone()));
        (cache, clock)
    }

    #[test]
    fn test_hit_within_ttl() {
        let (cache, clock) = cache(4);
        cache.insert(record("1"), None);

        clock.advance(Duration::seconds(59));

        let hit = cache.get(&UpdateId::parse("1").unwrap()).expect("Should hit");
        assert_eq!(hit.title(), "title 1");
    }

    #[test]
    fn test_miss_after_ttl() {
        let (cache, clock) = cache(4);
        cache.insert(record("1"), None);

        clock.advance(Duration::seconds(60));

        assert!(cache.get(&UpdateId::parse("1").unwrap()).is_none());
        assert!(cache.is_empty(), "Expired entry should be dropped on read");
    }

    #[test]
    fn test_full_cache_evicts_oldest_insert() {
        let (cache, clock) = cache(2);
        cache.insert(record("1"), None);
        clock.advance(Duration::seconds(1));
        cache.insert(record("2"), None);
        clock.advance(Duration::seconds(1));
        cache.insert(record("3"), None);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&UpdateId::parse("1").unwrap()).is_none());
        assert!(cache.get(&UpdateId::parse("2").unwrap()).is_some());
        assert!(cache.get(&UpdateId::parse("3").unwrap()).is_some());
    }

    #[test]
    fn test_full_cache_prefers_dropping_expired() {
        let (cache, clock) = cache(2);
        cache.insert(record("1"), None);
        clock.advance(Duration::seconds(30));
        cache.insert(record("2"), None);
        clock.advance(Duration::seconds(40));

        // "1" has expired, "2" has not
        cache.insert(record("3"), None);

        assert!(cache.get(&UpdateId::parse("2").unwrap()).is_some());
        assert!(cache.get(&UpdateId::parse("3").unwrap()).is_some());
    }

    #[test]
    fn test_reinsert_refreshes_without_eviction() {
        let (cache, clock) = cache(2);
        cache.insert(record("1"), None);
        cache.insert(record("2"), None);
        clock.advance(Duration::seconds(50));
        cache.insert(record("1"), None);
        clock.advance(Duration::seconds(20));

        assert!(cache.get(&UpdateId::parse("1").unwrap()).is_some());
        assert!(cache.get(&UpdateId::parse("2").unwrap()).is_none());
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let (cache, _clock) = cache(0);
        cache.insert(record("1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_slot_never_outlives_store_expiry() {
        let (cache, clock) = cache(4);
        let store_expiry = clock.now() + Duration::seconds(5);
        cache.insert(record("1"), Some(store_expiry));
        cache.insert(record("2"), Some(clock.now() + Duration::hours(1)));

        clock.advance(Duration::seconds(5));

        assert!(cache.get(&UpdateId::parse("1").unwrap()).is_none());
        assert!(cache.get(&UpdateId::parse("2").unwrap()).is_some());
    }

    #[test]
    fn test_already_expired_row_is_not_served() {
        let (cache, clock) = cache(4);
        cache.insert(record("1"), Some(clock.now() - Duration::seconds(1)));

        assert!(cache.get(&UpdateId::parse("1").unwrap()).is_none());
    }

    #[test]
    fn test_purge_expired() {
        let (cache, clock) = cache(4);
        cache.insert(record("1"), None);
        clock.advance(Duration::seconds(30));
        cache.insert(record("2"), None);
        clock.advance(Duration::seconds(31));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
