//! Cache layers for announcement records
//!
//! The persistent layer is any [`UpdateStore`]: a JSON file per record on
//! disk, a SQLite table, or a process-local map. A bounded [`MemoryCache`]
//! with a short TTL can sit in front of it to save store round trips.

mod file;
mod memory;
mod sqlite;
mod store;

pub use file::FileStore;
pub use memory::MemoryCache;
pub use sqlite::SqliteStore;
pub use store::{CacheEntry, MemoryStore, StoreError, UpdateStore};
