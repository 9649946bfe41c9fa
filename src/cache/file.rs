//! File-backed store
//!
//! Keeps one JSON document per identifier in an XDG-compliant cache
//! directory (`~/.cache/updatesnap/updates/` on Linux).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use tokio::fs;
use tracing::warn;

use super::store::{upserted_entry, CacheEntry, StoreError, UpdateStore};
use crate::data::{UpdateId, UpdateRecord};

/// Stores cache entries as JSON files on disk
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory where entry files are stored
    cache_dir: PathBuf,
}

impl FileStore {
    /// Creates a FileStore in the XDG cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "updatesnap")?;
        let cache_dir = project_dirs.cache_dir().join("updates");
        Some(Self { cache_dir })
    }

    /// Creates a FileStore rooted at a custom directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Returns the directory entries are written to
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Identifiers are validated, so they are always safe file names
    fn entry_path(&self, id: &UpdateId) -> PathBuf {
        self.cache_dir.join(format!("{}.json", id))
    }

    async fn read_entry(&self, path: &Path) -> Result<Option<CacheEntry>, StoreError> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl UpdateStore for FileStore {
    async fn get(&self, id: &UpdateId) -> Result<Option<CacheEntry>, StoreError> {
        self.read_entry(&self.entry_path(id)).await
    }

    async fn put(
        &self,
        id: &UpdateId,
        record: &UpdateRecord,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        fs::create_dir_all(&self.cache_dir).await?;

        let path = self.entry_path(id);
        // An unreadable previous entry is simply replaced
        let previous = self.read_entry(&path).await.ok().flatten();
        let entry = upserted_entry(previous.as_ref(), record, expires_at);

        let json = serde_json::to_string_pretty(&entry)?;
        fs::write(path, json).await?;
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut dir = match fs::read_dir(&self.cache_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match self.read_entry(&path).await {
                Ok(Some(entry)) if !entry.is_fresh(now) => {
                    fs::remove_file(&path).await?;
                    removed += 1;
                }
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable cache file"),
            }
        }
        Ok(removed)
    }
}
