//! SQLite-backed store
//!
//! One row per announcement in the `updates` table. The record's columns are
//! kept alongside a JSON `payload`, which is what lookups deserialize.
//! Timestamps are stored as fixed-width RFC 3339 text so that string
//! comparison orders them correctly.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::info;

use super::store::{CacheEntry, StoreError, UpdateStore};
use crate::data::{UpdateId, UpdateRecord};

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS updates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        impact_description TEXT,
        disclosure_date TEXT,
        tags TEXT NOT NULL DEFAULT '[]',
        payload TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        expires_at TEXT
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_updates_external_id ON updates (external_id)",
    "CREATE INDEX IF NOT EXISTS idx_updates_expires_at ON updates (expires_at)",
];

const UPSERT: &str = "INSERT INTO updates (
        external_id, title, description, impact_description, disclosure_date,
        tags, payload, created_at, updated_at, expires_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9)
    ON CONFLICT(external_id) DO UPDATE SET
        title = excluded.title,
        description = excluded.description,
        impact_description = excluded.impact_description,
        disclosure_date = excluded.disclosure_date,
        tags = excluded.tags,
        payload = excluded.payload,
        updated_at = excluded.updated_at,
        expires_at = excluded.expires_at";

#[derive(Debug, FromRow)]
struct UpdateRow {
    payload: String,
    created_at: String,
    updated_at: String,
    expires_at: Option<String>,
}

impl UpdateRow {
    fn into_entry(self) -> Result<CacheEntry, StoreError> {
        Ok(CacheEntry {
            record: serde_json::from_str(&self.payload)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            expires_at: self.expires_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

/// Relational store on a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// `updates.db` in the XDG cache directory
    pub fn default_path() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "updatesnap")?;
        Some(project_dirs.cache_dir().join("updates.db"))
    }

    /// Opens (creating if needed) the database file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;
        info!(path = %path.as_ref().display(), "opened sqlite store");
        Ok(store)
    }

    /// A private in-memory database that lives as long as the store
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection to :memory: is a separate database, so pin one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl UpdateStore for SqliteStore {
    async fn get(&self, id: &UpdateId) -> Result<Option<CacheEntry>, StoreError> {
        let row: Option<UpdateRow> = sqlx::query_as(
            "SELECT payload, created_at, updated_at, expires_at FROM updates WHERE external_id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UpdateRow::into_entry).transpose()
    }

    async fn put(
        &self,
        id: &UpdateId,
        record: &UpdateRecord,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(record)?;
        let tags = serde_json::to_string(record.tags())?;

        sqlx::query(UPSERT)
            .bind(id.as_str())
            .bind(record.title())
            .bind(record.description())
            .bind(record.impact_description())
            .bind(record.disclosure_date().map(format_timestamp))
            .bind(tags)
            .bind(payload)
            .bind(format_timestamp(Utc::now()))
            .bind(expires_at.map(format_timestamp))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM updates WHERE expires_at IS NOT NULL AND expires_at <= ?1")
                .bind(format_timestamp(now))
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
