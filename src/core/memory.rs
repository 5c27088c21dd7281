//! Session snapshot storage using SQLite
//!
//! Each session keeps at most two snapshots of its `UserData`: the live one,
//! rewritten after every turn, and the one saved when the user abandoned a
//! quote by starting over. Snapshots older than the TTL are never resumed.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use super::state::UserData;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Live,
    Abandoned,
}

impl SnapshotKind {
    fn as_str(self) -> &'static str {
        match self {
            SnapshotKind::Live => "live",
            SnapshotKind::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub saved_at: DateTime<Utc>,
    pub data: UserData,
}

/// Snapshot store for session persistence
pub struct SessionStore {
    pool: SqlitePool,
    ttl: Duration,
}

impl SessionStore {
    /// Open (or create) the store at the given SQLite database path
    pub async fn new(db_path: &Path, ttl: Duration) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool, ttl };
        store.init_schema().await?;
        Ok(store)
    }

    #[cfg(test)]
    pub async fn new_in_memory(ttl: Duration) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool, ttl };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                session_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                saved_at TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (session_id, kind)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn save(
        &self,
        session_id: &str,
        kind: SnapshotKind,
        data: &UserData,
    ) -> Result<(), StoreError> {
        self.save_at(session_id, kind, data, Utc::now()).await
    }

    /// Upsert with an explicit timestamp
    pub async fn save_at(
        &self,
        session_id: &str,
        kind: SnapshotKind,
        data: &UserData,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(data)?;
        sqlx::query(
            r#"
            INSERT INTO snapshots (session_id, kind, saved_at, data)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(session_id, kind)
            DO UPDATE SET saved_at = excluded.saved_at, data = excluded.data
            "#,
        )
        .bind(session_id)
        .bind(kind.as_str())
        .bind(timestamp(saved_at))
        .bind(json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn load(
        &self,
        session_id: &str,
        kind: SnapshotKind,
    ) -> Result<Option<Snapshot>, StoreError> {
        let row: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT saved_at, data
            FROM snapshots
            WHERE session_id = ? AND kind = ?
            "#,
        )
        .bind(session_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some((saved_at, data)) = row else {
            return Ok(None);
        };

        let saved_at = DateTime::parse_from_rfc3339(&saved_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let data = serde_json::from_str(&data)?;
        Ok(Some(Snapshot { saved_at, data }))
    }

    pub async fn discard(&self, session_id: &str, kind: SnapshotKind) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM snapshots WHERE session_id = ? AND kind = ?")
            .bind(session_id)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete every snapshot past the TTL. Returns how many were removed.
    pub async fn purge_stale(&self) -> Result<u64, StoreError> {
        let cutoff = timestamp(Utc::now() - self.ttl);
        let result = sqlx::query("DELETE FROM snapshots WHERE saved_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// State worth offering to resume.
    ///
    /// Prefers the abandoned snapshot over the live one. Stale snapshots are
    /// deleted on sight.
    pub async fn resumable(&self, session_id: &str) -> Result<Option<UserData>, StoreError> {
        for kind in [SnapshotKind::Abandoned, SnapshotKind::Live] {
            let Some(snapshot) = self.load(session_id, kind).await? else {
                continue;
            };

            if Utc::now() - snapshot.saved_at > self.ttl {
                tracing::debug!(session_id, kind = kind.as_str(), "Discarding stale snapshot");
                self.discard(session_id, kind).await?;
                continue;
            }

            if snapshot.data.current_step.is_resumable() {
                return Ok(Some(snapshot.data));
            }
        }
        Ok(None)
    }
}

/// Fixed-width UTC timestamps so `saved_at` compares as text
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
