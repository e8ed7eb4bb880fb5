use async_trait::async_trait;
use chrono::Utc;
use jlpt_core::model::ProgressState;
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{PROGRESS_KEY, ProgressRecord, ProgressRepository, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load_progress(&self) -> Result<Option<ProgressState>, StorageError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(PROGRESS_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let blob: String = row.try_get("value").map_err(ser)?;
        ProgressRecord::decode(&blob).map(Some)
    }

    async fn save_progress(&self, state: &ProgressState) -> Result<(), StorageError> {
        let blob = ProgressRecord::encode(state)?;
        self.put_raw_progress(&blob).await
    }
}

impl SqliteRepository {
    /// Overwrite the progress row with an arbitrary blob.
    ///
    /// Used to import a blob exported elsewhere; no validation is done here,
    /// a bad blob surfaces on the next load.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the write fails.
    pub async fn put_raw_progress(&self, blob: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(PROGRESS_KEY)
        .bind(blob)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }
}
