//! Upload write operations: add, bitmap updates, state, remove.

use anyhow::Result;

use crate::chunker::FileId;

use super::super::db::{unix_timestamp, UploadStore};
use super::super::types::{NewUpload, UploadState};

impl UploadStore {
    /// Insert a new queued upload and return its id.
    pub async fn add_upload(&self, new: NewUpload<'_>) -> Result<FileId> {
        let now = unix_timestamp();
        let settings_json = serde_json::to_string(new.settings)?;

        let row_id = sqlx::query(
            r#"
            INSERT INTO uploads (
                source_path, remote, total_size, chunk_size, chunk_count,
                finished_bitmap, sha256, state, created_at, updated_at, settings_json
            ) VALUES (?1, ?2, ?3, ?4, ?5,
                      x'', NULL, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(new.source_path)
        .bind(new.remote)
        .bind(new.total_size)
        .bind(new.chunk_size)
        .bind(new.chunk_count)
        .bind(UploadState::Queued.as_str())
        .bind(now)
        .bind(now)
        .bind(settings_json)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(row_id)
    }

    /// Update only the finished-chunk bitmap (and updated_at). Called after
    /// every chunk ack so a crash never loses acknowledged progress.
    pub async fn update_bitmap(&self, id: FileId, bitmap: &[u8]) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE uploads
            SET finished_bitmap = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(bitmap)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Update the lifecycle state of an existing upload.
    pub async fn set_state(&self, id: FileId, state: UploadState) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE uploads
            SET state = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(state.as_str())
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record the SHA-256 of the source file (hex), for later verification
    /// that the file on disk is still the one that was enqueued.
    pub async fn set_digest(&self, id: FileId, sha256_hex: &str) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE uploads
            SET sha256 = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(sha256_hex)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Normalize any upload left in `uploading` back to `queued` (e.g. after
    /// a crash). Call at startup so interrupted uploads become resumable.
    /// Returns the number of rows reset.
    pub async fn recover_interrupted(&self) -> Result<u64> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE uploads
            SET state = 'queued',
                updated_at = ?1
            WHERE state = 'uploading'
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }

    /// Permanently remove an upload row. The source file is untouched.
    pub async fn remove_upload(&self, id: FileId) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM uploads
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
