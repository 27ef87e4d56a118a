//! Upload read operations: list and get.

use anyhow::Result;
use sqlx::Row;

use crate::chunker::{ChunkBitmap, FileId};

use super::super::db::UploadStore;
use super::super::types::{UploadRecord, UploadSettings, UploadState, UploadSummary};

impl UploadStore {
    /// List all uploads, newest first.
    pub async fn list_uploads(&self) -> Result<Vec<UploadSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, source_path, remote, state, total_size, chunk_count, finished_bitmap
            FROM uploads
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let chunk_count: i64 = row.get("chunk_count");
            let bitmap_bytes: Vec<u8> = row.get("finished_bitmap");
            let bitmap = ChunkBitmap::from_bytes(&bitmap_bytes, chunk_count.max(0) as usize);

            out.push(UploadSummary {
                id: row.get("id"),
                source_path: row.get("source_path"),
                remote: row.get("remote"),
                state: UploadState::from_str(row.get::<String, _>("state").as_str()),
                total_size: row.get("total_size"),
                chunk_count,
                chunks_finished: bitmap.count_completed(chunk_count.max(0) as usize),
            });
        }

        Ok(out)
    }

    /// Fetch a single upload row with everything needed to rebuild its task.
    pub async fn get_upload(&self, id: FileId) -> Result<Option<UploadRecord>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, source_path, remote, total_size, chunk_size, chunk_count,
                finished_bitmap, sha256, state, created_at, updated_at, settings_json
            FROM uploads
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let state_str: String = row.get("state");
        let settings_json: Option<String> = row.get("settings_json");
        let settings = settings_json
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(serde_json::from_str::<UploadSettings>)
            .transpose()?
            .unwrap_or_default();

        Ok(Some(UploadRecord {
            id: row.get("id"),
            source_path: row.get("source_path"),
            remote: row.get("remote"),
            total_size: row.get("total_size"),
            chunk_size: row.get("chunk_size"),
            chunk_count: row.get("chunk_count"),
            finished_bitmap: row.get("finished_bitmap"),
            sha256: row.get("sha256"),
            state: UploadState::from_str(&state_str),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            settings,
        }))
    }

    /// Ids of every resumable upload (queued or interrupted mid-transfer),
    /// oldest first so long-waiting uploads go out before fresh ones.
    pub async fn resumable_ids(&self) -> Result<Vec<FileId>> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM uploads
            WHERE state IN ('queued', 'uploading')
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }
}
