//! Types used by the upload store.

use crate::chunker::FileId;

/// Lifecycle state stored as a string in the database. Mirrors
/// [`crate::task::TaskStatus`] with `queued` standing in for a task that is
/// admitted but not yet transferring (or was interrupted and will be
/// re-admitted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Queued,
    Uploading,
    Completed,
    Failed,
    Cancelled,
}

impl UploadState {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadState::Queued => "queued",
            UploadState::Uploading => "uploading",
            UploadState::Completed => "completed",
            UploadState::Failed => "failed",
            UploadState::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "queued" => UploadState::Queued,
            "uploading" => UploadState::Uploading,
            "completed" => UploadState::Completed,
            "cancelled" => UploadState::Cancelled,
            _ => UploadState::Failed,
        }
    }

    /// Whether a row in this state can be re-admitted by `resume`.
    pub fn is_resumable(self) -> bool {
        matches!(self, UploadState::Queued | UploadState::Uploading)
    }
}

/// Per-upload settings, stored as JSON in the DB so the schema stays
/// flexible as knobs are added.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default)]
pub struct UploadSettings {
    /// Scheduling priority; higher values are dispatched first.
    #[serde(default)]
    pub priority: i32,
}

/// Everything the store needs to persist a new upload. The chunk layout is
/// fixed at admission, so the row is complete from the start.
#[derive(Debug, Clone)]
pub struct NewUpload<'a> {
    pub source_path: &'a str,
    pub remote: &'a str,
    pub total_size: i64,
    pub chunk_size: i64,
    pub chunk_count: i64,
    pub settings: &'a UploadSettings,
}

/// Summary view used by the CLI `status` command.
#[derive(Debug, Clone)]
pub struct UploadSummary {
    pub id: FileId,
    pub source_path: String,
    pub remote: String,
    pub state: UploadState,
    pub total_size: i64,
    pub chunk_count: i64,
    pub chunks_finished: usize,
}

/// Full upload row used to rebuild a task for resumption.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub id: FileId,
    pub source_path: String,
    pub remote: String,
    pub total_size: i64,
    pub chunk_size: i64,
    pub chunk_count: i64,
    pub finished_bitmap: Vec<u8>,
    pub sha256: Option<String>,
    pub state: UploadState,
    pub created_at: i64,
    pub updated_at: i64,
    pub settings: UploadSettings,
}
