//! Public error taxonomy for the upload engine.
//!
//! Per-attempt transfer failures live in [`crate::transport::TransferError`]
//! and feed the retry policy; this type is what the facade (manager, chunker)
//! returns to callers.

use crate::chunker::FileId;

/// Errors surfaced by the upload manager's public operations.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// A caller-supplied parameter is unusable (e.g. zero chunk size).
    /// Fatal to the call, never retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The file id is unknown to the manager (query/cancel on a missing task).
    #[error("upload {0} not found")]
    NotFound(FileId),

    /// Local filesystem failure while preparing an upload (open/stat).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The resume store rejected a read or write needed to admit a task.
    #[error("store error: {0}")]
    Store(String),

    /// The scheduler has shut down and no longer accepts commands.
    #[error("upload manager is shut down")]
    Shutdown,
}
