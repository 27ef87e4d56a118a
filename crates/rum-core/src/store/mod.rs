//! Persistent upload state (SQLite via sqlx).
//!
//! Stores one row per upload: source path, remote, chunk layout, the
//! finished-chunk bitmap, and lifecycle state. The bitmap is rewritten
//! after every chunk ack so an interrupted process can resume without
//! re-uploading completed chunks.

mod db;
mod types;
mod uploads;


pub use db::UploadStore;
pub use types::{NewUpload, UploadRecord, UploadSettings, UploadState, UploadSummary};
