//! Transport capability: how chunk bytes reach the remote endpoint.
//!
//! The engine treats the transport as opaque: anything that can persist a
//! byte range keyed by (file id, offset) works. The crate ships one real
//! implementation, [`HttpTransport`], which rides on curl easy handles.

mod error;
mod http;

pub use error::TransferError;
pub use http::HttpTransport;

use crate::chunker::FileId;

/// Remote confirmation that exactly `size` bytes at `offset` of `file_id`
/// were durably accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkAck {
    pub file_id: FileId,
    pub offset: u64,
    pub size: u64,
}

/// Byte-range upload primitive.
///
/// Implementations must be safe to re-invoke for the same (file id, offset)
/// pair: the scheduler retries failed chunks, so the remote side is expected
/// to treat a repeated range as idempotent.
#[async_trait::async_trait]
pub trait ChunkTransport: Send + Sync {
    /// Upload `data` as the byte range starting at `offset` of `file_id`.
    /// `total_size` is the full file length (for Content-Range style framing).
    async fn put_chunk(
        &self,
        file_id: FileId,
        offset: u64,
        total_size: u64,
        data: Vec<u8>,
    ) -> Result<ChunkAck, TransferError>;
}
