//! Single chunk upload execution.
//!
//! A `ChunkUploader` performs one attempt: read the chunk's window from the
//! source file, hand the bytes to the transport, and verify the ack covers
//! exactly the requested window. Retry and re-enqueue decisions stay with
//! the scheduler; this layer only reports how one attempt went.

use std::sync::Arc;
use std::time::Duration;

use crate::chunker::ChunkDescriptor;
use crate::reader::ChunkReader;
use crate::transport::{ChunkAck, ChunkTransport, TransferError};

/// Executes individual chunk upload attempts against a transport.
#[derive(Clone)]
pub struct ChunkUploader {
    transport: Arc<dyn ChunkTransport>,
    attempt_timeout: Duration,
}

impl ChunkUploader {
    pub fn new(transport: Arc<dyn ChunkTransport>, attempt_timeout: Duration) -> Self {
        Self {
            transport,
            attempt_timeout,
        }
    }

    /// One attempt for `chunk`. Safe to re-invoke for the same chunk: the
    /// remote keys persisted ranges by (file id, offset), so a repeated PUT
    /// overwrites the same window. Does not mutate the descriptor; the
    /// caller applies the outcome.
    pub async fn upload(
        &self,
        reader: &ChunkReader,
        total_size: u64,
        chunk: &ChunkDescriptor,
    ) -> Result<ChunkAck, TransferError> {
        let r = reader.clone();
        let (offset, size) = (chunk.offset, chunk.size);
        let data = match tokio::task::spawn_blocking(move || r.read_range(offset, size)).await {
            Ok(read) => read.map_err(TransferError::LocalRead)?,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        };

        let put = self
            .transport
            .put_chunk(chunk.file_id, chunk.offset, total_size, data);
        let ack = match tokio::time::timeout(self.attempt_timeout, put).await {
            Ok(result) => result?,
            Err(_) => return Err(TransferError::Timeout),
        };

        if ack.file_id != chunk.file_id || ack.offset != chunk.offset || ack.size != chunk.size {
            tracing::warn!(
                "transport acked {}@{} ({} bytes), wanted {}@{} ({} bytes)",
                ack.file_id,
                ack.offset,
                ack.size,
                chunk.file_id,
                chunk.offset,
                chunk.size
            );
            return Err(TransferError::ConnectionReset);
        }
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    /// Transport that records what it was asked to send and answers from a
    /// canned script.
    struct RecordingTransport {
        sent: Mutex<Vec<(u64, Vec<u8>)>>,
        ack_size_override: Option<u64>,
        delay: Option<Duration>,
    }

    impl RecordingTransport {
        fn ok() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                ack_size_override: None,
                delay: None,
            }
        }
    }

    #[async_trait::async_trait]
    impl ChunkTransport for RecordingTransport {
        async fn put_chunk(
            &self,
            file_id: crate::chunker::FileId,
            offset: u64,
            _total_size: u64,
            data: Vec<u8>,
        ) -> Result<ChunkAck, TransferError> {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            let size = self.ack_size_override.unwrap_or(data.len() as u64);
            self.sent.lock().unwrap().push((offset, data));
            Ok(ChunkAck {
                file_id,
                offset,
                size,
            })
        }
    }

    fn source_with(bytes: &[u8]) -> (tempfile::TempDir, ChunkReader) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("src.bin");
        std::fs::File::create(&path).unwrap().write_all(bytes).unwrap();
        let reader = ChunkReader::open(&path).unwrap();
        (dir, reader)
    }

    #[tokio::test]
    async fn uploads_exact_window_bytes() {
        let (_dir, reader) = source_with(b"0123456789");
        let transport = Arc::new(RecordingTransport::ok());
        let uploader = ChunkUploader::new(transport.clone(), Duration::from_secs(5));

        let chunk = ChunkDescriptor::new(7, 4, 3);
        let ack = uploader.upload(&reader, 10, &chunk).await.unwrap();
        assert_eq!(ack.offset, 4);
        assert_eq!(ack.size, 3);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[(4u64, b"456".to_vec())]);
    }

    #[tokio::test]
    async fn short_source_is_local_read_error() {
        let (_dir, reader) = source_with(b"abc");
        let uploader = ChunkUploader::new(
            Arc::new(RecordingTransport::ok()),
            Duration::from_secs(5),
        );

        let chunk = ChunkDescriptor::new(1, 0, 64);
        let err = uploader.upload(&reader, 64, &chunk).await.unwrap_err();
        assert!(matches!(err, TransferError::LocalRead(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_transport_times_out() {
        let (_dir, reader) = source_with(b"abcdef");
        let transport = Arc::new(RecordingTransport {
            sent: Mutex::new(Vec::new()),
            ack_size_override: None,
            delay: Some(Duration::from_secs(60)),
        });
        let uploader = ChunkUploader::new(transport, Duration::from_secs(1));

        let chunk = ChunkDescriptor::new(1, 0, 6);
        let err = uploader.upload(&reader, 6, &chunk).await.unwrap_err();
        assert!(matches!(err, TransferError::Timeout));
    }

    #[tokio::test]
    async fn mismatched_ack_is_rejected() {
        let (_dir, reader) = source_with(b"abcdef");
        let transport = Arc::new(RecordingTransport {
            sent: Mutex::new(Vec::new()),
            ack_size_override: Some(999),
            delay: None,
        });
        let uploader = ChunkUploader::new(transport, Duration::from_secs(5));

        let chunk = ChunkDescriptor::new(1, 0, 6);
        let err = uploader.upload(&reader, 6, &chunk).await.unwrap_err();
        assert!(matches!(err, TransferError::ConnectionReset));
    }
}
