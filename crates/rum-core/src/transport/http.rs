//! HTTP PUT transport over curl easy handles.
//!
//! Each chunk is PUT to `{base}/{file_id}/{offset}` with a Content-Range
//! header, so the remote side can persist ranges idempotently. curl is
//! blocking, so each attempt runs inside `spawn_blocking`.

use std::collections::HashMap;
use std::time::Duration;

use crate::chunker::FileId;

use super::error::TransferError;
use super::{ChunkAck, ChunkTransport};

/// Transport that PUTs chunks to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    headers: HashMap<String, String>,
    attempt_timeout: Duration,
}

impl HttpTransport {
    /// New transport for `base_url`. `attempt_timeout` bounds each PUT at
    /// the curl level so blocked transfers cannot pin a worker thread.
    pub fn new(base_url: impl Into<String>, attempt_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            headers: HashMap::new(),
            attempt_timeout,
        }
    }

    /// Add a header sent with every chunk PUT (e.g. an auth token).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    fn chunk_url(&self, file_id: FileId, offset: u64) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            file_id,
            offset
        )
    }
}

#[async_trait::async_trait]
impl ChunkTransport for HttpTransport {
    async fn put_chunk(
        &self,
        file_id: FileId,
        offset: u64,
        total_size: u64,
        data: Vec<u8>,
    ) -> Result<ChunkAck, TransferError> {
        let url = self.chunk_url(file_id, offset);
        let headers = self.headers.clone();
        let timeout = self.attempt_timeout;
        let size = data.len() as u64;

        let join = tokio::task::spawn_blocking(move || {
            put_chunk_blocking(&url, &headers, timeout, offset, total_size, data)
        })
        .await;

        match join {
            Ok(result) => result.map(|()| ChunkAck {
                file_id,
                offset,
                size,
            }),
            // The blocking task only ends abnormally on panic; surface it.
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}

/// One blocking PUT of `data` with a Content-Range header. Returns Ok(())
/// only when the remote answered 2xx after consuming the whole body.
fn put_chunk_blocking(
    url: &str,
    custom_headers: &HashMap<String, String>,
    attempt_timeout: Duration,
    offset: u64,
    total_size: u64,
    data: Vec<u8>,
) -> Result<(), TransferError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(map_curl_error)?;
    easy.upload(true).map_err(map_curl_error)?;
    easy.in_filesize(data.len() as u64).map_err(map_curl_error)?;
    easy.connect_timeout(Duration::from_secs(30))
        .map_err(map_curl_error)?;
    // Abort when throughput drops below 1 KiB/s for 60s, plus a hard cap on
    // the whole attempt; stalled uploads must fail into the retry path.
    easy.low_speed_limit(1024).map_err(map_curl_error)?;
    easy.low_speed_time(Duration::from_secs(60))
        .map_err(map_curl_error)?;
    easy.timeout(attempt_timeout).map_err(map_curl_error)?;

    let mut list = curl::easy::List::new();
    let end = offset + data.len() as u64;
    let range = if data.is_empty() {
        format!("Content-Range: bytes */{}", total_size)
    } else {
        format!("Content-Range: bytes {}-{}/{}", offset, end - 1, total_size)
    };
    list.append(&range).map_err(map_curl_error)?;
    // curl inserts `Expect: 100-continue` on larger PUT bodies; chunk
    // endpoints rarely answer the interim response, so skip the handshake.
    list.append("Expect:").map_err(map_curl_error)?;
    for (k, v) in custom_headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))
            .map_err(map_curl_error)?;
    }
    easy.http_headers(list).map_err(map_curl_error)?;

    let mut sent = 0usize;
    {
        let mut transfer = easy.transfer();
        transfer
            .read_function(move |into| {
                let remaining = &data[sent.min(data.len())..];
                let n = remaining.len().min(into.len());
                into[..n].copy_from_slice(&remaining[..n]);
                sent += n;
                Ok(n)
            })
            .map_err(map_curl_error)?;
        transfer.perform().map_err(map_curl_error)?;
    }

    let code = easy.response_code().map_err(map_curl_error)? as u16;
    if !(200..300).contains(&code) {
        return Err(TransferError::RemoteRejected(code));
    }
    Ok(())
}

/// Map a curl error into the transfer taxonomy. Anything that is not a
/// timeout counts as a connection-level failure; retries are bounded, so
/// mis-bucketing an exotic curl error costs at most the retry budget.
fn map_curl_error(e: curl::Error) -> TransferError {
    if e.is_operation_timedout() {
        TransferError::Timeout
    } else {
        TransferError::ConnectionReset
    }
}
