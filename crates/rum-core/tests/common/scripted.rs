//! Scripted in-memory transport for scheduler behavior tests.
//!
//! Each offset can be told to fail a fixed number of times before
//! accepting, or to stall forever. Every attempt is logged so tests can
//! assert on dispatch order and retry counts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rum_core::chunker::FileId;
use rum_core::transport::{ChunkAck, ChunkTransport, TransferError};

#[derive(Debug, Clone, Copy)]
enum Script {
    /// Reject with this HTTP status this many more times, then accept.
    FailFirst { remaining: u32, status: u16 },
    /// Never resolve; the attempt hangs until its worker is dropped.
    Stall,
}

enum Action {
    Accept,
    Fail(u16),
    Stall,
}

pub struct ScriptedTransport {
    scripts: Mutex<HashMap<u64, Script>>,
    attempts: Mutex<Vec<(FileId, u64)>>,
    respond_after: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            attempts: Mutex::new(Vec::new()),
            respond_after: Duration::ZERO,
        }
    }

    /// Delay every response; useful to keep an attempt observably in flight.
    pub fn respond_after(mut self, delay: Duration) -> Self {
        self.respond_after = delay;
        self
    }

    /// Reject `offset` with `status` for the first `times` attempts.
    pub fn fail_first(self, offset: u64, times: u32, status: u16) -> Self {
        self.scripts.lock().unwrap().insert(
            offset,
            Script::FailFirst {
                remaining: times,
                status,
            },
        );
        self
    }

    /// Make attempts at `offset` hang forever.
    pub fn stall(self, offset: u64) -> Self {
        self.scripts.lock().unwrap().insert(offset, Script::Stall);
        self
    }

    /// Every attempt seen, in arrival order.
    pub fn attempts(&self) -> Vec<(FileId, u64)> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempts_at(&self, offset: u64) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, off)| *off == offset)
            .count() as u32
    }
}

#[async_trait]
impl ChunkTransport for ScriptedTransport {
    async fn put_chunk(
        &self,
        file_id: FileId,
        offset: u64,
        _total_size: u64,
        data: Vec<u8>,
    ) -> Result<ChunkAck, TransferError> {
        self.attempts.lock().unwrap().push((file_id, offset));
        let action = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(&offset) {
                Some(Script::FailFirst { remaining, status }) if *remaining > 0 => {
                    *remaining -= 1;
                    Action::Fail(*status)
                }
                Some(Script::Stall) => Action::Stall,
                _ => Action::Accept,
            }
        };
        if self.respond_after > Duration::ZERO {
            tokio::time::sleep(self.respond_after).await;
        }
        match action {
            Action::Stall => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Action::Fail(status) => Err(TransferError::RemoteRejected(status)),
            Action::Accept => Ok(ChunkAck {
                file_id,
                offset,
                size: data.len() as u64,
            }),
        }
    }
}
