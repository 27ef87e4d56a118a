//! The coordinator task: single owner of the work queue and task registry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::chunker::{ChunkDescriptor, FileId};
use crate::config::RumConfig;
use crate::error::UploadError;
use crate::reader::ChunkReader;
use crate::retry::RetryPolicy;
use crate::store::{UploadState, UploadStore};
use crate::task::{FileUploadTask, TaskSnapshot, TaskStatus};
use crate::transport::{ChunkAck, ChunkTransport, TransferError};
use crate::uploader::ChunkUploader;

use super::queue::{QueuedChunk, WorkQueue};

/// Everything needed to admit a fresh upload.
pub(crate) struct EnqueueSpec {
    pub path: PathBuf,
    /// Guard against the file changing between the caller's stat and ours;
    /// admission fails if the sizes disagree.
    pub expected_size: Option<u64>,
    pub chunk_size: Option<u64>,
    pub priority: i32,
}

/// Requests from manager handles to the coordinator.
pub(crate) enum Command {
    Enqueue {
        spec: EnqueueSpec,
        reply: oneshot::Sender<Result<FileId, UploadError>>,
    },
    Resume {
        file_id: FileId,
        reply: oneshot::Sender<Result<FileId, UploadError>>,
    },
    Status {
        file_id: FileId,
        reply: oneshot::Sender<Result<TaskSnapshot, UploadError>>,
    },
    List {
        reply: oneshot::Sender<Vec<TaskSnapshot>>,
    },
    Cancel {
        file_id: FileId,
        reply: oneshot::Sender<Result<bool, UploadError>>,
    },
    Watch {
        file_id: FileId,
        reply: oneshot::Sender<Result<oneshot::Receiver<TaskSnapshot>, UploadError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Outcome of one worker attempt, reported back over the result channel.
pub(super) struct AttemptResult {
    pub chunk: ChunkDescriptor,
    pub attempt: u32,
    pub outcome: Result<ChunkAck, TransferError>,
}

/// One live task plus its collaborators.
pub(super) struct Entry {
    pub task: FileUploadTask,
    pub reader: ChunkReader,
    pub watchers: Vec<oneshot::Sender<TaskSnapshot>>,
}

pub(crate) struct Coordinator {
    pub(super) max_parallel: usize,
    pub(super) default_chunk_size: u64,
    pub(super) policy: RetryPolicy,
    pub(super) uploader: ChunkUploader,
    pub(super) store: Option<UploadStore>,
    pub(super) remote: String,
    cmd_rx: mpsc::Receiver<Command>,
    result_tx: mpsc::Sender<AttemptResult>,
    result_rx: mpsc::Receiver<AttemptResult>,
    pub(super) queue: WorkQueue,
    pub(super) live: HashMap<FileId, Entry>,
    pub(super) archived: HashMap<FileId, TaskSnapshot>,
    pub(super) in_flight: usize,
    pub(super) draining: bool,
    pub(super) shutdown_replies: Vec<oneshot::Sender<()>>,
    /// Id source when no store is configured.
    pub(super) next_local_id: FileId,
}

impl Coordinator {
    pub(crate) fn new(
        cfg: &RumConfig,
        transport: Arc<dyn ChunkTransport>,
        store: Option<UploadStore>,
        remote: String,
        cmd_rx: mpsc::Receiver<Command>,
    ) -> Self {
        let (result_tx, result_rx) = mpsc::channel(32);
        Self {
            max_parallel: cfg.max_parallel.max(1),
            default_chunk_size: cfg.chunk_size_bytes,
            policy: cfg.retry_policy(),
            uploader: ChunkUploader::new(transport, cfg.attempt_timeout()),
            store,
            remote,
            cmd_rx,
            result_tx,
            result_rx,
            queue: WorkQueue::new(),
            live: HashMap::new(),
            archived: HashMap::new(),
            in_flight: 0,
            draining: false,
            shutdown_replies: Vec::new(),
            next_local_id: 1,
        }
    }

    /// Main loop. Exits once shutdown (or the last handle dropping) stops
    /// admissions and every in-flight attempt has reported back; queued
    /// chunks are abandoned and picked up by resumption on the next start.
    pub(crate) async fn run(mut self) {
        let mut cmd_open = true;
        loop {
            if self.draining && self.in_flight == 0 {
                break;
            }

            let wake = if self.in_flight < self.max_parallel && !self.draining {
                self.queue.next_eligible_at()
            } else {
                None
            };
            // A dummy far-off deadline when the timer arm is disabled.
            let deadline =
                wake.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                cmd = self.cmd_rx.recv(), if cmd_open => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        // Every handle is gone; finish in-flight work and stop.
                        cmd_open = false;
                        self.draining = true;
                    }
                },
                Some(result) = self.result_rx.recv() => {
                    self.in_flight -= 1;
                    self.apply_result(result).await;
                }
                _ = tokio::time::sleep_until(deadline), if wake.is_some() => {}
            }

            self.dispatch_ready().await;
        }

        if !self.queue.is_empty() {
            tracing::debug!("abandoning {} queued chunk(s)", self.queue.len());
        }
        for reply in self.shutdown_replies.drain(..) {
            let _ = reply.send(());
        }
        tracing::debug!("scheduler coordinator stopped");
    }

    /// Hand ready chunks to workers until capacity or the queue runs out.
    pub(super) async fn dispatch_ready(&mut self) {
        if self.draining {
            return;
        }
        let now = Instant::now();
        while self.in_flight < self.max_parallel {
            let Some(item) = self.queue.pop_ready(now) else {
                break;
            };
            let file_id = item.chunk.file_id;
            // Entries vanish on cancellation; their queued chunks are
            // dropped here instead of eagerly.
            let Some(entry) = self.live.get_mut(&file_id) else {
                continue;
            };
            let was_pending = entry.task.status() == TaskStatus::Pending;
            entry.task.note_started();

            let uploader = self.uploader.clone();
            let reader = entry.reader.clone();
            let total_size = entry.task.total_size();
            let tx = self.result_tx.clone();
            let chunk = item.chunk;
            let attempt = item.attempt;
            tokio::spawn(async move {
                let outcome = uploader.upload(&reader, total_size, &chunk).await;
                let _ = tx
                    .send(AttemptResult {
                        chunk,
                        attempt,
                        outcome,
                    })
                    .await;
            });
            self.in_flight += 1;
            tracing::debug!(
                "dispatched upload {} chunk @{} (attempt {})",
                file_id,
                chunk.offset,
                attempt
            );

            if was_pending {
                self.persist_state(file_id, UploadState::Uploading).await;
            }
        }
    }

    /// Queue every chunk in `chunks` for immediate eligibility.
    pub(super) fn enqueue_chunks(&mut self, chunks: &[ChunkDescriptor], priority: i32) {
        let now = Instant::now();
        for chunk in chunks {
            self.queue.push(QueuedChunk {
                eligible_at: now,
                priority,
                attempt: 1,
                chunk: *chunk,
            });
        }
    }

    pub(super) async fn persist_bitmap(&self, file_id: FileId, bytes: &[u8]) {
        if let Some(store) = &self.store {
            if let Err(e) = store.update_bitmap(file_id, bytes).await {
                tracing::warn!("durable progress update failed for upload {}: {}", file_id, e);
            }
        }
    }

    pub(super) async fn persist_state(&self, file_id: FileId, state: UploadState) {
        if let Some(store) = &self.store {
            if let Err(e) = store.set_state(file_id, state).await {
                tracing::warn!(
                    "state update ({}) failed for upload {}: {}",
                    state.as_str(),
                    file_id,
                    e
                );
            }
        }
    }
}
