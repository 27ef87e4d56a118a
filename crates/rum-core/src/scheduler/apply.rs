//! Attempt result application: marks, retries, and task settlement.

use tokio::time::Instant;

use crate::chunker::{ChunkDescriptor, FileId};
use crate::retry::{classify, RetryDecision};
use crate::store::UploadState;
use crate::task::{TaskSnapshot, TaskStatus};
use crate::transport::TransferError;

use super::coordinator::{AttemptResult, Coordinator};
use super::queue::QueuedChunk;

pub(super) fn upload_state_for(status: TaskStatus) -> UploadState {
    match status {
        TaskStatus::Pending => UploadState::Queued,
        TaskStatus::InProgress => UploadState::Uploading,
        TaskStatus::Completed => UploadState::Completed,
        TaskStatus::Failed => UploadState::Failed,
        TaskStatus::Cancelled => UploadState::Cancelled,
    }
}

impl Coordinator {
    /// Apply one worker result. Results for tasks that are no longer live
    /// (cancelled while the attempt was in flight) are discarded.
    pub(super) async fn apply_result(&mut self, result: AttemptResult) {
        let AttemptResult {
            chunk,
            attempt,
            outcome,
        } = result;
        if !self.live.contains_key(&chunk.file_id) {
            tracing::debug!(
                "discarding result for upload {} chunk @{} (task gone)",
                chunk.file_id,
                chunk.offset
            );
            return;
        }
        match outcome {
            Ok(_) => self.apply_success(chunk).await,
            Err(e) => self.apply_failure(chunk, attempt, e).await,
        }
    }

    async fn apply_success(&mut self, chunk: ChunkDescriptor) {
        let file_id = chunk.file_id;
        let (snapshot, bitmap_bytes) = {
            let Some(entry) = self.live.get_mut(&file_id) else {
                return;
            };
            if let Err(e) = entry.task.mark_chunk_finished(chunk.offset) {
                tracing::warn!("ack for upload {} rejected: {}", file_id, e);
                return;
            }
            let bytes = entry.task.bitmap().to_bytes(entry.task.chunk_count());
            (entry.task.snapshot(), bytes)
        };

        tracing::debug!(
            "upload {} chunk @{} acknowledged ({}/{} chunks)",
            file_id,
            chunk.offset,
            snapshot.chunks_finished,
            snapshot.chunk_count
        );
        // Durable progress: the bitmap hits the store after every ack, so a
        // crash at any point resumes without re-uploading finished chunks.
        self.persist_bitmap(file_id, &bitmap_bytes).await;

        if snapshot.status.is_terminal() {
            self.settle(file_id, snapshot).await;
        }
    }

    async fn apply_failure(&mut self, chunk: ChunkDescriptor, attempt: u32, err: TransferError) {
        let file_id = chunk.file_id;
        let kind = classify(&err);
        match self.policy.decide(attempt, kind) {
            RetryDecision::RetryAfter(delay) => {
                let Some(entry) = self.live.get(&file_id) else {
                    return;
                };
                tracing::debug!(
                    "upload {} chunk @{} attempt {} failed ({}); retrying in {:?}",
                    file_id,
                    chunk.offset,
                    attempt,
                    err,
                    delay
                );
                self.queue.push(QueuedChunk {
                    eligible_at: Instant::now() + delay,
                    priority: entry.task.priority(),
                    attempt: attempt + 1,
                    chunk,
                });
            }
            RetryDecision::NoRetry => {
                tracing::warn!(
                    "upload {} chunk @{} failed permanently after {} attempts: {}",
                    file_id,
                    chunk.offset,
                    attempt,
                    err
                );
                let snapshot = {
                    let Some(entry) = self.live.get_mut(&file_id) else {
                        return;
                    };
                    if let Err(e) = entry.task.mark_chunk_failed(chunk.offset) {
                        tracing::warn!("failure mark for upload {} rejected: {}", file_id, e);
                        return;
                    }
                    entry.task.snapshot()
                };
                if snapshot.status.is_terminal() {
                    self.settle(file_id, snapshot).await;
                }
            }
        }
    }

    /// Retire a task that reached a terminal status: drop it from the live
    /// set and queue, persist the final state, notify watchers (completion
    /// and failure only), and archive the snapshot for later status queries.
    pub(super) async fn settle(&mut self, file_id: FileId, snapshot: TaskSnapshot) {
        if !snapshot.status.is_terminal() {
            return;
        }
        let Some(entry) = self.live.remove(&file_id) else {
            return;
        };
        self.queue.remove_file(file_id);
        self.persist_state(file_id, upload_state_for(snapshot.status))
            .await;

        match snapshot.status {
            TaskStatus::Completed | TaskStatus::Failed => {
                for watcher in entry.watchers {
                    let _ = watcher.send(snapshot.clone());
                }
            }
            // Cancellation drops the notifiers; receivers observe closure.
            _ => {}
        }

        tracing::info!(
            "upload {} {} ({}/{} chunks, {} bytes)",
            file_id,
            snapshot.status.as_str(),
            snapshot.chunks_finished,
            snapshot.chunk_count,
            snapshot.bytes_finished
        );
        self.archived.insert(file_id, snapshot);
    }
}
