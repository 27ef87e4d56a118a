//! Per-file upload task state.
//!
//! A `FileUploadTask` owns the chunk plan and lifecycle status for one file.
//! It is pure state: all mutation happens through the scheduler coordinator,
//! which serializes calls, so none of this needs interior locking.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::chunker::{split_into_chunks, ChunkBitmap, ChunkDescriptor, FileId};
use crate::error::UploadError;

/// Lifecycle of one upload task. Transitions are one-way; a terminal task
/// is never resurrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Admitted, no chunk dispatched yet.
    Pending,
    /// At least one chunk has been handed to a worker.
    InProgress,
    /// Every chunk acknowledged by the remote.
    Completed,
    /// Cancelled by the caller; unfinished chunks were abandoned.
    Cancelled,
    /// A chunk exhausted its retry budget and no retriable work remains.
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Failed => "failed",
        }
    }
}

/// Point-in-time view of a task, safe to hand out across the channel
/// boundary without exposing the live state.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub file_id: FileId,
    pub source_path: PathBuf,
    pub status: TaskStatus,
    pub total_size: u64,
    pub bytes_finished: u64,
    pub chunk_count: usize,
    pub chunks_finished: usize,
    pub progress: f64,
}

/// Upload state for one file: the chunk plan plus lifecycle status.
#[derive(Debug, Clone)]
pub struct FileUploadTask {
    id: FileId,
    source_path: PathBuf,
    total_size: u64,
    priority: i32,
    chunks: Vec<ChunkDescriptor>,
    failed_offsets: BTreeSet<u64>,
    status: TaskStatus,
}

impl FileUploadTask {
    /// Plan a fresh upload. An empty file has no chunks and completes
    /// immediately on admission.
    pub fn new(
        id: FileId,
        source_path: PathBuf,
        total_size: u64,
        chunk_size: u64,
        priority: i32,
    ) -> Result<Self, UploadError> {
        let chunks = split_into_chunks(id, total_size, chunk_size)?;
        let status = if chunks.is_empty() {
            TaskStatus::Completed
        } else {
            TaskStatus::Pending
        };
        Ok(Self {
            id,
            source_path,
            total_size,
            priority,
            chunks,
            failed_offsets: BTreeSet::new(),
            status,
        })
    }

    /// Rebuild a task from persisted completion state. Chunks marked done in
    /// `bitmap` keep their finished flag; a fully-finished bitmap yields a
    /// task that is already Completed. Failed chunks are not persisted, so a
    /// resumed task starts every unfinished chunk with a fresh retry budget.
    pub fn resume(
        id: FileId,
        source_path: PathBuf,
        total_size: u64,
        chunk_size: u64,
        priority: i32,
        bitmap: &ChunkBitmap,
    ) -> Result<Self, UploadError> {
        let mut task = Self::new(id, source_path, total_size, chunk_size, priority)?;
        for (index, chunk) in task.chunks.iter_mut().enumerate() {
            if bitmap.is_completed(index) {
                chunk.finished = true;
            }
        }
        if !task.chunks.is_empty() && task.chunks.iter().all(|c| c.finished) {
            task.status = TaskStatus::Completed;
        }
        Ok(task)
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Chunks the remote has not acknowledged yet, in offset order.
    /// Includes chunks that later exhaust their budget; the scheduler
    /// stops re-enqueueing those itself.
    pub fn unfinished(&self) -> Vec<ChunkDescriptor> {
        self.chunks.iter().filter(|c| !c.finished).copied().collect()
    }

    /// Note that the first chunk was handed to a worker.
    pub fn note_started(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::InProgress;
        }
    }

    /// Record a remote ack for the chunk at `offset`. Returns `true` when
    /// this mark completed the whole file. Idempotent per chunk; a no-op
    /// returning `false` once the task is terminal.
    pub fn mark_chunk_finished(&mut self, offset: u64) -> Result<bool, UploadError> {
        if self.status.is_terminal() {
            return Ok(false);
        }
        let index = self.chunk_index(offset)?;
        self.chunks[index].finished = true;
        Ok(self.resolve() == Some(TaskStatus::Completed))
    }

    /// Record that the chunk at `offset` exhausted its retry budget.
    /// Returns `true` when this leaves the task with no retriable work,
    /// transitioning it to Failed. A no-op returning `false` once terminal.
    pub fn mark_chunk_failed(&mut self, offset: u64) -> Result<bool, UploadError> {
        if self.status.is_terminal() {
            return Ok(false);
        }
        self.chunk_index(offset)?;
        self.failed_offsets.insert(offset);
        Ok(self.resolve() == Some(TaskStatus::Failed))
    }

    /// Cancel the task. Returns `false` (no-op) when already terminal.
    pub fn cancel(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Cancelled;
        true
    }

    pub fn bytes_finished(&self) -> u64 {
        self.chunks.iter().filter(|c| c.finished).map(|c| c.size).sum()
    }

    /// Fraction of bytes acknowledged, in `[0.0, 1.0]`. An empty file is
    /// complete by definition.
    pub fn progress(&self) -> f64 {
        if self.total_size == 0 {
            1.0
        } else {
            self.bytes_finished() as f64 / self.total_size as f64
        }
    }

    /// Completion bitmap in chunk-index order, for persistence.
    pub fn bitmap(&self) -> ChunkBitmap {
        let mut bitmap = ChunkBitmap::new(self.chunks.len());
        for (index, chunk) in self.chunks.iter().enumerate() {
            if chunk.finished {
                bitmap.set_completed(index);
            }
        }
        bitmap
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            file_id: self.id,
            source_path: self.source_path.clone(),
            status: self.status,
            total_size: self.total_size,
            bytes_finished: self.bytes_finished(),
            chunk_count: self.chunks.len(),
            chunks_finished: self.chunks.iter().filter(|c| c.finished).count(),
            progress: self.progress(),
        }
    }

    fn chunk_index(&self, offset: u64) -> Result<usize, UploadError> {
        self.chunks
            .binary_search_by_key(&offset, |c| c.offset)
            .map_err(|_| {
                UploadError::InvalidArgument(format!(
                    "no chunk at offset {} in upload {}",
                    offset, self.id
                ))
            })
    }

    /// Settle the task if every chunk is accounted for: Completed when all
    /// finished, Failed when the rest have exhausted their budgets. A chunk
    /// that failed earlier but succeeded on a late in-flight attempt counts
    /// as finished.
    fn resolve(&mut self) -> Option<TaskStatus> {
        let all_settled = self
            .chunks
            .iter()
            .all(|c| c.finished || self.failed_offsets.contains(&c.offset));
        if !all_settled {
            return None;
        }
        if self.chunks.iter().all(|c| c.finished) {
            self.status = TaskStatus::Completed;
        } else {
            self.status = TaskStatus::Failed;
        }
        Some(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_250_by_100() -> FileUploadTask {
        FileUploadTask::new(1, PathBuf::from("/tmp/file.bin"), 250, 100, 0).unwrap()
    }

    #[test]
    fn completes_only_when_every_chunk_finishes() {
        let mut task = task_250_by_100();
        assert_eq!(task.status(), TaskStatus::Pending);
        task.note_started();
        assert_eq!(task.status(), TaskStatus::InProgress);

        assert!(!task.mark_chunk_finished(0).unwrap());
        assert!(!task.mark_chunk_finished(200).unwrap());
        assert_eq!(task.status(), TaskStatus::InProgress);
        assert!((task.progress() - 0.6).abs() < 1e-9);

        assert!(task.mark_chunk_finished(100).unwrap());
        assert_eq!(task.status(), TaskStatus::Completed);
        assert!((task.progress() - 1.0).abs() < 1e-9);
        assert_eq!(task.bytes_finished(), 250);
    }

    #[test]
    fn duplicate_finish_is_idempotent() {
        let mut task = task_250_by_100();
        assert!(!task.mark_chunk_finished(0).unwrap());
        assert!(!task.mark_chunk_finished(0).unwrap());
        assert_eq!(task.snapshot().chunks_finished, 1);
        assert_eq!(task.bytes_finished(), 100);
    }

    #[test]
    fn unknown_offset_rejected() {
        let mut task = task_250_by_100();
        let err = task.mark_chunk_finished(150).unwrap_err();
        assert!(matches!(err, UploadError::InvalidArgument(_)));
    }

    #[test]
    fn exhausted_chunk_fails_task_once_rest_settles() {
        let mut task = task_250_by_100();
        task.note_started();
        assert!(!task.mark_chunk_finished(0).unwrap());
        // Budget exhausted on the middle chunk while the last is in flight:
        // the task is not settled yet.
        assert!(!task.mark_chunk_failed(100).unwrap());
        assert_eq!(task.status(), TaskStatus::InProgress);

        // The late success settles the task as Failed, not Completed.
        assert!(!task.mark_chunk_finished(200).unwrap());
        assert_eq!(task.status(), TaskStatus::Failed);
    }

    #[test]
    fn failure_with_no_outstanding_work_fails_immediately() {
        let mut task = task_250_by_100();
        task.mark_chunk_finished(0).unwrap();
        task.mark_chunk_finished(200).unwrap();
        assert!(task.mark_chunk_failed(100).unwrap());
        assert_eq!(task.status(), TaskStatus::Failed);

        // Terminal; a stray late result cannot resurrect the task.
        assert!(!task.mark_chunk_finished(100).unwrap());
        assert_eq!(task.status(), TaskStatus::Failed);
    }

    #[test]
    fn cancel_is_terminal_and_sticky() {
        let mut task = task_250_by_100();
        task.mark_chunk_finished(0).unwrap();
        assert!(task.cancel());
        assert_eq!(task.status(), TaskStatus::Cancelled);

        // Late results against a cancelled task are discarded.
        assert!(!task.mark_chunk_finished(100).unwrap());
        assert!(!task.mark_chunk_failed(200).unwrap());
        assert_eq!(task.status(), TaskStatus::Cancelled);
        assert!(!task.cancel());
    }

    #[test]
    fn cancel_after_completion_is_a_no_op() {
        let mut task = FileUploadTask::new(1, PathBuf::from("/tmp/x"), 10, 10, 0).unwrap();
        assert!(task.mark_chunk_finished(0).unwrap());
        assert!(!task.cancel());
        assert_eq!(task.status(), TaskStatus::Completed);
    }

    #[test]
    fn empty_file_completes_on_admission() {
        let task = FileUploadTask::new(1, PathBuf::from("/tmp/empty"), 0, 4096, 0).unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.chunk_count(), 0);
        assert!((task.progress() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn resume_restores_finished_flags() {
        let mut original = task_250_by_100();
        original.mark_chunk_finished(0).unwrap();
        original.mark_chunk_finished(200).unwrap();
        let bitmap = original.bitmap();

        let resumed =
            FileUploadTask::resume(1, PathBuf::from("/tmp/file.bin"), 250, 100, 0, &bitmap)
                .unwrap();
        assert_eq!(resumed.status(), TaskStatus::Pending);
        assert_eq!(resumed.bytes_finished(), 150);
        let pending = resumed.unfinished();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].offset, 100);
    }

    #[test]
    fn resume_with_full_bitmap_is_already_complete() {
        let mut original = task_250_by_100();
        for offset in [0, 100, 200] {
            original.mark_chunk_finished(offset).unwrap();
        }
        let resumed = FileUploadTask::resume(
            1,
            PathBuf::from("/tmp/file.bin"),
            250,
            100,
            0,
            &original.bitmap(),
        )
        .unwrap();
        assert_eq!(resumed.status(), TaskStatus::Completed);
        assert!(resumed.unfinished().is_empty());
    }
}
