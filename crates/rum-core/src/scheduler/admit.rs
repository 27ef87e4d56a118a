//! Command handling: admission, resumption, queries, cancellation.

use std::path::PathBuf;

use tokio::sync::oneshot;

use crate::chunker::{ChunkBitmap, FileId};
use crate::error::UploadError;
use crate::reader::ChunkReader;
use crate::store::{NewUpload, UploadSettings, UploadState};
use crate::task::{FileUploadTask, TaskSnapshot, TaskStatus};

use super::apply::upload_state_for;
use super::coordinator::{Command, Coordinator, Entry, EnqueueSpec};

fn store_err(e: anyhow::Error) -> UploadError {
    UploadError::Store(e.to_string())
}

impl Coordinator {
    pub(super) async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Enqueue { spec, reply } => {
                let result = if self.draining {
                    Err(UploadError::Shutdown)
                } else {
                    self.admit_new(spec).await
                };
                let _ = reply.send(result);
            }
            Command::Resume { file_id, reply } => {
                let result = if self.draining {
                    Err(UploadError::Shutdown)
                } else {
                    self.resume_stored(file_id).await
                };
                let _ = reply.send(result);
            }
            Command::Status { file_id, reply } => {
                let _ = reply.send(self.status_of(file_id));
            }
            Command::List { reply } => {
                let _ = reply.send(self.list_snapshots());
            }
            Command::Cancel { file_id, reply } => {
                let result = self.cancel_task(file_id).await;
                let _ = reply.send(result);
            }
            Command::Watch { file_id, reply } => {
                let _ = reply.send(self.watch(file_id));
            }
            Command::Shutdown { reply } => {
                tracing::info!(
                    "shutdown requested; draining {} in-flight transfers",
                    self.in_flight
                );
                self.draining = true;
                self.shutdown_replies.push(reply);
            }
        }
    }

    /// Split, persist, and queue a fresh upload.
    async fn admit_new(&mut self, spec: EnqueueSpec) -> Result<FileId, UploadError> {
        let reader = ChunkReader::open(&spec.path)?;
        let total_size = reader.len()?;
        if let Some(expected) = spec.expected_size {
            if expected != total_size {
                return Err(UploadError::InvalidArgument(format!(
                    "{} is {} bytes, caller expected {}",
                    spec.path.display(),
                    total_size,
                    expected
                )));
            }
        }
        let chunk_size = spec.chunk_size.unwrap_or(self.default_chunk_size);
        if chunk_size == 0 {
            return Err(UploadError::InvalidArgument(
                "chunk_size must be positive".to_string(),
            ));
        }

        let file_id = match &self.store {
            Some(store) => {
                let settings = UploadSettings {
                    priority: spec.priority,
                };
                let source_path = spec.path.to_string_lossy();
                store
                    .add_upload(NewUpload {
                        source_path: source_path.as_ref(),
                        remote: &self.remote,
                        total_size: total_size as i64,
                        chunk_size: chunk_size as i64,
                        chunk_count: total_size.div_ceil(chunk_size) as i64,
                        settings: &settings,
                    })
                    .await
                    .map_err(store_err)?
            }
            None => {
                let id = self.next_local_id;
                self.next_local_id += 1;
                id
            }
        };

        let task = FileUploadTask::new(
            file_id,
            spec.path.clone(),
            total_size,
            chunk_size,
            spec.priority,
        )?;
        tracing::info!(
            "upload {} admitted: {} ({} bytes, {} chunks)",
            file_id,
            spec.path.display(),
            total_size,
            task.chunk_count()
        );
        self.install(task, reader).await
    }

    /// Rebuild a task from its persisted row and queue only what is still
    /// unfinished. Safe to call again for an id that is already live.
    async fn resume_stored(&mut self, file_id: FileId) -> Result<FileId, UploadError> {
        if self.live.contains_key(&file_id) || self.archived.contains_key(&file_id) {
            return Ok(file_id);
        }
        let Some(store) = self.store.clone() else {
            return Err(UploadError::InvalidArgument(
                "resumption requires a configured store".to_string(),
            ));
        };

        let record = store
            .get_upload(file_id)
            .await
            .map_err(store_err)?
            .ok_or(UploadError::NotFound(file_id))?;
        if !record.state.is_resumable() && record.state != UploadState::Completed {
            return Err(UploadError::InvalidArgument(format!(
                "upload {} is {}; enqueue it again to retry",
                file_id,
                record.state.as_str()
            )));
        }

        let path = PathBuf::from(&record.source_path);
        let reader = ChunkReader::open(&path)?;
        let on_disk = reader.len()?;
        if on_disk != record.total_size as u64 {
            return Err(UploadError::InvalidArgument(format!(
                "source file {} is {} bytes, the enqueued upload was {}",
                record.source_path, on_disk, record.total_size
            )));
        }

        let chunk_count = record.chunk_count.max(0) as usize;
        let bitmap = ChunkBitmap::from_bytes(&record.finished_bitmap, chunk_count);
        let task = FileUploadTask::resume(
            file_id,
            path,
            record.total_size as u64,
            record.chunk_size as u64,
            record.settings.priority,
            &bitmap,
        )?;
        tracing::info!(
            "upload {} resumed: {}/{} chunks already acknowledged",
            file_id,
            task.snapshot().chunks_finished,
            task.chunk_count()
        );
        self.install(task, reader).await
    }

    /// Register a task: already-terminal tasks (empty file, fully-finished
    /// bitmap) settle straight into the archive, everything else goes live
    /// with its unfinished chunks queued.
    async fn install(
        &mut self,
        task: FileUploadTask,
        reader: ChunkReader,
    ) -> Result<FileId, UploadError> {
        let file_id = task.id();
        if task.status().is_terminal() {
            let snapshot = task.snapshot();
            self.persist_state(file_id, upload_state_for(snapshot.status))
                .await;
            self.archived.insert(file_id, snapshot);
            return Ok(file_id);
        }

        let pending = task.unfinished();
        let priority = task.priority();
        self.enqueue_chunks(&pending, priority);
        self.live.insert(
            file_id,
            Entry {
                task,
                reader,
                watchers: Vec::new(),
            },
        );
        Ok(file_id)
    }

    fn status_of(&self, file_id: FileId) -> Result<TaskSnapshot, UploadError> {
        if let Some(entry) = self.live.get(&file_id) {
            return Ok(entry.task.snapshot());
        }
        self.archived
            .get(&file_id)
            .cloned()
            .ok_or(UploadError::NotFound(file_id))
    }

    fn list_snapshots(&self) -> Vec<TaskSnapshot> {
        let mut out: Vec<TaskSnapshot> = self
            .live
            .values()
            .map(|e| e.task.snapshot())
            .chain(self.archived.values().cloned())
            .collect();
        out.sort_by_key(|s| s.file_id);
        out
    }

    /// Cancel a live task. `Ok(false)` means the task had already reached a
    /// terminal status, so there was nothing to stop.
    async fn cancel_task(&mut self, file_id: FileId) -> Result<bool, UploadError> {
        if let Some(entry) = self.live.get_mut(&file_id) {
            entry.task.cancel();
            let snapshot = entry.task.snapshot();
            self.settle(file_id, snapshot).await;
            return Ok(true);
        }
        if self.archived.contains_key(&file_id) {
            return Ok(false);
        }
        Err(UploadError::NotFound(file_id))
    }

    /// Hand out a one-shot completion notification. Fires with the terminal
    /// snapshot for Completed/Failed; on cancellation the sender is dropped
    /// and the receiver resolves with a channel error instead.
    fn watch(
        &mut self,
        file_id: FileId,
    ) -> Result<oneshot::Receiver<TaskSnapshot>, UploadError> {
        let (tx, rx) = oneshot::channel();
        if let Some(entry) = self.live.get_mut(&file_id) {
            entry.watchers.push(tx);
            return Ok(rx);
        }
        match self.archived.get(&file_id) {
            Some(snapshot) => {
                match snapshot.status {
                    TaskStatus::Completed | TaskStatus::Failed => {
                        let _ = tx.send(snapshot.clone());
                    }
                    _ => {}
                }
                Ok(rx)
            }
            None => Err(UploadError::NotFound(file_id)),
        }
    }
}
