//! Public facade over the scheduler coordinator.
//!
//! An `UploadManager` is a cheap clonable handle to a spawned coordinator
//! task. Several handles (or none, for a fire-and-forget engine) may
//! coexist; the coordinator drains in-flight transfers and stops once every
//! handle is dropped or `shutdown` is called. Managers are independent:
//! two instances never share queue or task state.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::chunker::FileId;
use crate::config::RumConfig;
use crate::error::UploadError;
use crate::scheduler::{Command, Coordinator, EnqueueSpec};
use crate::store::UploadStore;
use crate::task::TaskSnapshot;
use crate::transport::ChunkTransport;

/// Per-call knobs for [`UploadManager::enqueue_file`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Chunk size override; the configured default applies when `None`.
    pub chunk_size: Option<u64>,
    /// Scheduling priority; higher values are dispatched first.
    pub priority: i32,
    /// Fail admission unless the file is exactly this many bytes.
    pub expected_size: Option<u64>,
}

/// Builds an [`UploadManager`] and spawns its coordinator.
pub struct UploadManagerBuilder {
    config: RumConfig,
    transport: Arc<dyn ChunkTransport>,
    store: Option<UploadStore>,
    remote: String,
}

impl UploadManagerBuilder {
    pub fn new(transport: Arc<dyn ChunkTransport>) -> Self {
        Self {
            config: RumConfig::default(),
            transport,
            store: None,
            remote: String::new(),
        }
    }

    pub fn config(mut self, config: RumConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist per-chunk completion state so uploads survive a restart.
    pub fn store(mut self, store: UploadStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Label recorded in the store for where chunks go (the transport
    /// already knows its own endpoint).
    pub fn remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Spawn the coordinator onto the current runtime and return a handle.
    pub fn spawn(self) -> UploadManager {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let coordinator =
            Coordinator::new(&self.config, self.transport, self.store, self.remote, cmd_rx);
        tokio::spawn(coordinator.run());
        UploadManager { cmd_tx }
    }
}

/// Handle to a running upload engine.
#[derive(Clone)]
pub struct UploadManager {
    cmd_tx: mpsc::Sender<Command>,
}

impl UploadManager {
    pub fn builder(transport: Arc<dyn ChunkTransport>) -> UploadManagerBuilder {
        UploadManagerBuilder::new(transport)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, UploadError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| UploadError::Shutdown)?;
        rx.await.map_err(|_| UploadError::Shutdown)
    }

    /// Split `path` into chunks, persist the plan (when a store is
    /// configured), and start uploading. Returns the id used by every other
    /// operation. An empty file completes immediately.
    pub async fn enqueue_file(
        &self,
        path: impl AsRef<Path>,
        opts: EnqueueOptions,
    ) -> Result<FileId, UploadError> {
        let spec = EnqueueSpec {
            path: path.as_ref().to_path_buf(),
            expected_size: opts.expected_size,
            chunk_size: opts.chunk_size,
            priority: opts.priority,
        };
        self.request(|reply| Command::Enqueue { spec, reply })
            .await?
    }

    /// Re-admit a previously persisted upload; only chunks whose acks were
    /// never recorded are queued again.
    pub async fn resume_file(&self, file_id: FileId) -> Result<FileId, UploadError> {
        self.request(|reply| Command::Resume { file_id, reply })
            .await?
    }

    /// Point-in-time progress/status for one upload. Settled uploads keep
    /// answering from the archive.
    pub async fn status(&self, file_id: FileId) -> Result<TaskSnapshot, UploadError> {
        self.request(|reply| Command::Status { file_id, reply })
            .await?
    }

    /// Snapshots of every upload this engine has seen, ordered by id.
    pub async fn list(&self) -> Result<Vec<TaskSnapshot>, UploadError> {
        self.request(|reply| Command::List { reply }).await
    }

    /// Stop work on an upload: queued chunks are dropped and in-flight
    /// results discarded. `Ok(false)` means the upload had already settled.
    pub async fn cancel(&self, file_id: FileId) -> Result<bool, UploadError> {
        self.request(|reply| Command::Cancel { file_id, reply })
            .await?
    }

    /// One-shot completion notification: resolves with the terminal
    /// snapshot when the upload Completes or Fails, exactly once. If the
    /// upload is cancelled instead, the sender is dropped and the receiver
    /// resolves with a [`oneshot::error::RecvError`].
    pub async fn on_completion(
        &self,
        file_id: FileId,
    ) -> Result<oneshot::Receiver<TaskSnapshot>, UploadError> {
        self.request(|reply| Command::Watch { file_id, reply })
            .await?
    }

    /// Graceful shutdown: stop admissions and dispatch, wait for in-flight
    /// transfers to report, persist what they achieved, then stop. Ok even
    /// if the coordinator is already gone.
    pub async fn shutdown(&self) -> Result<(), UploadError> {
        match self.request(|reply| Command::Shutdown { reply }).await {
            Ok(()) | Err(UploadError::Shutdown) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
