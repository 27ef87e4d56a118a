//! Control socket: server (during `rum run`) and client (for `rum cancel`).
//! Protocol: one line per command: "cancel <id>".

use anyhow::Result;
use rum_core::control::{parse_control_line, ControlRequest};
use rum_core::manager::UploadManager;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;

/// Spawns a task that listens on `path` and forwards each "cancel <id>" line
/// to the manager. Ignores malformed lines.
pub fn spawn_control_listener(
    manager: UploadManager,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let handle = tokio::spawn(async move {
        let _ = std::fs::remove_file(&path);
        let listener = match UnixListener::bind(&path) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(path = %path.display(), "control socket bind: {}", e);
                return;
            }
        };
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let manager = manager.clone();
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            let Some(ControlRequest::Cancel(id)) = parse_control_line(&line)
                            else {
                                continue;
                            };
                            match manager.cancel(id).await {
                                Ok(true) => tracing::info!("cancelled upload {} via control socket", id),
                                Ok(false) => tracing::debug!("upload {} already settled", id),
                                Err(e) => tracing::debug!("cancel {}: {}", id, e),
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Sends "cancel <file_id>\n" to the control socket. No-op if the path does not exist.
pub async fn send_cancel(socket_path: &Path, file_id: i64) -> Result<()> {
    if !socket_path.exists() {
        return Ok(());
    }
    let mut stream = tokio::net::UnixStream::connect(socket_path).await?;
    let msg = ControlRequest::Cancel(file_id).to_line();
    tokio::io::AsyncWriteExt::write_all(&mut stream, msg.as_bytes()).await?;
    Ok(())
}
