//! `rum run` – drive every resumable upload in the store to completion.

use anyhow::Result;
use rum_core::config::RumConfig;
use rum_core::manager::UploadManager;
use rum_core::store::UploadStore;
use rum_core::task::{TaskSnapshot, TaskStatus};
use rum_core::transport::HttpTransport;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::control_socket;

const PROGRESS_INTERVAL_MS: u64 = 500;

pub async fn run_scheduler(store: &UploadStore, cfg: &RumConfig, uploads: usize) -> Result<()> {
    let recovered = store.recover_interrupted().await?;
    if recovered > 0 {
        tracing::info!("recovered {} upload(s) from previous run", recovered);
    }

    // The transport carries a single base URL, so uploads are grouped by
    // remote and each group gets its own engine.
    let mut by_remote: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    for id in store.resumable_ids().await? {
        let Some(record) = store.get_upload(id).await? else {
            continue;
        };
        by_remote.entry(record.remote).or_default().push(id);
    }
    if by_remote.is_empty() {
        println!("No queued uploads.");
        return Ok(());
    }

    let mut run_count = 0u32;
    for (remote, ids) in by_remote {
        run_count += run_group(store, cfg, &remote, ids, uploads.max(1)).await?;
    }
    tracing::info!("run completed {} upload(s)", run_count);
    Ok(())
}

/// Drives the uploads in `ids` against one remote, keeping at most `window`
/// of them admitted at a time. Returns how many settled.
async fn run_group(
    store: &UploadStore,
    cfg: &RumConfig,
    remote: &str,
    ids: Vec<i64>,
    window: usize,
) -> Result<u32> {
    let mut transport = HttpTransport::new(remote, cfg.attempt_timeout());
    if let Some(headers) = &cfg.headers {
        for (name, value) in headers {
            transport = transport.with_header(name, value);
        }
    }
    let manager = UploadManager::builder(Arc::new(transport))
        .config(cfg.clone())
        .store(store.clone())
        .remote(remote)
        .spawn();

    let listener = rum_core::control::default_control_socket_path()
        .ok()
        .and_then(|path| {
            let handle = control_socket::spawn_control_listener(manager.clone(), &path).ok()?;
            tracing::debug!(path = %path.display(), "control socket listening");
            Some(handle)
        });

    let (done_tx, mut done_rx) = tokio::sync::mpsc::channel::<(i64, Option<TaskSnapshot>)>(16);
    let mut pending = ids.into_iter();
    let mut active = 0usize;
    let mut run_count = 0u32;
    let started = Instant::now();
    let mut session_start_bytes = None;
    let mut ticker = tokio::time::interval(Duration::from_millis(PROGRESS_INTERVAL_MS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        // Top up the admission window before waiting.
        while active < window {
            let Some(id) = pending.next() else { break };
            match admit(&manager, id).await {
                Ok(watcher) => {
                    active += 1;
                    let done_tx = done_tx.clone();
                    tokio::spawn(async move {
                        // Err means the notification sender was dropped: cancelled.
                        let outcome = watcher.await.ok();
                        let _ = done_tx.send((id, outcome)).await;
                    });
                }
                Err(e) => tracing::warn!("skipping upload {}: {}", id, e),
            }
        }
        if active == 0 {
            break;
        }

        tokio::select! {
            settled = done_rx.recv() => {
                let Some((id, outcome)) = settled else { break };
                active -= 1;
                run_count += 1;
                match outcome {
                    Some(snap) if snap.status == TaskStatus::Completed => {
                        println!("Upload {} complete: {}", id, snap.source_path.display());
                    }
                    Some(snap) => {
                        println!("Upload {} failed: {}", id, snap.source_path.display());
                    }
                    None => println!("Upload {} cancelled", id),
                }
            }
            _ = ticker.tick() => {
                if let Ok(snapshots) = manager.list().await {
                    print_progress(&snapshots, &mut session_start_bytes, started);
                }
            }
        }
    }

    if let Ok(snapshots) = manager.list().await {
        print_progress(&snapshots, &mut session_start_bytes, started);
    }
    if let Some(handle) = listener {
        handle.abort();
    }
    manager.shutdown().await?;
    Ok(run_count)
}

async fn admit(
    manager: &UploadManager,
    id: i64,
) -> Result<tokio::sync::oneshot::Receiver<TaskSnapshot>, rum_core::error::UploadError> {
    manager.resume_file(id).await?;
    manager.on_completion(id).await
}

/// Prints one aggregate progress line. The rate counts only bytes moved this
/// session, so resumed uploads do not inflate it.
fn print_progress(
    snapshots: &[TaskSnapshot],
    session_start_bytes: &mut Option<u64>,
    started: Instant,
) {
    let bytes_done: u64 = snapshots.iter().map(|s| s.bytes_finished).sum();
    let total_bytes: u64 = snapshots.iter().map(|s| s.total_size).sum();
    if total_bytes == 0 {
        return;
    }
    let base = *session_start_bytes.get_or_insert(bytes_done);
    let elapsed = started.elapsed().as_secs_f64();
    let rate = if elapsed > 0.0 {
        bytes_done.saturating_sub(base) as f64 / elapsed
    } else {
        0.0
    };
    let done_mib = bytes_done as f64 / 1_048_576.0;
    let total_mib = total_bytes as f64 / 1_048_576.0;
    let pct = 100.0 * bytes_done as f64 / total_bytes as f64;
    let eta = if rate > 0.0 && total_bytes > bytes_done {
        format!("{:.0}s", (total_bytes - bytes_done) as f64 / rate)
    } else {
        "?".to_string()
    };
    println!(
        "\r  {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ETA {}  ",
        done_mib,
        total_mib,
        pct,
        rate / 1_048_576.0,
        eta
    );
}
