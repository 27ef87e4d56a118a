//! `rum add <path>` – queue a file for upload.

use anyhow::{bail, Context, Result};
use rum_core::checksum;
use rum_core::config::RumConfig;
use rum_core::store::{NewUpload, UploadSettings, UploadStore};
use std::path::Path;

pub async fn run_add(
    store: &UploadStore,
    cfg: &RumConfig,
    path: &Path,
    to: Option<&str>,
    chunk_size: Option<u64>,
    priority: i32,
    record_checksum: bool,
) -> Result<()> {
    let Some(remote) = to.map(str::to_string).or_else(|| cfg.default_remote.clone()) else {
        bail!("no remote endpoint: pass --to URL or set default_remote in the config");
    };
    // Store an absolute path so `rum run` finds the file from any directory.
    let path = tokio::fs::canonicalize(path)
        .await
        .with_context(|| format!("resolve {}", path.display()))?;
    let total_size = tokio::fs::metadata(&path)
        .await
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    let chunk_size = chunk_size.unwrap_or(cfg.chunk_size_bytes);
    if chunk_size == 0 {
        bail!("--chunk-size must be positive");
    }

    let settings = UploadSettings { priority };
    let source_path = path.to_string_lossy();
    let id = store
        .add_upload(NewUpload {
            source_path: source_path.as_ref(),
            remote: &remote,
            total_size: total_size as i64,
            chunk_size: chunk_size as i64,
            chunk_count: total_size.div_ceil(chunk_size) as i64,
            settings: &settings,
        })
        .await?;

    if record_checksum {
        let digest = checksum::sha256_path(&path)?;
        store.set_digest(id, &digest).await?;
        tracing::debug!("recorded sha256 for upload {}: {}", id, digest);
    }
    println!(
        "Added upload {id}: {} -> {remote} ({total_size} bytes)",
        path.display()
    );
    Ok(())
}
