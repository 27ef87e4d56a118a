//! `rum remove <id>` – delete an upload record from the store.

use anyhow::{bail, Result};
use rum_core::store::{UploadState, UploadStore};

/// Removes the row. Active uploads are refused unless `force`, so a running
/// `rum run` is not left writing progress for a row that no longer exists.
pub async fn run_remove(store: &UploadStore, id: i64, force: bool) -> Result<()> {
    let Some(record) = store.get_upload(id).await? else {
        bail!("no upload with id {id}");
    };
    if !force && matches!(record.state, UploadState::Queued | UploadState::Uploading) {
        bail!(
            "upload {id} is {}; cancel it first or pass --force",
            record.state.as_str()
        );
    }
    store.remove_upload(id).await?;
    println!("Removed upload {id}");
    Ok(())
}
