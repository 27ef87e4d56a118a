//! `rum cancel <id>` – cancel an upload. If `rum run` is active, signals it to
//! stop the transfer; otherwise just marks the row so `run` skips it.

use anyhow::{bail, Result};
use rum_core::store::{UploadState, UploadStore};

use crate::cli::control_socket;

pub async fn run_cancel(store: &UploadStore, id: i64) -> Result<()> {
    if store.get_upload(id).await?.is_none() {
        bail!("no upload with id {id}");
    }
    if let Ok(path) = rum_core::control::default_control_socket_path() {
        let _ = control_socket::send_cancel(&path, id).await;
    }
    store.set_state(id, UploadState::Cancelled).await?;
    println!("Cancelled upload {id}");
    Ok(())
}
