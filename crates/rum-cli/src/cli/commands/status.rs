//! `rum status` – show status of all uploads.

use anyhow::Result;
use rum_core::store::UploadStore;

pub async fn run_status(store: &UploadStore) -> Result<()> {
    let uploads = store.list_uploads().await?;
    if uploads.is_empty() {
        println!("No uploads in database.");
    } else {
        println!(
            "{:<6} {:<10} {:<10} {:<12} {}",
            "ID", "STATE", "CHUNKS", "SIZE", "SOURCE"
        );
        for u in uploads {
            println!(
                "{:<6} {:<10} {:<10} {:<12} {}",
                u.id,
                u.state.as_str(),
                format!("{}/{}", u.chunks_finished, u.chunk_count),
                u.total_size,
                u.source_path
            );
        }
    }
    Ok(())
}
