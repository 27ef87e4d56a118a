//! `rum checksum <path>` – print the SHA-256 digest of a local file.

use anyhow::Result;
use rum_core::checksum;
use std::path::Path;

/// Computes and prints the digest in `sha256sum` output format.
pub async fn run_checksum(path: &Path) -> Result<()> {
    let digest = checksum::sha256_path(path)?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
