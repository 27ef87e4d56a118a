//! CLI for the RUM upload manager.

mod commands;
pub(crate) mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rum_core::config;
use rum_core::store::UploadStore;
use std::path::PathBuf;

use commands::{run_add, run_cancel, run_checksum, run_remove, run_scheduler, run_status};

/// Top-level CLI for the RUM upload manager.
#[derive(Debug, Parser)]
#[command(name = "rum")]
#[command(about = "RUM: resumable chunked upload manager", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a file for upload.
    Add {
        /// Path of the local source file.
        path: PathBuf,

        /// Remote base URL chunks are PUT to (default: `default_remote` from the config).
        #[arg(long, value_name = "URL")]
        to: Option<String>,

        /// Chunk size in bytes (default: `chunk_size_bytes` from the config).
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<u64>,

        /// Scheduling priority; higher values upload first.
        #[arg(long, default_value = "0", value_name = "N")]
        priority: i32,

        /// Record the source's SHA-256 on the upload row.
        #[arg(long)]
        checksum: bool,
    },

    /// Upload queued files until none remain.
    Run {
        /// Admit up to N files concurrently (chunk parallelism is governed
        /// by `max_parallel` in the config).
        #[arg(long, default_value = "1", value_name = "N")]
        uploads: usize,
    },

    /// Show status of all uploads.
    Status,

    /// Cancel an upload by its ID.
    Cancel {
        /// Upload identifier.
        id: i64,
    },

    /// Remove an upload row by ID.
    Remove {
        /// Upload identifier.
        id: i64,

        /// Remove even if the upload is queued or mid-transfer.
        #[arg(long)]
        force: bool,
    },

    /// Compute SHA-256 of a file (e.g. before or after upload).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let store = UploadStore::open_default().await?;

        match cli.command {
            CliCommand::Add {
                path,
                to,
                chunk_size,
                priority,
                checksum,
            } => {
                run_add(&store, &cfg, &path, to.as_deref(), chunk_size, priority, checksum).await?
            }
            CliCommand::Run { uploads } => run_scheduler(&store, &cfg, uploads).await?,
            CliCommand::Status => run_status(&store).await?,
            CliCommand::Cancel { id } => run_cancel(&store, id).await?,
            CliCommand::Remove { id, force } => run_remove(&store, id, force).await?,
            CliCommand::Checksum { path } => run_checksum(&path).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
