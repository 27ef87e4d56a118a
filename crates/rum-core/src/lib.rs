pub mod config;
pub mod logging;

pub mod checksum;
pub mod chunker;
pub mod control;
pub mod error;
pub mod manager;
pub mod reader;
pub mod retry;
mod scheduler;
pub mod store;
pub mod task;
pub mod transport;
pub mod uploader;
