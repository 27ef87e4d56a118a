// Shared between integration test binaries; not every binary uses every
// helper.
#![allow(dead_code)]

pub mod scripted;
pub mod upload_server;
