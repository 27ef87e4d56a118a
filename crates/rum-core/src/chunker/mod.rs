//! Chunk math and split planning.
//!
//! Splits a source file into fixed-size chunks, computes Content-Range
//! bounds for each, and provides a completion bitmap for resume
//! (serialized to a DB BLOB).

mod bitmap;
mod split;

pub use bitmap::ChunkBitmap;
pub use split::{split_into_chunks, ChunkDescriptor, FileId};
