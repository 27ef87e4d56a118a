//! Chunk descriptor type and split planning.

use crate::error::UploadError;

/// Identifier of one upload (unique per session; the store hands these out).
pub type FileId = i64;

/// One chunk of one file: the byte range `[offset, offset + size)` plus its
/// remote completion flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// Owning upload.
    pub file_id: FileId,
    /// Start offset within the file (inclusive).
    pub offset: u64,
    /// Byte length of this chunk. Fixed at creation.
    pub size: u64,
    /// True once the remote endpoint has acknowledged exactly this range.
    pub finished: bool,
}

impl ChunkDescriptor {
    /// A fresh, unfinished chunk.
    pub fn new(file_id: FileId, offset: u64, size: u64) -> Self {
        Self {
            file_id,
            offset,
            size,
            finished: false,
        }
    }

    /// End offset (exclusive).
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }
}

/// Splits a file of `total_size` bytes into chunks of `chunk_size` bytes.
///
/// Produces `ceil(total_size / chunk_size)` descriptors whose ranges tile
/// `[0, total_size)` exactly; the last chunk carries the remainder. A zero
/// `total_size` yields an empty plan. Pure and deterministic.
///
/// Fails with `InvalidArgument` when `chunk_size` is zero.
pub fn split_into_chunks(
    file_id: FileId,
    total_size: u64,
    chunk_size: u64,
) -> Result<Vec<ChunkDescriptor>, UploadError> {
    if chunk_size == 0 {
        return Err(UploadError::InvalidArgument(
            "chunk_size must be positive".to_string(),
        ));
    }

    let count = total_size.div_ceil(chunk_size);
    let mut out = Vec::with_capacity(count as usize);
    let mut offset = 0u64;

    for _ in 0..count {
        let size = chunk_size.min(total_size - offset);
        out.push(ChunkDescriptor {
            file_id,
            offset,
            size,
            finished: false,
        });
        offset += size;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_even() {
        let chunks = split_into_chunks(1, 1000, 250).unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].offset, 0);
        assert_eq!(chunks[0].size, 250);
        assert_eq!(chunks[3].offset, 750);
        assert_eq!(chunks[3].size, 250);
        assert!(chunks.iter().all(|c| c.file_id == 1 && !c.finished));
    }

    #[test]
    fn split_remainder() {
        // 250 / 100 -> offsets {0, 100, 200}, sizes {100, 100, 50}
        let chunks = split_into_chunks(7, 250, 100).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].offset, 0);
        assert_eq!(chunks[0].size, 100);
        assert_eq!(chunks[1].offset, 100);
        assert_eq!(chunks[1].size, 100);
        assert_eq!(chunks[2].offset, 200);
        assert_eq!(chunks[2].size, 50);
    }

    #[test]
    fn split_single() {
        let chunks = split_into_chunks(1, 100, 4096).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].offset, 0);
        assert_eq!(chunks[0].size, 100);
    }

    #[test]
    fn split_empty_file() {
        assert!(split_into_chunks(1, 0, 4096).unwrap().is_empty());
    }

    #[test]
    fn split_zero_chunk_size_rejected() {
        let err = split_into_chunks(1, 100, 0).unwrap_err();
        assert!(matches!(err, UploadError::InvalidArgument(_)));
    }

    #[test]
    fn split_tiles_exactly() {
        for (total, chunk) in [(1u64, 1u64), (999, 100), (4096, 4096), (4097, 4096), (10, 3)] {
            let chunks = split_into_chunks(1, total, chunk).unwrap();
            let mut expected_offset = 0u64;
            for c in &chunks {
                assert_eq!(c.offset, expected_offset, "gap or overlap at {}", c.offset);
                assert!(c.size > 0);
                assert!(c.size <= chunk);
                expected_offset = c.end();
            }
            assert_eq!(expected_offset, total, "chunks must cover [0, total)");
            assert_eq!(chunks.iter().map(|c| c.size).sum::<u64>(), total);
        }
    }
}
