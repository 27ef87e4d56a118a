//! Chunk completion bitmap for resume.

/// Completion bitmap: one bit per chunk, LSB of byte 0 = chunk 0.
///
/// This is the persistence encoding of the descriptors' `finished` flags;
/// it serializes to/from a DB BLOB. Only the first `ceil(chunk_count / 8)`
/// bytes are significant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkBitmap {
    bytes: Vec<u8>,
}

impl ChunkBitmap {
    /// New empty bitmap sized for `chunk_count` bits.
    pub fn new(chunk_count: usize) -> Self {
        ChunkBitmap {
            bytes: vec![0u8; chunk_count.div_ceil(8)],
        }
    }

    /// Deserialize from a DB BLOB. Extra bytes are ignored; missing bytes
    /// read as incomplete.
    pub fn from_bytes(bytes: &[u8], chunk_count: usize) -> Self {
        let len = chunk_count.div_ceil(8);
        let mut b = vec![0u8; len];
        let copy = bytes.len().min(len);
        b[..copy].copy_from_slice(&bytes[..copy]);
        ChunkBitmap { bytes: b }
    }

    /// Serialize for a DB BLOB (exactly the bytes needed for `chunk_count` bits).
    pub fn to_bytes(&self, chunk_count: usize) -> Vec<u8> {
        let len = chunk_count.div_ceil(8);
        self.bytes.get(..len).unwrap_or(&self.bytes).to_vec()
    }

    /// Mark the chunk at `index` completed.
    pub fn set_completed(&mut self, index: usize) {
        let byte_idx = index / 8;
        if byte_idx >= self.bytes.len() {
            self.bytes.resize(byte_idx + 1, 0);
        }
        self.bytes[byte_idx] |= 1 << (index % 8);
    }

    /// True if the chunk at `index` is marked completed.
    pub fn is_completed(&self, index: usize) -> bool {
        self.bytes
            .get(index / 8)
            .map(|&b| b & (1 << (index % 8)) != 0)
            .unwrap_or(false)
    }

    /// Number of completed chunks in `[0, chunk_count)`.
    pub fn count_completed(&self, chunk_count: usize) -> usize {
        (0..chunk_count).filter(|&i| self.is_completed(i)).count()
    }

    /// True if every chunk in `[0, chunk_count)` is completed.
    pub fn all_completed(&self, chunk_count: usize) -> bool {
        self.count_completed(chunk_count) == chunk_count
    }
}
