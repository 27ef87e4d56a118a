//! Concurrent offset reader for upload source files.

use std::fs::File;
use std::io;
#[cfg(unix)]
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reader for an upload source file. Safe to clone and use from multiple
/// tasks; each `read_range` is independent (pread-style).
#[derive(Debug, Clone)]
pub struct ChunkReader {
    file: Arc<File>,
    path: PathBuf,
}

impl ChunkReader {
    /// Open `path` read-only. The file must exist for the whole upload;
    /// chunk reads go back to it instead of buffering the file in memory.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(ChunkReader {
            file: Arc::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Size of the source file in bytes.
    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Read exactly `size` bytes at `offset`. Does not move the file's
    /// logical cursor; safe for concurrent use. A file shorter than
    /// `offset + size` surfaces as `UnexpectedEof`.
    #[cfg(unix)]
    pub fn read_range(&self, offset: u64, size: u64) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; size as usize];
        self.file.read_exact_at(&mut buf, offset)?;
        Ok(buf)
    }

    /// Stub for non-Unix (e.g. Windows): use seek + read. Not safe for concurrent use.
    #[cfg(not(unix))]
    pub fn read_range(&self, offset: u64, size: u64) -> io::Result<Vec<u8>> {
        use std::io::{Read, Seek, SeekFrom};
        let mut f = (*self.file).try_clone()?;
        f.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; size as usize];
        f.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Path the reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
