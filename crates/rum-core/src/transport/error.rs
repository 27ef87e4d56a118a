//! Transfer error type for retry classification.

use std::fmt;

/// Error from a single chunk upload attempt (network, remote, or local read).
/// Kept as a concrete enum so the retry layer can classify before anything
/// is converted to anyhow.
#[derive(Debug)]
pub enum TransferError {
    /// The attempt exceeded its time budget (connect, send, or the
    /// per-attempt wall clock enforced by the uploader).
    Timeout,
    /// Network-level failure: reset, refused, DNS, connection dropped
    /// mid-transfer.
    ConnectionReset,
    /// The remote endpoint answered with a non-success status code.
    RemoteRejected(u16),
    /// Reading the chunk's byte range from the source file failed.
    LocalRead(std::io::Error),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Timeout => write!(f, "attempt timed out"),
            TransferError::ConnectionReset => write!(f, "connection reset"),
            TransferError::RemoteRejected(code) => write!(f, "remote rejected: HTTP {}", code),
            TransferError::LocalRead(e) => write!(f, "local read: {}", e),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::LocalRead(e) => Some(e),
            _ => None,
        }
    }
}
