//! Classify transfer errors into retry policy error kinds.

use crate::retry::policy::ErrorKind;
use crate::transport::TransferError;

/// Classify an HTTP status code returned by the remote for retry decisions.
pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        408 => ErrorKind::Timeout,
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code),
        // Remaining rejections (4xx and anything unrecognized) are permanent.
        _ => ErrorKind::Other,
    }
}

/// Classify a chunk transfer error into an ErrorKind.
pub fn classify(e: &TransferError) -> ErrorKind {
    match e {
        TransferError::Timeout => ErrorKind::Timeout,
        TransferError::ConnectionReset => ErrorKind::Connection,
        TransferError::LocalRead(_) => ErrorKind::LocalIo,
        TransferError::RemoteRejected(code) => classify_http_status(*code),
    }
}
