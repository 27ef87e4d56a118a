//! Control protocol for reaching a live `rum run` process.
//!
//! One line per request over a unix socket, e.g. `cancel 7`. The listener
//! lives in the CLI and forwards requests to its manager handle; this
//! module only defines the wire format and the default socket path so both
//! ends agree.

use std::path::PathBuf;

use crate::chunker::FileId;

/// A parsed control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// Stop work on the given upload.
    Cancel(FileId),
}

impl ControlRequest {
    /// Wire form, newline-terminated.
    pub fn to_line(self) -> String {
        match self {
            ControlRequest::Cancel(id) => format!("cancel {}\n", id),
        }
    }
}

/// Parse one line of the control protocol. Malformed lines yield `None`;
/// the listener ignores them rather than dropping the connection.
pub fn parse_control_line(line: &str) -> Option<ControlRequest> {
    let rest = line.trim().strip_prefix("cancel ")?;
    rest.trim().parse().ok().map(ControlRequest::Cancel)
}

/// Default path for the control socket (same XDG state dir as the DB).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("rum")?.get_state_home();
    Ok(dir.join("control.sock"))
}
