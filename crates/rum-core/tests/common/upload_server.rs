//! Minimal HTTP/1.1 server that accepts chunk PUTs for integration tests.
//!
//! Collects every PUT body keyed by the offset in the request path, so a
//! test can reassemble what "the remote" ended up with. Responds 201 on
//! success; optionally rejects the first N PUTs with 503 to exercise the
//! retry path.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct UploadServerOptions {
    /// Answer this many PUTs with 503 before accepting any (simulates a
    /// briefly overloaded remote).
    pub flaky_first_puts: u32,
}

#[derive(Default)]
struct Received {
    chunks: HashMap<u64, Vec<u8>>,
    content_ranges: Vec<String>,
    puts: u32,
    rejected: u32,
}

/// Handle to a running server; clones share the received state.
#[derive(Clone)]
pub struct UploadServer {
    base_url: String,
    received: Arc<Mutex<Received>>,
}

impl UploadServer {
    /// Base URL without a trailing slash, e.g. "http://127.0.0.1:39463".
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Total PUT requests seen, including rejected ones.
    pub fn put_count(&self) -> u32 {
        self.received.lock().unwrap().puts
    }

    /// Offsets of accepted chunks, ascending.
    pub fn offsets(&self) -> Vec<u64> {
        let mut v: Vec<u64> = self.received.lock().unwrap().chunks.keys().copied().collect();
        v.sort_unstable();
        v
    }

    /// Accepted chunk bodies concatenated in offset order.
    pub fn assembled(&self) -> Vec<u8> {
        let state = self.received.lock().unwrap();
        let mut offsets: Vec<u64> = state.chunks.keys().copied().collect();
        offsets.sort_unstable();
        let mut out = Vec::new();
        for off in offsets {
            out.extend_from_slice(&state.chunks[&off]);
        }
        out
    }

    /// Content-Range header values of accepted PUTs, arrival order.
    pub fn content_ranges(&self) -> Vec<String> {
        self.received.lock().unwrap().content_ranges.clone()
    }
}

/// Starts a server in a background thread. It runs until the process exits.
pub fn start() -> UploadServer {
    start_with_options(UploadServerOptions::default())
}

pub fn start_with_options(opts: UploadServerOptions) -> UploadServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let received = Arc::new(Mutex::new(Received::default()));
    let state = Arc::clone(&received);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&state);
            thread::spawn(move || handle(stream, &state, opts));
        }
    });
    UploadServer {
        base_url: format!("http://127.0.0.1:{}", port),
        received,
    }
}

fn handle(mut stream: TcpStream, state: &Mutex<Received>, opts: UploadServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));

    let mut buf = Vec::new();
    let mut tmp = [0u8; 8192];
    let header_end = loop {
        match stream.read(&mut tmp) {
            Ok(0) => return,
            Ok(n) => {
                buf.extend_from_slice(&tmp[..n]);
                if let Some(pos) = find_header_end(&buf) {
                    break pos;
                }
                if buf.len() > 64 * 1024 {
                    return;
                }
            }
            Err(_) => return,
        }
    };
    let head = match std::str::from_utf8(&buf[..header_end]) {
        Ok(s) => s.to_string(),
        Err(_) => return,
    };
    let req = parse_head(&head);
    if !req.method.eq_ignore_ascii_case("PUT") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    let Some(offset) = offset_from_path(&req.path) else {
        let _ = stream.write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n");
        return;
    };
    if req.expects_continue {
        let _ = stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n");
    }

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < req.content_length {
        match stream.read(&mut tmp) {
            Ok(0) => break,
            Ok(n) => body.extend_from_slice(&tmp[..n]),
            Err(_) => return,
        }
    }
    if body.len() != req.content_length {
        let _ = stream.write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    {
        let mut st = state.lock().unwrap();
        st.puts += 1;
        if st.rejected < opts.flaky_first_puts {
            st.rejected += 1;
            let _ =
                stream.write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n");
            return;
        }
        if let Some(cr) = req.content_range {
            st.content_ranges.push(cr);
        }
        st.chunks.insert(offset, body);
    }
    let _ = stream.write_all(b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n");
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

struct RequestHead {
    method: String,
    path: String,
    content_length: usize,
    content_range: Option<String>,
    expects_continue: bool,
}

fn parse_head(head: &str) -> RequestHead {
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("").to_string();

    let mut content_length = 0usize;
    let mut content_range = None;
    let mut expects_continue = false;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            } else if name.eq_ignore_ascii_case("content-range") {
                content_range = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("expect")
                && value.to_ascii_lowercase().contains("100-continue")
            {
                expects_continue = true;
            }
        }
    }
    RequestHead {
        method,
        path,
        content_length,
        content_range,
        expects_continue,
    }
}

/// The transport PUTs to `/{file_id}/{offset}`; the offset is the last path
/// segment.
fn offset_from_path(path: &str) -> Option<u64> {
    path.rsplit('/').find(|s| !s.is_empty())?.parse().ok()
}
