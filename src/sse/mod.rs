//! Incremental server-sent-events decoding.
//!
//! The decoder keeps undecoded bytes between chunks and only looks at complete lines,
//! so a chunk boundary in the middle of a line (or of a multi-byte character) is
//! harmless. Each non-blank `data:` line yields one application message.

pub mod stream;

pub use stream::EventStream;

use tracing::trace;

const DATA_FIELD: &str = "data:";

#[derive(Debug, Default, Clone)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done_sentinel: Option<String>,
    closed: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ends the stream when a `data:` payload equals `sentinel` (e.g. `[DONE]`).
    pub fn with_done_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.done_sentinel = Some(sentinel.into());
        self
    }

    /// True once the sentinel has been seen. Later input is ignored.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Feeds raw body bytes and returns every message completed by them.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.closed {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut messages = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(message) = self.decode_line(&line[..line.len() - 1]) {
                messages.push(message);
            }
            if self.closed {
                self.buffer.clear();
                break;
            }
        }
        messages
    }

    /// Flushes a trailing line that the body ended without terminating.
    pub fn finish(&mut self) -> Vec<String> {
        if self.closed || self.buffer.is_empty() {
            self.buffer.clear();
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line).into_iter().collect()
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<String> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw);

        // Blank lines separate events; ':' starts a comment; other fields are unused.
        let payload = line.strip_prefix(DATA_FIELD)?;
        let payload = payload.strip_prefix(' ').unwrap_or(payload);
        if payload.trim().is_empty() {
            return None;
        }

        if let Some(sentinel) = &self.done_sentinel {
            if payload.trim() == sentinel {
                trace!("SSE done sentinel received");
                self.closed = true;
                return None;
            }
        }

        Some(payload.to_string())
    }
}
