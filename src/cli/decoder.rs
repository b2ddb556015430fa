//! Incremental NDJSON decoder for process output.
//!
//! Bytes arrive in arbitrary chunks. Each stream keeps its own buffer of
//! not-yet-terminated bytes; only complete `\n`-terminated lines are
//! interpreted, so decoding does not depend on where chunk boundaries fall.

use std::fmt;

use serde_json::Value;

/// Which output stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamId {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// One decoded line.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    /// The line parsed as JSON.
    Json(Value),
    /// The line was not JSON. Carries the raw line.
    Text(String),
}

impl DecodedEvent {
    /// Parse a complete line, falling back to text.
    #[must_use]
    pub fn from_line(line: &str) -> Self {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => Self::Json(value),
            Err(e) => {
                tracing::trace!(error = %e, "Line is not JSON, passing through as text");
                Self::Text(line.to_string())
            }
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

/// Line-buffering decoder holding one buffer per stream.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl StreamDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer_mut(&mut self, stream: StreamId) -> &mut Vec<u8> {
        match stream {
            StreamId::Stdout => &mut self.stdout,
            StreamId::Stderr => &mut self.stderr,
        }
    }

    /// Bytes buffered for `stream` that do not yet form a complete line.
    #[must_use]
    pub fn pending(&self, stream: StreamId) -> &[u8] {
        match stream {
            StreamId::Stdout => &self.stdout,
            StreamId::Stderr => &self.stderr,
        }
    }

    /// Append a chunk and return every complete, non-blank line decoded.
    pub fn feed(&mut self, stream: StreamId, chunk: &[u8]) -> Vec<DecodedEvent> {
        let buffer = self.buffer_mut(stream);
        buffer.extend_from_slice(chunk);

        let Some(last_newline) = buffer.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        // Everything after the last newline stays buffered.
        let remainder = buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(buffer, remainder);

        complete
            .split(|b| *b == b'\n')
            .filter_map(decode_line)
            .collect()
    }

    /// Treat any buffered remainder of `stream` as a final line.
    ///
    /// Called once when the stream ends. The buffer is always cleared.
    pub fn flush(&mut self, stream: StreamId) -> Option<DecodedEvent> {
        let buffer = std::mem::take(self.buffer_mut(stream));
        decode_line(&buffer)
    }
}

fn decode_line(bytes: &[u8]) -> Option<DecodedEvent> {
    let line = String::from_utf8_lossy(bytes);
    if line.trim().is_empty() {
        return None;
    }
    Some(DecodedEvent::from_line(&line))
}
