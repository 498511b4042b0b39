//! SSE stream reading.
//!
//! The upstream chat endpoint replies with `text/event-stream`. This module
//! turns the raw byte stream into complete text lines: [`LineBuffer`] holds
//! back partial trailing lines between chunks, [`parse_sse_line`] classifies
//! each line, and [`relay_sse_lines`] drives a `reqwest` response body
//! through both.

use backboard_common::ClientError;
use futures_util::StreamExt;

/// Accumulates raw response-body bytes and yields complete lines.
///
/// Splitting happens at the byte level, so a multi-byte UTF-8 sequence that
/// straddles a chunk boundary is never decoded mid-sequence; each line is
/// decoded only once its terminating newline has arrived.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes; returns every line completed by this chunk.
    /// The trailing partial line (if any) stays buffered for the next push.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop(); // the '\n'
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Flush an unterminated trailing line when the stream ends.
    /// Best-effort: a stream that closes mid-line still delivers its tail.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Some(line)
    }
}

/// One classified SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// An `event: <name>` line.
    Event(String),
    /// A `data: <payload>` line.
    Data(String),
}

/// Classify a single SSE line. Comment lines (leading `:`), blank lines,
/// and unknown fields (`id:`, `retry:`) yield `None`. Stateless; tracking
/// the current event name across lines is the interpreter's job.
pub fn parse_sse_line(line: &str) -> Option<SseLine> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    if let Some(rest) = line.strip_prefix("event:") {
        return Some(SseLine::Event(rest.trim().to_string()));
    }
    if let Some(rest) = line.strip_prefix("data:") {
        return Some(SseLine::Data(rest.trim().to_string()));
    }
    None
}

/// Read a streaming response body to completion, handing every complete
/// line (and the flushed tail) to `on_line` in arrival order.
pub async fn relay_sse_lines(
    response: reqwest::Response,
    mut on_line: impl FnMut(&str),
) -> Result<(), ClientError> {
    let mut buffer = LineBuffer::new();
    let mut byte_stream = response.bytes_stream();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.map_err(|e| ClientError::Stream(e.to_string()))?;
        for line in buffer.push(&chunk) {
            on_line(&line);
        }
    }

    if let Some(tail) = buffer.finish() {
        on_line(&tail);
    }

    Ok(())
}
