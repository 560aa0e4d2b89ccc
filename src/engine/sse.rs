// ── Kaiwa Engine: Stream Decoding ──────────────────────────────────────────
// Turns an arbitrary sequence of byte chunks into discrete protocol events.
//
// The response body is a newline-delimited stream of records, each either
// blank or `data: {json}`. Chunk boundaries are arbitrary — a record may be
// split anywhere, including inside a multi-byte UTF-8 sequence — so the
// carry-over buffer holds raw bytes and only complete lines are decoded.
//
// Malformed payloads are logged and dropped; they never abort the stream.

use crate::atoms::constants::{SSE_DATA_PREFIX, SSE_DONE_SENTINEL};
use crate::atoms::types::{id_from_value, truncate_utf8, StreamEvent};
use log::{debug, warn};
use serde_json::Value;

// ── Line reassembly ────────────────────────────────────────────────────────

/// Carry-over buffer for the chat stream. `push` accepts one network chunk
/// and yields every line completed by it; the trailing fragment stays
/// buffered until its newline arrives.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain all complete lines (without their `\n`).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
        }
        lines
    }

    /// Flush the final unterminated line, if any. Called once at
    /// end-of-transport — some servers omit the trailing newline on the
    /// last record.
    pub fn finish(self) -> Option<String> {
        if self.buf.iter().all(|b| b.is_ascii_whitespace()) {
            return None;
        }
        Some(String::from_utf8_lossy(&self.buf).into_owned())
    }
}

// ── Record parsing ─────────────────────────────────────────────────────────

/// Extract the payload of a protocol record. Returns `None` for blank
/// lines and lines without the field prefix.
pub fn data_payload(line: &str) -> Option<&str> {
    line.trim().strip_prefix(SSE_DATA_PREFIX)
}

/// Decode one record payload into a stream event.
///
/// The end-of-stream sentinel and unknown event kinds yield `None`
/// silently; undecodable JSON yields `None` with a warning. Either way the
/// caller keeps reading.
pub fn decode_event(payload: &str) -> Option<StreamEvent> {
    if payload == SSE_DONE_SENTINEL {
        debug!("[stream] end-of-stream sentinel");
        return None;
    }

    let v: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            warn!(
                "[stream] dropping undecodable record: {} (payload: {})",
                e,
                truncate_utf8(payload, 200)
            );
            return None;
        }
    };

    match v["event"].as_str() {
        Some("message") => Some(StreamEvent::Message {
            answer: v["answer"].as_str().unwrap_or_default().to_string(),
        }),
        Some("message_end") => Some(StreamEvent::MessageEnd {
            conversation_id: id_from_value(&v["conversation_id"]),
            message_id: id_from_value(&v["message_id"]),
        }),
        Some("error") => {
            let message = v["error"]
                .as_str()
                .filter(|s| !s.is_empty())
                .unwrap_or("chat processing failed")
                .to_string();
            Some(StreamEvent::Error { message })
        }
        Some(other) => {
            debug!("[stream] ignoring event kind {:?}", other);
            None
        }
        None => {
            warn!(
                "[stream] record without event discriminator dropped: {}",
                truncate_utf8(payload, 200)
            );
            None
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
