//! Splitting response bodies into events.
//!
//! The service writes one JSON document per HTTP chunk and nothing marks
//! document boundaries besides the chunk itself. The transport hands body data
//! over in pieces that never span two chunks but may cover only part of one,
//! so [`Framing::Chunk`] buffers until the bytes form a complete JSON value.
//! A buffer that can no longer become valid JSON is delivered as text.
//! [`Framing::NewlineDelimited`] is available for servers that terminate each
//! document with `\n`.
//!
//! Blank frames are skipped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::event::Payload;

/// How a response body is divided into events.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// One HTTP chunk carries exactly one event.
    #[default]
    Chunk,
    /// Events are separated by `\n`, regardless of chunk boundaries.
    NewlineDelimited,
}

/// Incremental decoder for one response body.
#[derive(Debug)]
pub(crate) struct FrameDecoder {
    framing: Framing,
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub(crate) fn new(framing: Framing) -> Self {
        Self {
            framing,
            buffer: Vec::new(),
        }
    }

    /// Feeds one piece of body data and returns every payload it completes.
    pub(crate) fn push(&mut self, data: &[u8]) -> Vec<Payload> {
        match self.framing {
            Framing::Chunk => {
                self.buffer.extend_from_slice(data);
                match serde_json::from_slice::<Value>(&self.buffer) {
                    Ok(value) => {
                        self.buffer.clear();
                        vec![Payload::Structured(value)]
                    }
                    // Truncated document, or only whitespace so far.
                    Err(err) if err.is_eof() => Vec::new(),
                    Err(_) => {
                        let frame = std::mem::take(&mut self.buffer);
                        decode_frame(&frame).into_iter().collect()
                    }
                }
            }
            Framing::NewlineDelimited => {
                self.buffer.extend_from_slice(data);
                let mut payloads = Vec::new();
                while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                    payloads.extend(decode_frame(&line));
                }
                payloads
            }
        }
    }

    /// Drains whatever is left once the body ends.
    pub(crate) fn finish(&mut self) -> Option<Payload> {
        let rest = std::mem::take(&mut self.buffer);
        decode_frame(&rest)
    }
}

/// Decodes a single frame, falling back to text when it is not JSON.
pub(crate) fn decode_frame(frame: &[u8]) -> Option<Payload> {
    let text = String::from_utf8_lossy(frame);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Some(Payload::Structured(value)),
        Err(err) => {
            warn!(
                event = "frame_decode_fallback",
                error = %err,
                len = trimmed.len()
            );
            Some(Payload::Text(trimmed.to_string()))
        }
    }
}
