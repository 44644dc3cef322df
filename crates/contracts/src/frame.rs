//! Frame - one delimiter-bounded message
//!
//! Produced by the framing stage, consumed by exactly one handler invocation.

use std::borrow::Cow;

use bytes::Bytes;

/// A single message extracted from the byte stream, delimiter excluded.
///
/// The payload is an independent copy of the accumulation buffer contents at
/// extraction time, so it never changes after the buffer moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Extraction sequence number (0-based, per reader)
    pub seq: u64,

    /// Message bytes without the delimiter
    pub payload: Bytes,

    /// Set only for a trailing remainder flushed at end-of-stream
    pub unterminated: bool,
}

impl Frame {
    /// Create a delimiter-terminated frame
    pub fn new(seq: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            seq,
            payload: payload.into(),
            unterminated: false,
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty (a bare delimiter)
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload decoded as text; invalid UTF-8 sequences are replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Routing key: bytes up to (not including) the first whitespace byte
    pub fn prefix(&self) -> &[u8] {
        split_prefix(&self.payload)
    }
}

/// Bytes of `message` before its first whitespace byte
pub fn split_prefix(message: &[u8]) -> &[u8] {
    let end = message
        .iter()
        .position(|b| is_whitespace(*b))
        .unwrap_or(message.len());
    &message[..end]
}

/// Whitespace bytes that terminate a routing prefix
pub fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}
