//! RESP frame types
//!
//! A [`Frame`] is one decoded unit from either peer: the classified view in
//! [`FrameKind`] plus the raw bytes exactly as read, so the proxy can forward
//! without re-serializing.

use bytes::Bytes;

/// Classified view of one RESP unit
#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    /// A bare line: empty (keepalive) or a legacy inline command
    Inline,

    /// Status line: +OK\r\n, +PONG\r\n, +FULLRESYNC …\r\n
    Reply(String),

    /// $N header announcing an N-byte opaque payload still on the wire
    BulkHeader(u64),

    /// *K array of bulk arguments; argv holds the decoded payloads
    Array(Vec<String>),
}

/// One decoded RESP unit plus its exact wire bytes
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// The byte sequence that must be emitted when the frame is forwarded
    pub raw: Bytes,

    /// Classified view of the same bytes
    pub kind: FrameKind,
}

impl Frame {
    pub fn new(raw: Bytes, kind: FrameKind) -> Self {
        Self { raw, kind }
    }

    /// True for a bare empty line (`\n` or `\r\n` keepalive)
    pub fn is_empty_inline(&self) -> bool {
        matches!(self.kind, FrameKind::Inline)
            && matches!(self.raw.as_ref(), b"\n" | b"\r\n")
    }

    /// The command verb, uppercased for comparison
    pub fn verb(&self) -> Option<String> {
        match &self.kind {
            FrameKind::Array(argv) => argv.first().map(|v| v.to_ascii_uppercase()),
            _ => None,
        }
    }

    /// The key argument, when the command carries one
    pub fn key(&self) -> Option<&str> {
        match &self.kind {
            FrameKind::Array(argv) => argv.get(1).map(String::as_str),
            _ => None,
        }
    }

    /// Number of arguments for array frames, 0 otherwise
    pub fn arity(&self) -> usize {
        match &self.kind {
            FrameKind::Array(argv) => argv.len(),
            _ => 0,
        }
    }
}
