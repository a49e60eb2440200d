//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur during framing or message exchange.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid magic bytes: expected [0x10, 0x55], got {0:?}")]
    BadMagic([u8; 2]),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("digest mismatch: frame announced {expected}, payload hashes to {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("peer acknowledged with wrong digest: sent {sent}, got {got}")]
    AckMismatch { sent: String, got: String },

    #[error("peer closed the stream mid-exchange")]
    PeerClosed,

    #[error("stream closed after {got} of {expected} frame bytes")]
    TruncatedFrame { got: usize, expected: usize },

    #[error("empty payload (missing kind tag)")]
    EmptyPayload,

    #[error("unknown message kind: {0:#04x}")]
    UnknownKind(u8),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns whether the stream can still be used after this error.
    ///
    /// A digest mismatch is detected only after the full frame has been
    /// consumed, so the next frame starts at a known boundary. A bad magic
    /// or truncated frame leaves the stream unsynchronizable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProtocolError::DigestMismatch { .. })
    }
}
