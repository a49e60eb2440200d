//! Client error types.

use scoutsync_protocol::ProtocolError;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timed out waiting for acknowledgement")]
    Timeout,
}

impl ClientError {
    /// Returns whether retrying the operation on a fresh exchange can help.
    ///
    /// Resend policy deliberately lives in the caller: an unconfirmed send
    /// may or may not have been applied, and only the tablet app knows
    /// whether its records are idempotent enough to resend.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::Timeout => true,
            ClientError::ConnectionClosed => true,
            ClientError::Protocol(e) => matches!(
                e,
                ProtocolError::AckMismatch { .. }
                    | ProtocolError::PeerClosed
                    | ProtocolError::DigestMismatch { .. }
            ),
            ClientError::NotConnected => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::ConnectionClosed.is_retryable());
        assert!(ClientError::Protocol(ProtocolError::PeerClosed).is_retryable());
        assert!(!ClientError::NotConnected.is_retryable());
        assert!(!ClientError::Protocol(ProtocolError::BadMagic([0, 0])).is_retryable());
    }
}
