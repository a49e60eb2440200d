//! Server error types.

use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] scoutsync_protocol::ProtocolError),

    #[error("gateway error: {0}")]
    Gateway(#[from] scoutsync_gateway::GatewayError),

    #[error("no category configured for message kind '{0}'")]
    UnknownCategory(char),
}
