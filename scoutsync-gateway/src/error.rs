//! Gateway error types.

use thiserror::Error;

/// Errors from the cache and gateway layer.
///
/// Remote-store failures are deliberately absent: exhausting the retry
/// budget degrades a read to stale-or-absent and a write to queued, neither
/// of which is an error to the caller.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cache corruption at {path}: {reason}")]
    Corruption { path: String, reason: String },
}
