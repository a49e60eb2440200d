//! # scoutsync-gateway
//!
//! The cache/store gateway: decouples bursty tablet connections from a
//! slower, sometimes-unavailable remote authoritative store.
//!
//! This crate provides:
//! - On-disk record cache, one file per (location, key)
//! - In-memory FIFO queue of writes that failed remotely
//! - `RemoteStore` trait plus the production HTTP adapter
//! - The `Gateway` combining them: stale-tolerant reads, queue-on-failure
//!   writes, opportunistic queue drain

pub mod cache;
pub mod error;
pub mod gateway;
pub mod queue;
pub mod remote;

pub use cache::CacheDir;
pub use error::GatewayError;
pub use gateway::{Gateway, GatewayConfig, WriteOutcome};
pub use queue::{QueuedWrite, WriteQueue};
pub use remote::{HttpRemote, RemoteConfig, RemoteError, RemoteRecord, RemoteStore};

/// Current time in milliseconds since the epoch, the freshness marker unit.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
