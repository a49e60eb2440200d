//! # scoutsync-client
//!
//! The tablet side of the scoutsync protocol: a connection that frames
//! outgoing record messages, waits for the digest acknowledgement, and runs
//! the full-sync exchange.

pub mod connection;
pub mod error;

pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
