//! # scoutsync-server
//!
//! The field server: accepts tablet connections over pluggable transports,
//! runs the half-duplex receive/acknowledge state machine per connection,
//! and dispatches decoded messages into the cache/store gateway.
//!
//! This crate provides:
//! - `Acceptor` transport trait with the TCP implementation
//! - Per-connection state machine over the framed protocol
//! - Kind-to-handler dispatch with per-record partial-failure semantics
//! - YAML + environment configuration

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod server;
pub mod transport;

pub use config::{CacheConfig, CategoryConfig, Config, ConfigError, NetworkConfig, RemoteConfigSection};
pub use connection::{ConnState, Connection};
pub use dispatcher::{Category, Dispatcher};
pub use error::ServerError;
pub use server::{Server, ServerConfig, ServerStats};
pub use transport::{Acceptor, TcpAcceptor};
