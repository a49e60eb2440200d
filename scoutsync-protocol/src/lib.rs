//! # scoutsync-protocol
//!
//! Wire protocol for scoutsync: the framed, integrity-checked message
//! exchange used between scouting tablets and the field server.
//!
//! This crate provides:
//! - Binary framing with length prefix and MD5 integrity digest
//! - Kind-tagged JSON message types
//! - Async exchange helpers (send with acknowledgement, receive with verify)
//!   shared by the server and client over any byte stream

pub mod error;
pub mod frame;
pub mod message;
pub mod wire;

pub use error::ProtocolError;
pub use frame::{Frame, FrameHeader, DIGEST_SIZE, FRAME_HEADER_SIZE, MAGIC};
pub use message::{Message, MessageKind};

/// Default port for the scoutsync server.
pub const DEFAULT_PORT: u16 = 7840;

/// Maximum frame payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;
