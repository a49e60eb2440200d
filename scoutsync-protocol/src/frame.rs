//! Binary frame format.
//!
//! Frame layout (22 bytes header + payload):
//!
//! ```text
//! +--------+-------------+------------+------------------+
//! | magic  | payload_len | md5 digest | payload          |
//! | 2 bytes|   4 bytes   |  16 bytes  | payload_len bytes|
//! +--------+-------------+------------+------------------+
//! ```
//!
//! All integers are big-endian. The digest is the MD5 of the payload and is
//! used purely for corruption detection on flaky short-range links, not for
//! security. The receiver echoes the 16 digest bytes back as the
//! acknowledgement for a verified frame.

use crate::error::ProtocolError;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{BufMut, BytesMut};
use md5::{Digest, Md5};

/// Magic bytes opening every frame.
pub const MAGIC: [u8; 2] = [0x10, 0x55];

/// Size of the frame header in bytes (2 + 4 + 16 = 22).
pub const FRAME_HEADER_SIZE: usize = 22;

/// Size of the MD5 digest and of the acknowledgement (16 bytes).
pub const DIGEST_SIZE: usize = 16;

/// Computes the MD5 digest of a payload.
pub fn digest(payload: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut hasher = Md5::new();
    hasher.update(payload);
    hasher.finalize().into()
}

/// Verifies a payload against a received digest, byte by byte.
pub fn verify(payload: &[u8], expected: &[u8; DIGEST_SIZE]) -> bool {
    digest(payload) == *expected
}

/// The parsed fixed header of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Announced payload length.
    pub payload_len: u32,
    /// Announced MD5 digest of the payload.
    pub digest: [u8; DIGEST_SIZE],
}

impl FrameHeader {
    /// Parses the 22 header bytes.
    pub fn parse(buf: &[u8; FRAME_HEADER_SIZE]) -> Result<Self, ProtocolError> {
        if buf[0..2] != MAGIC {
            return Err(ProtocolError::BadMagic([buf[0], buf[1]]));
        }

        let payload_len = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&buf[6..22]);

        Ok(Self {
            payload_len,
            digest,
        })
    }
}

/// Frame encoding.
pub struct Frame;

impl Frame {
    /// Encodes a payload into a complete frame.
    pub fn encode(payload: &[u8]) -> Result<BytesMut, ProtocolError> {
        let payload_len = payload.len() as u32;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());

        // Magic (2 bytes)
        buf.put_slice(&MAGIC);

        // Payload length (4 bytes, big-endian)
        buf.put_u32(payload_len);

        // MD5 digest of payload (16 bytes)
        buf.put_slice(&digest(payload));

        // Payload
        buf.put_slice(payload);

        Ok(buf)
    }
}
