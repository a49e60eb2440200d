//! Kind-tagged JSON messages.
//!
//! The first byte of every frame payload is a one-character kind tag; the
//! rest is a JSON document carrying either a single record object or an
//! array of record objects. Record schemas are opaque to this layer.

use crate::error::ProtocolError;
use serde_json::Value;
use std::fmt;

/// Message kinds, identified by the leading payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Match observation record(s).
    Match,
    /// Super/observer record(s).
    Super,
    /// Feedback record(s).
    Feedback,
    /// Pit record(s).
    Pit,
    /// Full-sync request; the only kind that produces a reply.
    SyncRequest,
}

impl MessageKind {
    /// The wire tag byte for this kind.
    pub fn tag(&self) -> u8 {
        match self {
            MessageKind::Match => b'M',
            MessageKind::Super => b'S',
            MessageKind::Feedback => b'F',
            MessageKind::Pit => b'P',
            MessageKind::SyncRequest => b'R',
        }
    }

    /// Parses a wire tag byte.
    pub fn from_tag(tag: u8) -> Result<Self, ProtocolError> {
        match tag {
            b'M' => Ok(MessageKind::Match),
            b'S' => Ok(MessageKind::Super),
            b'F' => Ok(MessageKind::Feedback),
            b'P' => Ok(MessageKind::Pit),
            b'R' => Ok(MessageKind::SyncRequest),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }

    /// Returns whether messages of this kind carry records to be written.
    pub fn is_write(&self) -> bool {
        !matches!(self, MessageKind::SyncRequest)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag() as char)
    }
}

/// A decoded message: a kind tag plus its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: MessageKind,
    pub body: Value,
}

impl Message {
    pub fn new(kind: MessageKind, body: Value) -> Self {
        Self { kind, body }
    }

    /// A full-sync request with an empty body.
    pub fn sync_request() -> Self {
        Self::new(MessageKind::SyncRequest, Value::Object(Default::default()))
    }

    /// Parses a frame payload: kind tag byte followed by a JSON document.
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let (&tag, body_bytes) = payload.split_first().ok_or(ProtocolError::EmptyPayload)?;
        let kind = MessageKind::from_tag(tag)?;
        let body = serde_json::from_slice(body_bytes)?;
        Ok(Self { kind, body })
    }

    /// Encodes the message into a frame payload.
    pub fn encode_payload(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut payload = vec![self.kind.tag()];
        serde_json::to_writer(&mut payload, &self.body)?;
        Ok(payload)
    }

    /// Views the body as a batch of records.
    ///
    /// A single object is a batch of one; an array yields its elements.
    /// Elements that are not objects are still yielded so the caller can
    /// apply per-record failure handling.
    pub fn records(&self) -> Vec<&Value> {
        match &self.body {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        }
    }
}
