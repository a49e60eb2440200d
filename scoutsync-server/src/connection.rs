//! Per-connection state machine.
//!
//! Strictly half-duplex: a full request frame is read and acknowledged
//! before any reply is written. One `Connection` runs per accepted stream,
//! on its own task.

use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::server::ServerStats;
use scoutsync_protocol::{wire, Message, ProtocolError};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Waiting for (or reading) a request frame.
    Receiving,
    /// Writing a reply frame and awaiting its acknowledgement.
    Sending,
    /// Stream closed; the connection is done.
    Closed,
}

/// One tablet connection.
pub struct Connection<S> {
    stream: S,
    peer: String,
    state: ConnState,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<ServerStats>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        peer: impl Into<String>,
        dispatcher: Arc<Dispatcher>,
        stats: Arc<ServerStats>,
    ) -> Self {
        Self {
            stream,
            peer: peer.into(),
            state: ConnState::Receiving,
            dispatcher,
            stats,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Drives the connection until the peer closes, the stream fails, or the
    /// shutdown signal fires.
    pub async fn run(&mut self, shutdown: &mut broadcast::Receiver<()>) -> Result<(), ServerError> {
        tracing::info!("[{}] Client connected", self.peer);

        loop {
            let received = tokio::select! {
                result = wire::recv_payload(&mut self.stream) => result,
                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", self.peer);
                    self.state = ConnState::Closed;
                    return Ok(());
                }
            };

            match received {
                Ok(Some(payload)) => {
                    self.stats.frames_total.fetch_add(1, Ordering::Relaxed);
                    self.handle_payload(&payload).await?;
                }
                Ok(None) => {
                    tracing::debug!("[{}] Connection closed by client", self.peer);
                    self.state = ConnState::Closed;
                    return Ok(());
                }
                // Corrupted frame: dropped without acknowledgement, the
                // stream stays at a frame boundary and keeps being read.
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("[{}] Dropping corrupt frame: {}", self.peer, e);
                    self.stats.frames_corrupt.fetch_add(1, Ordering::Relaxed);
                }
                // Malformed header or dead stream: tear the connection down.
                Err(e) => {
                    tracing::warn!("[{}] Closing connection: {}", self.peer, e);
                    self.state = ConnState::Closed;
                    self.stats.errors_total.fetch_add(1, Ordering::Relaxed);
                    return Err(e.into());
                }
            }
        }
    }

    /// Processes one verified, already-acknowledged payload.
    async fn handle_payload(&mut self, payload: &[u8]) -> Result<(), ServerError> {
        // The frame was acknowledged on digest alone; a payload that does
        // not parse is dropped here and the connection keeps receiving.
        let message = match Message::parse(payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("[{}] Dropping unparseable message: {}", self.peer, e);
                return Ok(());
            }
        };

        tracing::debug!(
            "[{}] Received '{}' message ({} bytes)",
            self.peer,
            message.kind,
            payload.len()
        );

        let reply = match self.dispatcher.dispatch(message).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("[{}] Dispatch failed: {}", self.peer, e);
                self.stats.errors_total.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        };

        if let Some(reply) = reply {
            self.state = ConnState::Sending;
            let payload = reply.encode_payload()?;
            match wire::send_payload(&mut self.stream, &payload).await {
                Ok(()) => {
                    tracing::debug!("[{}] Reply delivered ({} bytes)", self.peer, payload.len());
                }
                // At-most-once reply delivery: the failure is logged, never
                // retried. A wrong ack leaves the stream usable; a closed
                // or failed stream does not.
                Err(e @ ProtocolError::AckMismatch { .. }) => {
                    tracing::warn!("[{}] Reply not confirmed: {}", self.peer, e);
                }
                Err(e) => {
                    tracing::warn!("[{}] Reply delivery failed: {}", self.peer, e);
                    self.state = ConnState::Closed;
                    return Err(e.into());
                }
            }
            self.state = ConnState::Receiving;
        }

        Ok(())
    }
}
