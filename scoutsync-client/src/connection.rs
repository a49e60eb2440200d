//! Connection management.

use crate::error::ClientError;
use scoutsync_protocol::{wire, Message};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Timeout waiting for the acknowledgement of a sent frame, standing in
    /// for the tablets' link watchdog on a stalled short-range transport.
    pub ack_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }
}

/// A connection to a scoutsync server.
pub struct Connection {
    config: ConnectionConfig,
    stream: Option<TcpStream>,
}

impl Connection {
    /// Dials the server.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, ClientError> {
        tracing::debug!("Connecting to {}...", config.addr);

        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(config.addr))
            .await
            .map_err(|_| ClientError::Timeout)??;
        stream.set_nodelay(true).ok();

        tracing::debug!("Connected to {}", config.addr);
        Ok(Self {
            config,
            stream: Some(stream),
        })
    }

    /// Wraps an already-established stream (e.g. a tethered socket handed
    /// over by platform glue).
    pub fn from_stream(config: ConnectionConfig, stream: TcpStream) -> Self {
        Self {
            config,
            stream: Some(stream),
        }
    }

    /// Sends one message and waits for the digest acknowledgement.
    ///
    /// On `AckMismatch`, `PeerClosed`, or `Timeout` the frame may or may not
    /// have been applied by the server; nothing is resent automatically.
    pub async fn send(&mut self, message: &Message) -> Result<(), ClientError> {
        let ack_timeout = self.config.ack_timeout;
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;

        let payload = message.encode_payload()?;
        tracing::debug!("Sending '{}' message ({} bytes)", message.kind, payload.len());

        tokio::time::timeout(ack_timeout, wire::send_payload(stream, &payload))
            .await
            .map_err(|_| ClientError::Timeout)??;

        Ok(())
    }

    /// Runs the full-sync exchange: sends an `R` request and receives,
    /// verifies, and acknowledges the reply. Returns the reply body, an
    /// object keyed by category.
    pub async fn sync(&mut self) -> Result<Value, ClientError> {
        self.send(&Message::sync_request()).await?;

        let ack_timeout = self.config.ack_timeout;
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;

        let payload = tokio::time::timeout(ack_timeout, wire::recv_payload(stream))
            .await
            .map_err(|_| ClientError::Timeout)??
            .ok_or(ClientError::ConnectionClosed)?;

        // Half-duplex: the only frame the server ever sends is the reply to
        // the request just written, so no tag correlation is needed.
        let reply = Message::parse(&payload)?;
        tracing::debug!("Sync reply received ({} bytes)", payload.len());
        Ok(reply.body)
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Closes the connection.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        if let Some(mut stream) = self.stream.take() {
            use tokio::io::AsyncWriteExt;
            stream.shutdown().await.ok();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoutsync_protocol::frame::{self, FrameHeader, DIGEST_SIZE, FRAME_HEADER_SIZE};
    use scoutsync_protocol::{MessageKind, ProtocolError};
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn accept_one(listener: TcpListener) -> TcpStream {
        let (stream, _) = listener.accept().await.unwrap();
        stream
    }

    #[tokio::test]
    async fn test_send_acked() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let mut stream = accept_one(listener).await;
            let payload = wire::recv_payload(&mut stream).await.unwrap().unwrap();
            payload
        });

        let mut conn = Connection::connect(ConnectionConfig::new(addr)).await.unwrap();
        conn.send(&Message::new(MessageKind::Match, json!({"match": 1, "team": 254})))
            .await
            .unwrap();

        let payload = peer.await.unwrap();
        assert_eq!(payload[0], b'M');
    }

    #[tokio::test]
    async fn test_send_ack_mismatch() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let mut stream = accept_one(listener).await;
            let mut header = [0u8; FRAME_HEADER_SIZE];
            stream.read_exact(&mut header).await.unwrap();
            let header = FrameHeader::parse(&header).unwrap();
            let mut payload = vec![0u8; header.payload_len as usize];
            stream.read_exact(&mut payload).await.unwrap();
            stream.write_all(&[0x11; DIGEST_SIZE]).await.unwrap();
            stream
        });

        let mut conn = Connection::connect(ConnectionConfig::new(addr)).await.unwrap();
        let result = conn
            .send(&Message::new(MessageKind::Pit, json!({"team": 118})))
            .await;

        assert!(matches!(
            result,
            Err(ClientError::Protocol(ProtocolError::AckMismatch { .. }))
        ));
        assert!(result.unwrap_err().is_retryable());
        drop(peer.await.unwrap());
    }

    #[tokio::test]
    async fn test_send_ack_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let mut stream = accept_one(listener).await;
            // Swallow the frame, never acknowledge
            let mut buf = vec![0u8; 1024];
            let _ = stream.read(&mut buf).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            stream
        });

        let config = ConnectionConfig::new(addr).with_ack_timeout(Duration::from_millis(100));
        let mut conn = Connection::connect(config).await.unwrap();
        let result = conn
            .send(&Message::new(MessageKind::Pit, json!({"team": 118})))
            .await;

        assert!(matches!(result, Err(ClientError::Timeout)));
        peer.abort();
    }

    #[tokio::test]
    async fn test_sync_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let mut stream = accept_one(listener).await;
            let request = wire::recv_payload(&mut stream).await.unwrap().unwrap();
            assert_eq!(&request[..], b"R{}");

            let reply = Message::new(
                MessageKind::SyncRequest,
                json!({"pit": [{"team": 254}], "match": []}),
            );
            wire::send_payload(&mut stream, &reply.encode_payload().unwrap())
                .await
                .unwrap();
        });

        let mut conn = Connection::connect(ConnectionConfig::new(addr)).await.unwrap();
        let body = conn.sync().await.unwrap();
        assert_eq!(body["pit"].as_array().unwrap().len(), 1);

        peer.await.unwrap();
        conn.close().await.unwrap();
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_send_after_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = tokio::spawn(async move { accept_one(listener).await });

        let mut conn = Connection::connect(ConnectionConfig::new(addr)).await.unwrap();
        conn.close().await.unwrap();

        let result = conn
            .send(&Message::new(MessageKind::Pit, json!({"team": 1})))
            .await;
        assert!(matches!(result, Err(ClientError::NotConnected)));
        drop(peer.await.unwrap());
    }

    #[test]
    fn test_config_builders() {
        let config = ConnectionConfig::new("127.0.0.1:7840".parse().unwrap())
            .with_connect_timeout(Duration::from_secs(2))
            .with_ack_timeout(Duration::from_secs(3));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.ack_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_reply_digest_matches_payload() {
        let reply = Message::new(MessageKind::SyncRequest, json!({}));
        let payload = reply.encode_payload().unwrap();
        assert!(frame::verify(&payload, &frame::digest(&payload)));
    }
}
