//! Transport abstraction for the accept loop.
//!
//! The protocol runs the same over every short-range transport the tablets
//! use; only the accept mechanics differ. `Acceptor` is that seam: TCP ships
//! here, an RFCOMM acceptor for Bluetooth plugs in the same way from its own
//! crate.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

/// Accepts transport streams for the server.
#[async_trait]
pub trait Acceptor: Send {
    /// The accepted stream type.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Waits for the next peer. Returns the stream and a peer label used in
    /// logs.
    async fn accept(&mut self) -> io::Result<(Self::Stream, String)>;

    /// A label for the local endpoint, for the startup log line.
    fn local_label(&self) -> String;
}

/// TCP acceptor, used for USB/Wi-Fi tethered tablets.
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Binds the listener.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// The bound local address (useful when binding port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

#[async_trait]
impl Acceptor for TcpAcceptor {
    type Stream = TcpStream;

    async fn accept(&mut self) -> io::Result<(Self::Stream, String)> {
        let (stream, addr) = self.listener.accept().await?;
        stream.set_nodelay(true).ok();
        Ok((stream, addr.to_string()))
    }

    fn local_label(&self) -> String {
        self.listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "tcp".to_string())
    }
}
