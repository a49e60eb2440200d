//! Async frame exchange over a byte stream.
//!
//! Both sides of the protocol run the same exchange regardless of transport
//! (TCP, tethered socket, RFCOMM wrapped in an async stream): the receiver
//! reads a frame, verifies the digest, and echoes the digest back as the
//! acknowledgement; the sender writes a frame and waits for that echo.

use crate::error::ProtocolError;
use crate::frame::{self, Frame, FrameHeader, DIGEST_SIZE, FRAME_HEADER_SIZE};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads the 22-byte frame header, accumulating across short reads.
///
/// Returns `Ok(None)` if the peer closed the stream cleanly before the first
/// header byte. A close mid-header is a `TruncatedFrame` error.
pub async fn read_header<S>(stream: &mut S) -> Result<Option<FrameHeader>, ProtocolError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; FRAME_HEADER_SIZE];
    let mut filled = 0;

    while filled < FRAME_HEADER_SIZE {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ProtocolError::TruncatedFrame {
                got: filled,
                expected: FRAME_HEADER_SIZE,
            });
        }
        filled += n;
    }

    FrameHeader::parse(&buf).map(Some)
}

/// Receives one frame and runs the acknowledge protocol.
///
/// On a verified frame the 16 digest bytes are echoed back and the payload
/// returned. On a digest mismatch **no acknowledgement is sent** and
/// `DigestMismatch` is returned; the stream is positioned at the next frame
/// boundary and may keep being used. Returns `Ok(None)` on clean close.
pub async fn recv_payload<S>(stream: &mut S) -> Result<Option<Bytes>, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let header = match read_header(stream).await? {
        Some(h) => h,
        None => return Ok(None),
    };

    let mut payload = vec![0u8; header.payload_len as usize];
    let mut filled = 0;
    while filled < payload.len() {
        let n = stream.read(&mut payload[filled..]).await?;
        if n == 0 {
            return Err(ProtocolError::TruncatedFrame {
                got: FRAME_HEADER_SIZE + filled,
                expected: FRAME_HEADER_SIZE + payload.len(),
            });
        }
        filled += n;
    }

    if !frame::verify(&payload, &header.digest) {
        return Err(ProtocolError::DigestMismatch {
            expected: hex::encode(header.digest),
            actual: hex::encode(frame::digest(&payload)),
        });
    }

    stream.write_all(&header.digest).await?;
    stream.flush().await?;

    Ok(Some(Bytes::from(payload)))
}

/// Sends one frame and waits for the 16-byte acknowledgement.
///
/// A zero-length read while waiting means the peer closed (`PeerClosed`);
/// any other 16 bytes than the digest just sent is an `AckMismatch`.
pub async fn send_payload<S>(stream: &mut S, payload: &[u8]) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let encoded = Frame::encode(payload)?;
    let sent_digest = frame::digest(payload);

    stream.write_all(&encoded).await?;
    stream.flush().await?;

    let mut ack = [0u8; DIGEST_SIZE];
    let mut filled = 0;
    while filled < DIGEST_SIZE {
        let n = stream.read(&mut ack[filled..]).await?;
        if n == 0 {
            return Err(ProtocolError::PeerClosed);
        }
        filled += n;
    }

    if ack != sent_digest {
        return Err(ProtocolError::AckMismatch {
            sent: hex::encode(sent_digest),
            got: hex::encode(ack),
        });
    }

    Ok(())
}
