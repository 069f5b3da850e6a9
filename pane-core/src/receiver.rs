//! Client side of the wire: handshake, then a stream of frame updates.
//!
//! The first message after the handshake is a full frame, every later one
//! a delta. Each payload is checked against the handshake resolution as it
//! is decoded.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncRead;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::FramedRead;
use tracing::debug;

use crate::codec::{self, MessageCodec};
use crate::error::{PaneError, Result};
use crate::frame::{DeltaFrame, FrameUpdate};
use crate::handshake::{self, Resolution};

/// Reads the handshake and the framed updates that follow it.
pub struct StreamReceiver<R> {
    reader: FramedRead<R, MessageCodec>,
    resolution: Resolution,
    messages: u64,
    bytes: u64,
}

impl StreamReceiver<TcpStream> {
    /// Connect to a server and read its handshake.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {e}");
        }
        Self::from_stream(stream).await
    }

    /// [`connect`](Self::connect) bounded by `limit` (connect + handshake).
    pub async fn connect_timeout<A: ToSocketAddrs>(addr: A, limit: Duration) -> Result<Self> {
        tokio::time::timeout(limit, Self::connect(addr))
            .await
            .map_err(|_| PaneError::Timeout(limit))?
    }
}

impl<R> StreamReceiver<R>
where
    R: AsyncRead + Unpin,
{
    /// Read the handshake from an already connected stream.
    pub async fn from_stream(mut stream: R) -> Result<Self> {
        let (resolution, leftover) = handshake::read_handshake(&mut stream).await?;
        debug!(%resolution, leftover = leftover.len(), "handshake received");

        let mut reader = FramedRead::new(stream, MessageCodec::new());
        reader.read_buffer_mut().extend_from_slice(&leftover);

        Ok(Self {
            reader,
            resolution,
            messages: 0,
            bytes: 0,
        })
    }

    /// Resolution announced by the server.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.resolution.width, self.resolution.height)
    }

    /// Messages received so far.
    pub fn messages_received(&self) -> u64 {
        self.messages
    }

    /// Compressed payload bytes received so far.
    pub fn bytes_received(&self) -> u64 {
        self.bytes
    }

    /// Next raw (still compressed) payload; `None` at end of stream.
    pub async fn receive_payload(&mut self) -> Result<Option<Bytes>> {
        let payload = codec::read_message(&mut self.reader).await?;
        if let Some(payload) = &payload {
            self.messages += 1;
            self.bytes += payload.len() as u64;
        }
        Ok(payload)
    }

    /// Next update; `None` at end of stream.
    ///
    /// A payload that does not inflate to exactly `width * height * 4`
    /// bytes is a [`PaneError::CorruptFrame`].
    pub async fn receive(&mut self) -> Result<Option<FrameUpdate>> {
        let Some(payload) = self.receive_payload().await? else {
            return Ok(None);
        };
        self.decode_update(&payload, self.messages).map(Some)
    }

    /// Decode the payload of message number `index` (counting from 1).
    /// Message 1 is the full frame; every later one is a delta.
    pub fn decode_update(&self, payload: &[u8], index: u64) -> Result<FrameUpdate> {
        let Resolution { width, height } = self.resolution;
        let frame = codec::decode(payload, width, height)?;
        Ok(if index <= 1 {
            FrameUpdate::Full(frame)
        } else {
            FrameUpdate::Delta(DeltaFrame::from_frame(frame))
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, Pixel};
    use tokio::io::AsyncWriteExt;

    async fn write_update(server: &mut tokio::io::DuplexStream, frame: &Frame) {
        let payload = codec::encode(frame).unwrap();
        let message = codec::frame_message(&payload).unwrap();
        server.write_all(&message).await.unwrap();
    }

    #[tokio::test]
    async fn first_update_is_full_then_deltas() {
        let (client, mut server) = tokio::io::duplex(1 << 16);
        handshake::send_handshake(&mut server, Resolution::new(2, 1))
            .await
            .unwrap();
        let mut receiver = StreamReceiver::from_stream(client).await.unwrap();
        assert_eq!(receiver.dimensions(), (2, 1));

        write_update(&mut server, &Frame::filled(2, 1, Pixel(5))).await;
        write_update(&mut server, &Frame::new(2, 1)).await;
        drop(server);

        assert!(matches!(
            receiver.receive().await.unwrap(),
            Some(FrameUpdate::Full(_))
        ));
        match receiver.receive().await.unwrap() {
            Some(FrameUpdate::Delta(d)) => assert!(d.is_unchanged()),
            other => panic!("expected delta, got {other:?}"),
        }
        assert!(receiver.receive().await.unwrap().is_none());
        assert_eq!(receiver.messages_received(), 2);
    }

    #[tokio::test]
    async fn handshake_coalesced_with_first_message() {
        let (client, mut server) = tokio::io::duplex(1 << 16);
        let payload = codec::encode(&Frame::filled(1, 1, Pixel(9))).unwrap();
        let mut wire = b"1x1".to_vec();
        wire.extend_from_slice(&codec::frame_message(&payload).unwrap());
        server.write_all(&wire).await.unwrap();
        drop(server);

        let mut receiver = StreamReceiver::from_stream(client).await.unwrap();
        match receiver.receive().await.unwrap() {
            Some(FrameUpdate::Full(f)) => assert_eq!(f.pixels(), &[Pixel(9)]),
            other => panic!("expected full frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_size_payload_is_corrupt() {
        let (client, mut server) = tokio::io::duplex(1 << 16);
        handshake::send_handshake(&mut server, Resolution::new(4, 1))
            .await
            .unwrap();
        let mut receiver = StreamReceiver::from_stream(client).await.unwrap();
        write_update(&mut server, &Frame::new(4, 2)).await;

        assert!(matches!(
            receiver.receive().await,
            Err(PaneError::CorruptFrame {
                expected: 16,
                actual: 32
            })
        ));
    }
}
