//! Payload compression and length-prefixed message framing.
//!
//! ## Wire format
//!
//! ```text
//! length:  u32 big-endian   (4)
//! payload: [u8; length]     zstd( row-major pixels, 4 bytes each )
//! ```
//!
//! Every payload is compressed on its own; no dictionary or stream state
//! survives from one message to the next.

use std::io::Read;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite};
use tracing::warn;

use crate::error::{PaneError, Result};
use crate::frame::{Frame, frame_byte_len};

// ── Constants ────────────────────────────────────────────────────

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest payload accepted in either direction.
pub const MAX_MESSAGE_SIZE: usize = 512 * 1024 * 1024;

/// zstd level used for every payload (favour speed).
pub const COMPRESSION_LEVEL: i32 = 1;

// ── Payload ──────────────────────────────────────────────────────

/// Serialize and compress a frame (full or delta) into a payload.
pub fn encode(frame: &Frame) -> Result<Bytes> {
    let raw = frame.to_bytes();
    let compressed = zstd::encode_all(raw.as_ref(), COMPRESSION_LEVEL)
        .map_err(|e| PaneError::Other(format!("zstd encode failed: {e}")))?;
    Ok(Bytes::from(compressed))
}

/// Decompress a payload and deserialize it as a `width x height` frame.
///
/// A compressor failure is [`PaneError::Decompress`]; a payload that
/// inflates to anything other than `width * height * 4` bytes is
/// [`PaneError::CorruptFrame`]. Inflation stops one byte past the expected
/// size, so an oversized payload never allocates more than a frame.
pub fn decode(payload: &[u8], width: u32, height: u32) -> Result<Frame> {
    let expected = frame_byte_len(width, height);
    let decompress_err = |e: std::io::Error| PaneError::Decompress(e.to_string());

    let decoder = zstd::stream::read::Decoder::new(payload).map_err(decompress_err)?;
    let mut raw = Vec::with_capacity(expected);
    decoder
        .take(expected as u64 + 1)
        .read_to_end(&mut raw)
        .map_err(decompress_err)?;
    if raw.len() > expected {
        return Err(PaneError::CorruptFrame {
            expected,
            actual: raw.len(),
        });
    }
    Frame::from_bytes(width, height, &raw)
}

/// Prepend the big-endian length prefix to a payload.
pub fn frame_message(payload: &[u8]) -> Result<Bytes> {
    check_len(payload.len(), MAX_MESSAGE_SIZE)?;
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(payload);
    Ok(buf.freeze())
}

fn check_len(len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(PaneError::Protocol(format!(
            "message length {len} exceeds maximum {max}"
        )));
    }
    Ok(())
}

// ── MessageCodec ─────────────────────────────────────────────────

/// `tokio_util` codec for length-prefixed payloads.
///
/// At end of stream:
/// - nothing buffered → clean end-of-stream;
/// - 1–3 bytes of a length prefix → [`PaneError::Protocol`];
/// - a partial payload → end-of-stream (the message is dropped and logged).
#[derive(Debug, Clone)]
pub struct MessageCodec {
    max_len: usize,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self::with_max_len(MAX_MESSAGE_SIZE)
    }

    /// Codec rejecting payloads larger than `max_len`.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len: max_len.min(u32::MAX as usize),
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MessageCodec {
    type Item = Bytes;
    type Error = PaneError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if src.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        check_len(len, self.max_len)?;

        let total = LENGTH_PREFIX_SIZE + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_SIZE);
        Ok(Some(src.split_to(len).freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }
        match src.len() {
            0 => Ok(None),
            n if n < LENGTH_PREFIX_SIZE => Err(PaneError::Protocol(format!(
                "connection closed inside length prefix ({n} of {LENGTH_PREFIX_SIZE} bytes)"
            ))),
            n => {
                warn!("connection closed mid-message; dropping {n} buffered bytes");
                src.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<Bytes> for MessageCodec {
    type Error = PaneError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<()> {
        check_len(payload.len(), self.max_len)?;
        dst.reserve(LENGTH_PREFIX_SIZE + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

// ── Stream helpers ───────────────────────────────────────────────

/// Read one message. `Ok(None)` means the peer closed the stream.
pub async fn read_message<R>(reader: &mut FramedRead<R, MessageCodec>) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    reader.next().await.transpose()
}

/// Write and flush one message.
pub async fn write_message<W>(writer: &mut FramedWrite<W, MessageCodec>, payload: Bytes) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.send(payload).await
}

// ── Tests ────────────────────────────────────────────────────────
