//! One-shot resolution handshake.
//!
//! Before any framed message, the server writes the ASCII text
//! `"<width>x<height>"` in a single write, with no length prefix and no
//! terminator. The client performs one read of up to
//! [`HANDSHAKE_BUFFER_SIZE`] bytes and parses it.
//!
//! If that read also picked up the start of the first framed message, the
//! extra bytes are handed back to the caller. This is unambiguous because
//! the first byte of a length prefix is always below `b'0'` (see
//! [`MAX_MESSAGE_SIZE`]).

use std::fmt;
use std::str::FromStr;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::MAX_MESSAGE_SIZE;
use crate::error::{PaneError, Result};
use crate::frame::BYTES_PER_PIXEL;

/// Size of the single handshake read.
pub const HANDSHAKE_BUFFER_SIZE: usize = 1024;

/// Separator between width and height.
pub const SEPARATOR: char = 'x';

/// Largest raw (uncompressed) frame a handshake may announce.
pub const MAX_FRAME_BYTES: usize = MAX_MESSAGE_SIZE;

const _: () = assert!(MAX_MESSAGE_SIZE >> 24 < b'0' as usize);

/// Stream resolution agreed at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Handshake text, e.g. `"1920x1080"`.
    pub fn to_handshake(&self) -> String {
        self.to_string()
    }

    /// Parse handshake text. Anything but two positive decimal integers
    /// joined by a single `x` is a [`PaneError::Protocol`], as is a
    /// resolution whose raw frame would exceed [`MAX_FRAME_BYTES`].
    pub fn parse(text: &str) -> Result<Self> {
        let malformed = || PaneError::Protocol(format!("malformed handshake {text:?}"));

        let (w, h) = text.split_once(SEPARATOR).ok_or_else(malformed)?;
        let width: u32 = w.parse().map_err(|_| malformed())?;
        let height: u32 = h.parse().map_err(|_| malformed())?;
        if width == 0 || height == 0 {
            return Err(malformed());
        }

        let frame_bytes = (width as u64)
            .checked_mul(height as u64)
            .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL as u64));
        match frame_bytes {
            Some(n) if n <= MAX_FRAME_BYTES as u64 => Ok(Self { width, height }),
            _ => Err(PaneError::Protocol(format!(
                "handshake resolution {width}x{height} exceeds {MAX_FRAME_BYTES} bytes per frame"
            ))),
        }
    }

    /// Pixel count at this resolution.
    pub fn pixel_count(&self) -> usize {
        crate::frame::pixel_count(self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.width, SEPARATOR, self.height)
    }
}

impl FromStr for Resolution {
    type Err = PaneError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

// ── I/O ──────────────────────────────────────────────────────────

/// Write the handshake text in a single write.
pub async fn send_handshake<W>(writer: &mut W, resolution: Resolution) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(resolution.to_handshake().as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read and parse the handshake.
///
/// Returns the resolution plus any bytes that followed the handshake text
/// in the same read (the beginning of the framed stream).
pub async fn read_handshake<R>(reader: &mut R) -> Result<(Resolution, BytesMut)>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; HANDSHAKE_BUFFER_SIZE];
    let n = reader.read(&mut buf).await?;
    if n == 0 {
        return Err(PaneError::Protocol(
            "connection closed before handshake".into(),
        ));
    }

    let received = &buf[..n];
    let end = received
        .iter()
        .position(|b| !(b.is_ascii_digit() || *b == SEPARATOR as u8))
        .unwrap_or(n);

    let malformed = || {
        PaneError::Protocol(format!(
            "malformed handshake {:?}",
            String::from_utf8_lossy(received)
        ))
    };
    let text = std::str::from_utf8(&received[..end]).map_err(|_| malformed())?;
    let resolution = Resolution::parse(text).map_err(|_| malformed())?;

    Ok((resolution, BytesMut::from(&received[end..])))
}

// ── Tests ────────────────────────────────────────────────────────
