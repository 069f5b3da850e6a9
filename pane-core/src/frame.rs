//! Shared frame types used on both ends of the stream.
//!
//! A [`Frame`] is a dense, row-major grid of 32-bit [`Pixel`]s whose length
//! always equals `width * height`. A [`DeltaFrame`] has the same shape but
//! uses each pixel's top byte as a change flag.
//!
//! The only place bytes become pixels (and back) is
//! [`Frame::from_bytes`] / [`Frame::write_to`].

use bytes::{BufMut, BytesMut};

use crate::error::{PaneError, Result};

/// Bytes occupied by one pixel on the wire.
pub const BYTES_PER_PIXEL: usize = 4;

/// Number of pixels in a `width x height` grid.
pub const fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Serialized size in bytes of a `width x height` frame.
pub const fn frame_byte_len(width: u32, height: u32) -> usize {
    pixel_count(width, height) * BYTES_PER_PIXEL
}

// ── Pixel ────────────────────────────────────────────────────────

/// One 32-bit pixel made of four interleaved 8-bit channels.
///
/// Layout of the value: `A << 24 | R << 16 | G << 8 | B`. Serialized
/// little-endian, so the byte order on the wire is B, G, R, A (the BGRA
/// layout screen capture produces).
///
/// In a delta frame the alpha byte is a change flag: [`Pixel::CHANGED`]
/// marks a pixel whose low 24 bits carry a new colour, anything else means
/// "unchanged".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Pixel(pub u32);

impl Pixel {
    /// Top-byte value flagging a changed pixel in a delta frame.
    pub const CHANGED: u8 = 0xFF;

    const COLOR_MASK: u32 = 0x00FF_FFFF;

    /// Build a pixel from its four channels.
    pub const fn from_bgra(b: u8, g: u8, r: u8, a: u8) -> Self {
        Pixel(u32::from_le_bytes([b, g, r, a]))
    }

    /// Decode a pixel from its wire bytes.
    pub const fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Pixel(u32::from_le_bytes(bytes))
    }

    /// Wire bytes of this pixel.
    pub const fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Raw 32-bit value.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The top (alpha / flag) byte.
    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The low 24 colour bits.
    pub const fn color(self) -> u32 {
        self.0 & Self::COLOR_MASK
    }

    /// Same colour with a different top byte.
    pub const fn with_alpha(self, alpha: u8) -> Self {
        Pixel(self.color() | (alpha as u32) << 24)
    }

    /// Whether this delta pixel carries a change.
    pub const fn is_changed(self) -> bool {
        self.alpha() == Self::CHANGED
    }
}

impl From<u32> for Pixel {
    fn from(value: u32) -> Self {
        Pixel(value)
    }
}

// ── Frame ────────────────────────────────────────────────────────

/// A full image at a fixed resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

impl Frame {
    /// An all-zero frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Pixel::default())
    }

    /// A frame with every pixel set to `pixel`.
    pub fn filled(width: u32, height: u32, pixel: Pixel) -> Self {
        Self {
            width,
            height,
            pixels: vec![pixel; pixel_count(width, height)],
        }
    }

    /// Wrap an existing pixel vector. Fails if its length is not
    /// `width * height`.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Pixel>) -> Result<Self> {
        let expected = pixel_count(width, height);
        if pixels.len() != expected {
            return Err(PaneError::CorruptFrame {
                expected: expected * BYTES_PER_PIXEL,
                actual: pixels.len() * BYTES_PER_PIXEL,
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Convenience constructor from raw 32-bit values.
    pub fn from_values(width: u32, height: u32, values: &[u32]) -> Result<Self> {
        Self::from_pixels(width, height, values.iter().copied().map(Pixel).collect())
    }

    /// Deserialize a frame from its wire bytes.
    ///
    /// Returns [`PaneError::CorruptFrame`] unless `bytes.len()` is exactly
    /// `width * height * 4`.
    pub fn from_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self> {
        let expected = frame_byte_len(width, height);
        if bytes.len() != expected {
            return Err(PaneError::CorruptFrame {
                expected,
                actual: bytes.len(),
            });
        }
        let pixels = bytes
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|c| Pixel::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Serialize into `buf` (row-major, 4 bytes per pixel).
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.reserve(self.byte_len());
        for p in &self.pixels {
            buf.put_u32_le(p.0);
        }
    }

    /// Serialize into a fresh buffer.
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.byte_len());
        self.write_to(&mut buf);
        buf
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Serialized size in bytes.
    pub fn byte_len(&self) -> usize {
        self.pixels.len() * BYTES_PER_PIXEL
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Pixel] {
        &mut self.pixels
    }

    /// The pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        self.pixels[self.index(x, y)]
    }

    /// Overwrite the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: Pixel) {
        let i = self.index(x, y);
        self.pixels[i] = pixel;
    }

    /// Returns a row of pixels.
    pub fn row(&self, y: u32) -> &[Pixel] {
        let start = y as usize * self.width as usize;
        &self.pixels[start..start + self.width as usize]
    }

    /// Overwrite every pixel with `other`'s. Both frames must share
    /// dimensions.
    pub fn copy_from(&mut self, other: &Frame) -> Result<()> {
        self.check_same_shape(other)?;
        self.pixels.copy_from_slice(&other.pixels);
        Ok(())
    }

    /// Nearest-neighbour rescale to `width x height`.
    ///
    /// Returns a clone when the dimensions already match.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        let mut out = Frame::new(width, height);
        if self.is_empty() {
            return out;
        }
        for y in 0..height {
            let sy = (y as u64 * self.height as u64 / height as u64) as u32;
            let src = self.row(sy);
            let start = y as usize * width as usize;
            let dst = &mut out.pixels[start..start + width as usize];
            for (x, px) in dst.iter_mut().enumerate() {
                let sx = (x as u64 * self.width as u64 / width as u64) as usize;
                *px = src[sx];
            }
        }
        out
    }

    /// Error unless `other` has the same dimensions.
    pub fn check_same_shape(&self, other: &Frame) -> Result<()> {
        if self.dimensions() != other.dimensions() {
            return Err(PaneError::DimensionMismatch {
                expected: self.dimensions(),
                actual: other.dimensions(),
            });
        }
        Ok(())
    }

    fn index(&self, x: u32, y: u32) -> usize {
        assert!(x < self.width && y < self.height, "pixel ({x},{y}) out of bounds");
        y as usize * self.width as usize + x as usize
    }
}

// ── DeltaFrame ───────────────────────────────────────────────────

/// A frame-shaped sparse update. Pixels whose top byte is
/// [`Pixel::CHANGED`] carry a new colour; all others are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaFrame(Frame);

impl DeltaFrame {
    /// Reinterpret a frame as a delta (the wire does not distinguish them).
    pub fn from_frame(frame: Frame) -> Self {
        DeltaFrame(frame)
    }

    pub fn as_frame(&self) -> &Frame {
        &self.0
    }

    pub fn into_frame(self) -> Frame {
        self.0
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn pixels(&self) -> &[Pixel] {
        self.0.pixels()
    }

    /// Number of flagged pixels.
    pub fn changed_count(&self) -> usize {
        self.0.pixels.iter().filter(|p| p.is_changed()).count()
    }

    /// `true` when no pixel is flagged.
    pub fn is_unchanged(&self) -> bool {
        !self.0.pixels.iter().any(|p| p.is_changed())
    }
}

// ── FrameUpdate ──────────────────────────────────────────────────

/// One decoded stream message: the first message of a connection is a full
/// frame, every later one a delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameUpdate {
    Full(Frame),
    Delta(DeltaFrame),
}

impl FrameUpdate {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            FrameUpdate::Full(f) => f.dimensions(),
            FrameUpdate::Delta(d) => d.dimensions(),
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, FrameUpdate::Full(_))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_channels() {
        let p = Pixel::from_bgra(0x33, 0x22, 0x11, 0x80);
        assert_eq!(p.value(), 0x8011_2233);
        assert_eq!(p.alpha(), 0x80);
        assert_eq!(p.color(), 0x0011_2233);
        assert_eq!(p.to_le_bytes(), [0x33, 0x22, 0x11, 0x80]);
        assert_eq!(p.with_alpha(0xFF).value(), 0xFF11_2233);
    }

    #[test]
    fn from_pixels_rejects_wrong_length() {
        let err = Frame::from_pixels(2, 2, vec![Pixel(0); 3]).unwrap_err();
        assert!(matches!(
            err,
            PaneError::CorruptFrame {
                expected: 16,
                actual: 12
            }
        ));
    }

    #[test]
    fn bytes_roundtrip_preserves_pixels() {
        let frame = Frame::from_values(2, 1, &[0x0102_0304, 0xFFAA_BBCC]).unwrap();
        let bytes = frame.to_bytes();
        assert_eq!(&bytes[..4], &[0x04, 0x03, 0x02, 0x01]);
        let back = Frame::from_bytes(2, 1, &bytes).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn from_bytes_size_mismatch_is_corrupt() {
        let err = Frame::from_bytes(4, 1, &[0u8; 12]).unwrap_err();
        assert!(matches!(err, PaneError::CorruptFrame { expected: 16, .. }));
    }

    #[test]
    fn resize_nearest_neighbour() {
        let src = Frame::from_values(2, 2, &[1, 2, 3, 4]).unwrap();
        let up = src.resized(4, 4);
        assert_eq!(up.pixel(0, 0), Pixel(1));
        assert_eq!(up.pixel(3, 0), Pixel(2));
        assert_eq!(up.pixel(0, 3), Pixel(3));
        assert_eq!(up.pixel(3, 3), Pixel(4));

        let down = up.resized(2, 2);
        assert_eq!(down, src);
    }

    #[test]
    fn copy_from_requires_same_shape() {
        let mut a = Frame::new(2, 2);
        let b = Frame::new(3, 1);
        assert!(matches!(
            a.copy_from(&b),
            Err(PaneError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn delta_changed_count() {
        let f = Frame::from_values(3, 1, &[0xFF00_0001, 0, 0x7F00_0000]).unwrap();
        let d = DeltaFrame::from_frame(f);
        assert_eq!(d.changed_count(), 1);
        assert!(!d.is_unchanged());
    }
}
