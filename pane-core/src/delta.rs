//! Per-pixel delta computation between consecutive frames.
//!
//! Every pixel of the captured frame is compared (as a whole 32-bit word,
//! alpha included) against the reference frame. Changed pixels are emitted
//! with their top byte forced to [`Pixel::CHANGED`]; unchanged pixels are
//! emitted as zero. The pass is data-parallel and is split across the rayon
//! pool in fixed-size chunks.

use rayon::prelude::*;

use crate::error::Result;
use crate::frame::{DeltaFrame, Frame, FrameUpdate, Pixel};

/// Pixels handed to one rayon work item.
const CHUNK_PIXELS: usize = 16 * 1024;

const CHANGED_FLAG: u32 = (Pixel::CHANGED as u32) << 24;

/// Compute the delta from `reference` to `current`, then overwrite
/// `reference` with `current`.
///
/// After the call `reference == current`, so the next delta is taken
/// against the frame that was just encoded.
pub fn compute_delta(reference: &mut Frame, current: &Frame) -> Result<DeltaFrame> {
    reference.check_same_shape(current)?;

    let (width, height) = current.dimensions();
    let mut delta = Frame::new(width, height);

    reference
        .pixels_mut()
        .par_chunks_mut(CHUNK_PIXELS)
        .zip(current.pixels().par_chunks(CHUNK_PIXELS))
        .zip(delta.pixels_mut().par_chunks_mut(CHUNK_PIXELS))
        .for_each(|((refs, curs), outs)| {
            for ((r, c), d) in refs.iter_mut().zip(curs).zip(outs.iter_mut()) {
                if *r != *c {
                    *d = Pixel(CHANGED_FLAG | c.color());
                    *r = *c;
                }
            }
        });

    Ok(DeltaFrame::from_frame(delta))
}

// ── DeltaEncoder ─────────────────────────────────────────────────

/// Stateful encoder that owns one session's reference frame.
///
/// The first frame (or the first after [`reset`](Self::reset)) is passed
/// through as a full frame and seeds the reference; every later frame is
/// diffed against it.
#[derive(Debug, Default)]
pub struct DeltaEncoder {
    reference: Option<Frame>,
}

impl DeltaEncoder {
    pub fn new() -> Self {
        Self { reference: None }
    }

    /// Forget the reference so the next frame is sent in full.
    pub fn reset(&mut self) {
        self.reference = None;
    }

    /// Whether a reference frame has been seeded.
    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Turn a captured frame into the next stream update.
    pub fn encode(&mut self, current: Frame) -> Result<FrameUpdate> {
        match &mut self.reference {
            Some(reference) => {
                let delta = compute_delta(reference, &current)?;
                Ok(FrameUpdate::Delta(delta))
            }
            None => {
                self.reference = Some(current.clone());
                Ok(FrameUpdate::Full(current))
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PaneError;

    fn frame(values: &[u32]) -> Frame {
        Frame::from_values(values.len() as u32, 1, values).unwrap()
    }

    #[test]
    fn identical_frames_produce_empty_delta() {
        let a = frame(&[0x1122_3344, 0xFFFF_FFFF, 0, 42]);
        let mut reference = a.clone();
        let delta = compute_delta(&mut reference, &a).unwrap();
        assert!(delta.pixels().iter().all(|p| p.value() == 0));
        assert!(delta.is_unchanged());
    }

    #[test]
    fn changed_pixel_is_flagged_with_new_colour() {
        let mut reference = frame(&[0, 0, 0, 0]);
        let current = frame(&[0x0011_2233, 0, 0, 0]);
        let delta = compute_delta(&mut reference, &current).unwrap();

        let values: Vec<u32> = delta.pixels().iter().map(|p| p.value()).collect();
        assert_eq!(values, vec![0xFF11_2233, 0, 0, 0]);
    }

    #[test]
    fn reference_becomes_current() {
        let mut reference = frame(&[1, 2, 3]);
        let current = frame(&[1, 9, 3]);
        let _ = compute_delta(&mut reference, &current).unwrap();
        assert_eq!(reference, current);
    }

    #[test]
    fn alpha_only_change_is_detected() {
        // Full 32-bit words are compared, so an alpha-only change flags the
        // pixel even though its colour bits are identical.
        let mut reference = frame(&[0x0012_3456]);
        let current = frame(&[0x8012_3456]);
        let delta = compute_delta(&mut reference, &current).unwrap();
        assert_eq!(delta.pixels()[0].value(), 0xFF12_3456);
    }

    #[test]
    fn large_frame_spans_many_chunks() {
        let w = 300;
        let h = 200;
        let mut reference = Frame::new(w, h);
        let mut current = Frame::new(w, h);
        current.set_pixel(w - 1, h - 1, Pixel(0x00AB_CDEF));
        current.set_pixel(0, 0, Pixel(0x0000_0001));

        let delta = compute_delta(&mut reference, &current).unwrap();
        assert_eq!(delta.changed_count(), 2);
        assert_eq!(delta.as_frame().pixel(w - 1, h - 1).value(), 0xFFAB_CDEF);
    }

    #[test]
    fn mismatched_dimensions_rejected() {
        let mut reference = Frame::new(2, 2);
        let current = Frame::new(4, 1);
        assert!(matches!(
            compute_delta(&mut reference, &current),
            Err(PaneError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn encoder_first_frame_is_full() {
        let mut enc = DeltaEncoder::new();
        let update = enc.encode(frame(&[7, 7])).unwrap();
        assert!(update.is_full());
        assert!(enc.has_reference());

        let update = enc.encode(frame(&[7, 8])).unwrap();
        match update {
            FrameUpdate::Delta(d) => assert_eq!(d.changed_count(), 1),
            FrameUpdate::Full(_) => panic!("second frame must be a delta"),
        }
    }

    #[test]
    fn reset_forces_full_frame() {
        let mut enc = DeltaEncoder::new();
        let _ = enc.encode(frame(&[1])).unwrap();
        enc.reset();
        assert!(enc.encode(frame(&[1])).unwrap().is_full());
    }
}
