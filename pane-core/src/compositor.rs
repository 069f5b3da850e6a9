//! Applies frame updates to the viewer's back-buffer.
//!
//! A full frame replaces the buffer. For a delta, every pixel whose alpha
//! byte is [`Pixel::CHANGED`] overwrites the corresponding back-buffer
//! pixel with its colour and the display alpha; every other back-buffer
//! pixel is left alone.
//!
//! The per-pixel work runs on the compositor's own rayon pool. `apply`
//! returns only after every worker is done, so there is never composition
//! in flight once it returns.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{PaneError, Result};
use crate::frame::{DeltaFrame, Frame, FrameUpdate, Pixel};
use crate::handshake::Resolution;

/// Pixels handed to one worker at a time.
const CHUNK_PIXELS: usize = 16 * 1024;

/// Alpha written into composed pixels unless configured otherwise.
pub const DEFAULT_DISPLAY_ALPHA: u8 = 0xFF;

/// Compose `delta` onto `back` in place.
///
/// Both slices must have the same length.
pub fn composite(back: &mut [Pixel], delta: &[Pixel], display_alpha: u8) {
    debug_assert_eq!(back.len(), delta.len());
    back.par_chunks_mut(CHUNK_PIXELS)
        .zip(delta.par_chunks(CHUNK_PIXELS))
        .for_each(|(outs, ins)| {
            for (out, d) in outs.iter_mut().zip(ins) {
                if d.is_changed() {
                    *out = d.with_alpha(display_alpha);
                }
            }
        });
}

/// Owns the back-buffer and the worker pool that updates it.
pub struct Compositor {
    back_buffer: Frame,
    display_alpha: u8,
    pool: ThreadPool,
    loaded: bool,
}

impl Compositor {
    /// Create a compositor for `resolution`.
    ///
    /// `workers == 0` lets rayon pick one worker per core.
    pub fn new(resolution: Resolution, workers: usize, display_alpha: u8) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("pane-compose-{i}"))
            .build()
            .map_err(|e| PaneError::Other(format!("compositor pool: {e}")))?;
        Ok(Self {
            back_buffer: Frame::new(resolution.width, resolution.height),
            display_alpha,
            pool,
            loaded: false,
        })
    }

    pub fn back_buffer(&self) -> &Frame {
        &self.back_buffer
    }

    pub fn display_alpha(&self) -> u8 {
        self.display_alpha
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Whether a full frame has been loaded yet.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Replace the back-buffer with a full frame.
    pub fn load_full(&mut self, frame: &Frame) -> Result<()> {
        self.back_buffer.copy_from(frame)?;
        self.loaded = true;
        Ok(())
    }

    /// Compose a delta onto the back-buffer.
    pub fn apply_delta(&mut self, delta: &DeltaFrame) -> Result<()> {
        self.back_buffer.check_same_shape(delta.as_frame())?;
        let alpha = self.display_alpha;
        let back = self.back_buffer.pixels_mut();
        self.pool.install(|| composite(back, delta.pixels(), alpha));
        Ok(())
    }

    /// Apply any update and return the resulting back-buffer.
    pub fn apply(&mut self, update: &FrameUpdate) -> Result<&Frame> {
        match update {
            FrameUpdate::Full(frame) => self.load_full(frame)?,
            FrameUpdate::Delta(delta) => self.apply_delta(delta)?,
        }
        Ok(&self.back_buffer)
    }
}

// ── Tests ────────────────────────────────────────────────────────
