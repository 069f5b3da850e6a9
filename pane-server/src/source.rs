//! Synthetic capture backend.
//!
//! Renders an animated test pattern at the configured frame rate: a static
//! gradient with a bright bar sweeping left to right. Stands in for a
//! platform screen grabber and exercises the delta path realistically,
//! since only the columns the bar touches change between frames.

use std::time::Duration;

use async_trait::async_trait;
use pane_core::{CaptureFactory, Frame, FrameSource, NoOverlay, Overlay, Pixel, Resolution};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::debug;

use crate::overlay::StatusBadge;

/// Width of the sweeping bar in pixels.
const BAR_WIDTH: u32 = 24;

/// Columns the bar advances per frame.
const BAR_STEP: u32 = 8;

// ── SyntheticSource ──────────────────────────────────────────────

/// Animated test-pattern source, one per session.
pub struct SyntheticSource {
    background: Frame,
    period: Duration,
    ticker: Option<Interval>,
    timeout: Duration,
    frame_index: u64,
}

impl SyntheticSource {
    pub fn new(resolution: Resolution, fps: u32, timeout: Duration) -> Self {
        Self {
            background: gradient(resolution),
            period: Duration::from_secs(1) / fps.max(1),
            ticker: None,
            timeout,
            frame_index: 0,
        }
    }

    /// Frame `index` of the animation.
    pub fn render(&self, index: u64) -> Frame {
        let mut frame = self.background.clone();
        let width = frame.width();
        let x0 = (index * BAR_STEP as u64 % width as u64) as u32;
        let bar = Pixel::from_bgra(0xF0, 0xF0, 0xF0, 0xFF);
        for y in 0..frame.height() {
            for dx in 0..BAR_WIDTH.min(width) {
                frame.set_pixel((x0 + dx) % width, y, bar);
            }
        }
        frame
    }
}

#[async_trait]
impl FrameSource for SyntheticSource {
    async fn capture(&mut self) -> pane_core::Result<Option<Frame>> {
        let period = self.period;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });
        if tokio::time::timeout(self.timeout, ticker.tick()).await.is_err() {
            return Ok(None);
        }
        let frame = self.render(self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }

    async fn release(&mut self) {
        debug!(frames = self.frame_index, "synthetic source released");
    }
}

/// Opaque diagonal gradient.
fn gradient(resolution: Resolution) -> Frame {
    let Resolution { width, height } = resolution;
    let mut frame = Frame::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            frame.set_pixel(x, y, Pixel::from_bgra(0x40, g, r, 0xFF));
        }
    }
    frame
}

// ── SyntheticFactory ─────────────────────────────────────────────

/// Creates a fresh [`SyntheticSource`] (and optionally a
/// [`StatusBadge`]) for every session.
#[derive(Debug, Clone)]
pub struct SyntheticFactory {
    pub fps: u32,
    pub capture_timeout: Duration,
    pub overlay: bool,
}

impl CaptureFactory for SyntheticFactory {
    fn source(&self, resolution: Resolution) -> pane_core::Result<Box<dyn FrameSource>> {
        Ok(Box::new(SyntheticSource::new(
            resolution,
            self.fps,
            self.capture_timeout,
        )))
    }

    fn overlay(&self, _resolution: Resolution) -> Box<dyn Overlay> {
        if self.overlay {
            Box::new(StatusBadge::new())
        } else {
            Box::new(NoOverlay)
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
