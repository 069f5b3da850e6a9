//! Headless presenter.
//!
//! Logs a blake3 digest of the back-buffer and the receive rate at a fixed
//! interval instead of drawing to a window. Useful on servers, in CI, and
//! for checking that two viewers of the same stream agree pixel for pixel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use pane_core::{Frame, FrameStats, Presenter};
use tokio::sync::watch;
use tracing::info;

/// Hex digits of the digest shown in reports.
const DIGEST_PREFIX: usize = 16;

/// blake3 digest of the frame's wire bytes (row-major, little-endian).
pub fn checksum(frame: &Frame) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&frame.to_bytes());
    hasher.finalize()
}

/// Presenter that reports instead of drawing.
pub struct LogPresenter {
    interval: Duration,
    last_report: Instant,
    shown: u64,
    last_checksum: Option<blake3::Hash>,
    quit: Arc<AtomicBool>,
    stats: Option<watch::Receiver<FrameStats>>,
}

impl LogPresenter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_report: Instant::now(),
            shown: 0,
            last_checksum: None,
            quit: Arc::new(AtomicBool::new(false)),
            stats: None,
        }
    }

    /// Include the client's frame statistics in reports.
    pub fn with_stats(mut self, stats: watch::Receiver<FrameStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Set to `true` to make the client loop quit after the current frame.
    pub fn quit_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }

    /// Frames shown so far.
    pub fn shown(&self) -> u64 {
        self.shown
    }

    /// Digest computed at the last report.
    pub fn last_checksum(&self) -> Option<blake3::Hash> {
        self.last_checksum
    }

    fn report(&mut self, frame: &Frame) {
        let sum = checksum(frame);
        self.last_checksum = Some(sum);
        let hex = sum.to_hex();
        let digest = &hex[..DIGEST_PREFIX];
        match &self.stats {
            Some(stats) => {
                let stats = stats.borrow();
                info!(
                    frames = self.shown,
                    fps = stats.fps,
                    bytes = stats.total_bytes,
                    changed = stats.changed_pixels,
                    "back-buffer {digest}"
                );
            }
            None => info!(frames = self.shown, "back-buffer {digest}"),
        }
    }
}

impl Presenter for LogPresenter {
    fn show(&mut self, frame: &Frame) -> pane_core::Result<()> {
        self.shown += 1;
        if self.shown == 1 || self.last_report.elapsed() >= self.interval {
            self.report(frame);
            self.last_report = Instant::now();
        }
        Ok(())
    }

    fn poll_quit(&mut self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }
}
