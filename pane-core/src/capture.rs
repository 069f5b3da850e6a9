//! Server-side collaborator interfaces: frame capture and overlay.
//!
//! Capture follows a **blocking-with-timeout** contract: [`FrameSource::capture`]
//! waits at most the source's own deadline and returns `Ok(None)` when no new
//! frame arrived in time. That is normal and the session loop simply tries
//! again; only genuine backend failures are errors.
//!
//! Every session gets its own source and overlay from a [`CaptureFactory`],
//! so no capture state is ever shared between sessions.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{PaneError, Result};
use crate::frame::Frame;
use crate::handshake::Resolution;

// ── FrameSource ──────────────────────────────────────────────────

/// A per-session producer of captured frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Wait (bounded) for the next captured frame.
    async fn capture(&mut self) -> Result<Option<Frame>>;

    /// Release any per-session capture resources. Called once, when the
    /// session closes.
    async fn release(&mut self) {}
}

// ── Overlay ──────────────────────────────────────────────────────

/// Pure transform applied to every captured frame before diffing.
pub trait Overlay: Send {
    fn annotate(&self, frame: Frame) -> Frame;
}

/// Identity overlay.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOverlay;

impl Overlay for NoOverlay {
    fn annotate(&self, frame: Frame) -> Frame {
        frame
    }
}

// ── CaptureFactory ───────────────────────────────────────────────

/// Creates the collaborators for one session.
pub trait CaptureFactory: Send + Sync + 'static {
    /// A fresh frame source for a session streaming at `resolution`.
    fn source(&self, resolution: Resolution) -> Result<Box<dyn FrameSource>>;

    /// A fresh overlay for that session.
    fn overlay(&self, _resolution: Resolution) -> Box<dyn Overlay> {
        Box::new(NoOverlay)
    }
}

impl<F> CaptureFactory for F
where
    F: Fn(Resolution) -> Result<Box<dyn FrameSource>> + Send + Sync + 'static,
{
    fn source(&self, resolution: Resolution) -> Result<Box<dyn FrameSource>> {
        self(resolution)
    }
}

// ── ChannelSource ────────────────────────────────────────────────

/// A frame source fed through an mpsc channel.
///
/// Lets an embedding application push frames it obtained elsewhere.
/// `capture` waits up to `timeout` for the next frame; once every sender
/// is dropped and the queue is drained the source reports a capture error.
pub struct ChannelSource {
    rx: mpsc::Receiver<Frame>,
    timeout: Duration,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it.
    pub fn new(capacity: usize, timeout: Duration) -> (mpsc::Sender<Frame>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx, timeout })
    }
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn capture(&mut self) -> Result<Option<Frame>> {
        match tokio::time::timeout(self.timeout, self.rx.recv()).await {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => Err(PaneError::Capture("frame channel closed".into())),
            Err(_) => Ok(None),
        }
    }

    async fn release(&mut self) {
        self.rx.close();
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_source_yields_pushed_frames() {
        let (tx, mut src) = ChannelSource::new(4, Duration::from_millis(50));
        tx.send(Frame::new(2, 2)).await.unwrap();
        let frame = src.capture().await.unwrap();
        assert_eq!(frame.unwrap().dimensions(), (2, 2));
    }

    #[tokio::test]
    async fn channel_source_times_out_with_none() {
        let (_tx, mut src) = ChannelSource::new(4, Duration::from_millis(10));
        assert!(src.capture().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn channel_source_errors_when_closed() {
        let (tx, mut src) = ChannelSource::new(4, Duration::from_millis(10));
        drop(tx);
        assert!(matches!(src.capture().await, Err(PaneError::Capture(_))));
    }

    #[test]
    fn closure_is_a_factory() {
        let factory = |res: Resolution| -> Result<Box<dyn FrameSource>> {
            let (_tx, src) = ChannelSource::new(1, Duration::from_millis(1));
            let _ = res;
            Ok(Box::new(src))
        };
        assert!(factory.source(Resolution::new(1, 1)).is_ok());
        let overlay = factory.overlay(Resolution::new(1, 1));
        assert_eq!(overlay.annotate(Frame::new(1, 1)), Frame::new(1, 1));
    }
}
