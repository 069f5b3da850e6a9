//! Viewer-side stream consumer.
//!
//! [`ScreenClient`] pulls updates from a [`StreamReceiver`], composes them
//! onto the back-buffer and hands the result to a [`Presenter`]. Frame
//! statistics are published through a `tokio::sync::watch` channel so a UI
//! can read the latest numbers without touching the receive loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::compositor::{Compositor, DEFAULT_DISPLAY_ALPHA};
use crate::error::Result;
use crate::frame::{Frame, FrameUpdate};
use crate::handshake::Resolution;
use crate::receiver::StreamReceiver;
use crate::stats::RateCounter;

// ── Presenter ────────────────────────────────────────────────────

/// Displays composed frames.
pub trait Presenter: Send {
    /// Show the current back-buffer.
    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// Whether the user asked to quit. Polled once per displayed frame.
    fn poll_quit(&mut self) -> bool {
        false
    }
}

// ── FrameStats ───────────────────────────────────────────────────

/// Per-frame statistics exposed to the UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Frames displayed per second over the last second.
    pub fps: f64,
    /// Frames displayed since connecting.
    pub total_frames: u64,
    /// Compressed bytes received since connecting.
    pub total_bytes: u64,
    /// Pixels written by the last update.
    pub changed_pixels: u64,
    pub width: u32,
    pub height: u32,
}

// ── ClientConfig ─────────────────────────────────────────────────

/// Viewer-side settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Compositor worker threads; `0` means one per core.
    pub workers: usize,
    /// Alpha written into every composed pixel.
    pub display_alpha: u8,
    /// Bound on connect + handshake; `None` waits forever.
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            display_alpha: DEFAULT_DISPLAY_ALPHA,
            connect_timeout: Some(Duration::from_secs(5)),
        }
    }
}

// ── ScreenClient ─────────────────────────────────────────────────

/// Receives, composes and presents one stream.
pub struct ScreenClient<R> {
    receiver: StreamReceiver<R>,
    compositor: Compositor,
    running: Arc<AtomicBool>,
    rate: RateCounter,
    stats: FrameStats,
    stats_tx: watch::Sender<FrameStats>,
    stats_rx: watch::Receiver<FrameStats>,
}

impl ScreenClient<TcpStream> {
    /// Connect to a server, read the handshake and size the back-buffer.
    pub async fn connect<A: ToSocketAddrs>(addr: A, config: &ClientConfig) -> Result<Self> {
        let receiver = match config.connect_timeout {
            Some(limit) => StreamReceiver::connect_timeout(addr, limit).await?,
            None => StreamReceiver::connect(addr).await?,
        };
        Self::new(receiver, config)
    }
}

impl<R> ScreenClient<R>
where
    R: AsyncRead + Unpin,
{
    /// Wrap a receiver whose handshake has already been read.
    pub fn new(receiver: StreamReceiver<R>, config: &ClientConfig) -> Result<Self> {
        let resolution = receiver.resolution();
        let compositor = Compositor::new(resolution, config.workers, config.display_alpha)?;
        let stats = FrameStats {
            width: resolution.width,
            height: resolution.height,
            ..Default::default()
        };
        let (stats_tx, stats_rx) = watch::channel(stats.clone());
        info!(
            %resolution,
            workers = compositor.workers(),
            "stream opened"
        );
        Ok(Self {
            receiver,
            compositor,
            running: Arc::new(AtomicBool::new(true)),
            rate: RateCounter::new(),
            stats,
            stats_tx,
            stats_rx,
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.receiver.resolution()
    }

    /// The composed image as of the last applied update.
    pub fn back_buffer(&self) -> &Frame {
        self.compositor.back_buffer()
    }

    /// Obtain a `watch::Receiver` for frame statistics.
    pub fn stats_receiver(&self) -> watch::Receiver<FrameStats> {
        self.stats_rx.clone()
    }

    /// A cloneable stop handle.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Signal the receive loop to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Receive, compose and present until the server closes the stream,
    /// the presenter asks to quit, or [`stop`](Self::stop) is called.
    ///
    /// Each update is decoded and composed to completion before the next
    /// receive, so no composition is in flight when this returns.
    pub async fn run<P: Presenter>(&mut self, presenter: &mut P) -> Result<()> {
        let result = self.receive_loop(presenter).await;
        self.running.store(false, Ordering::SeqCst);
        self.stats_tx.send_replace(self.stats.clone());
        info!(
            frames = self.stats.total_frames,
            bytes = self.stats.total_bytes,
            "stream closed"
        );
        result
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn receive_loop<P: Presenter>(&mut self, presenter: &mut P) -> Result<()> {
        while self.running.load(Ordering::SeqCst) {
            let payload = tokio::select! {
                result = self.receiver.receive_payload() => result?,
                _ = Self::wait_for_stop(&self.running) => break,
            };

            let Some(payload) = payload else {
                info!("server closed the stream");
                break;
            };

            let index = self.receiver.messages_received();
            let receiver = &self.receiver;
            let compositor = &mut self.compositor;
            let changed = run_blocking(|| {
                let update = receiver.decode_update(&payload, index)?;
                let changed = match &update {
                    FrameUpdate::Full(f) => f.len(),
                    FrameUpdate::Delta(d) => d.changed_count(),
                };
                compositor.apply(&update).map(|_| changed)
            })?;
            presenter.show(self.compositor.back_buffer())?;
            self.record(changed as u64);

            if presenter.poll_quit() {
                debug!("presenter requested quit");
                break;
            }
        }
        Ok(())
    }

    fn record(&mut self, changed_pixels: u64) {
        let total_bytes = self.receiver.bytes_received();
        self.rate.record(total_bytes - self.stats.total_bytes);
        self.stats.total_frames += 1;
        self.stats.changed_pixels = changed_pixels;
        self.stats.total_bytes = total_bytes;
        self.stats.fps = self.rate.frames_per_sec();
        self.stats_tx.send_replace(self.stats.clone());
    }

    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Run decode and compose without stalling the other tasks of a
/// multi-threaded runtime. A current-thread runtime cannot hand its worker
/// off, so there the work runs inline.
fn run_blocking<T>(work: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|h| h.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(work),
        _ => work(),
    }
}

// ── Tests ────────────────────────────────────────────────────────
