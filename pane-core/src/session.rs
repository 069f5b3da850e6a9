//! Per-client session: handshake, then capture → overlay → diff → send.
//!
//! ```text
//! Handshake ──(resolution sent)──► Streaming ──(stop / error)──► Closed
//! ```
//!
//! A session exclusively owns its socket, its capture collaborators and its
//! reference frame (inside [`DeltaEncoder`]). The only thing it shares is
//! the server's `running` flag, which it reads once per loop iteration.
//! An iteration suspends only while capturing and while sending, so a stop
//! request is honoured after the in-flight message has been written.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::SinkExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio_util::codec::FramedWrite;
use tracing::{debug, info};

use crate::capture::{FrameSource, Overlay};
use crate::codec::{self, MessageCodec};
use crate::delta::DeltaEncoder;
use crate::error::{PaneError, Result};
use crate::frame::{Frame, FrameUpdate};
use crate::handshake::{self, Resolution};
use crate::stats::{RateCounter, SessionStats};

// ── SessionConfig ────────────────────────────────────────────────

/// Settings shared by every session of a server.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Resolution announced in the handshake and streamed.
    pub resolution: Resolution,
    /// Deadline for writing one message; `None` waits forever.
    pub send_timeout: Option<Duration>,
    /// How often the frame rate is logged and published.
    pub report_interval: Duration,
}

impl SessionConfig {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            send_timeout: Some(Duration::from_secs(5)),
            report_interval: Duration::from_secs(1),
        }
    }
}

// ── SessionPhase ─────────────────────────────────────────────────

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Handshake,
    Streaming,
    Closed,
}

// ── SessionHandler ───────────────────────────────────────────────

/// Owns one client connection for its whole lifetime.
pub struct SessionHandler<W> {
    id: u64,
    writer: FramedWrite<W, MessageCodec>,
    source: Box<dyn FrameSource>,
    overlay: Box<dyn Overlay>,
    encoder: Option<DeltaEncoder>,
    config: SessionConfig,
    running: Arc<AtomicBool>,
    phase: SessionPhase,
    rate: RateCounter,
    stats: SessionStats,
    stats_tx: watch::Sender<SessionStats>,
}

impl<W> SessionHandler<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create a session over `stream`.
    ///
    /// `running` is the server-wide stop flag; the session streams while it
    /// is `true`.
    pub fn new(
        id: u64,
        stream: W,
        source: Box<dyn FrameSource>,
        overlay: Box<dyn Overlay>,
        config: SessionConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        let (stats_tx, _) = watch::channel(SessionStats::default());
        Self {
            id,
            writer: FramedWrite::new(stream, MessageCodec::new()),
            source,
            overlay,
            encoder: Some(DeltaEncoder::new()),
            config,
            running,
            phase: SessionPhase::Handshake,
            rate: RateCounter::new(),
            stats: SessionStats::default(),
            stats_tx,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Receiver for periodic [`SessionStats`] snapshots.
    pub fn stats_receiver(&self) -> watch::Receiver<SessionStats> {
        self.stats_tx.subscribe()
    }

    /// Run the session to completion.
    ///
    /// Always ends in [`SessionPhase::Closed`]: the capture source is
    /// released and the socket shut down whether streaming stopped because
    /// of the stop flag or because of an error. The error, if any, is
    /// returned for the caller to log.
    pub async fn run(mut self) -> Result<SessionStats> {
        let result = self.stream().await;
        self.close().await;
        result.map(|()| self.stats.clone())
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn stream(&mut self) -> Result<()> {
        handshake::send_handshake(self.writer.get_mut(), self.config.resolution).await?;
        self.phase = SessionPhase::Streaming;
        debug!(session = self.id, resolution = %self.config.resolution, "handshake sent");

        let mut last_report = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            let Some(captured) = self.source.capture().await? else {
                continue;
            };

            let frame = self.prepare(captured);
            let payload = self.encode(frame).await?;
            let size = payload.len() as u64;
            self.send(payload).await?;

            self.rate.record(size);
            self.stats.total_frames += 1;
            self.stats.total_bytes += size;

            if last_report.elapsed() >= self.config.report_interval {
                self.publish_stats();
                last_report = Instant::now();
            }
        }

        Ok(())
    }

    /// Rescale to the session resolution, then overlay.
    fn prepare(&self, captured: Frame) -> Frame {
        let Resolution { width, height } = self.config.resolution;
        let frame = if captured.dimensions() == (width, height) {
            captured
        } else {
            captured.resized(width, height)
        };
        self.overlay.annotate(frame)
    }

    /// Diff and compress off the async worker threads.
    async fn encode(&mut self, frame: Frame) -> Result<Bytes> {
        let mut encoder = self.encoder.take().unwrap_or_default();
        let (encoder, result) = tokio::task::spawn_blocking(move || {
            let result = encoder.encode(frame).and_then(|update| match update {
                FrameUpdate::Full(f) => codec::encode(&f),
                FrameUpdate::Delta(d) => codec::encode(d.as_frame()),
            });
            (encoder, result)
        })
        .await
        .map_err(|e| PaneError::Other(format!("encode task failed: {e}")))?;
        self.encoder = Some(encoder);
        result
    }

    async fn send(&mut self, payload: Bytes) -> Result<()> {
        match self.config.send_timeout {
            Some(limit) => tokio::time::timeout(limit, self.writer.send(payload))
                .await
                .map_err(|_| PaneError::Timeout(limit))?,
            None => self.writer.send(payload).await,
        }
    }

    fn publish_stats(&mut self) {
        self.stats.fps = self.rate.frames_per_sec();
        self.stats.bytes_per_sec = self.rate.bytes_per_sec();
        info!(
            session = self.id,
            fps = self.stats.fps,
            bytes_per_sec = self.stats.bytes_per_sec,
            "stream rate"
        );
        self.stats_tx.send_replace(self.stats.clone());
    }

    async fn close(&mut self) {
        self.phase = SessionPhase::Closed;
        self.source.release().await;
        if let Err(e) = self.writer.get_mut().shutdown().await {
            debug!(session = self.id, "socket shutdown: {e}");
        }
        self.publish_stats();
        info!(
            session = self.id,
            frames = self.stats.total_frames,
            bytes = self.stats.total_bytes,
            "session closed"
        );
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{ChannelSource, NoOverlay};
    use crate::codec::read_message;
    use crate::frame::{DeltaFrame, Pixel};
    use tokio_util::codec::FramedRead;

    fn running() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(true))
    }

    #[tokio::test]
    async fn streams_full_then_delta() {
        let (client, server) = tokio::io::duplex(1 << 16);
        let (tx, source) = ChannelSource::new(4, Duration::from_millis(20));
        let flag = running();
        let session = SessionHandler::new(
            1,
            server,
            Box::new(source),
            Box::new(NoOverlay),
            SessionConfig::new(Resolution::new(4, 1)),
            flag.clone(),
        );
        let task = tokio::spawn(session.run());

        let mut client = client;
        let (res, rest) = handshake::read_handshake(&mut client).await.unwrap();
        assert_eq!(res, Resolution::new(4, 1));
        let mut reader = FramedRead::new(client, MessageCodec::new());
        reader.read_buffer_mut().extend_from_slice(&rest);

        tx.send(Frame::new(4, 1)).await.unwrap();
        let full = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(codec::decode(&full, 4, 1).unwrap(), Frame::new(4, 1));

        tx.send(Frame::from_values(4, 1, &[0x0011_2233, 0, 0, 0]).unwrap())
            .await
            .unwrap();
        let delta = read_message(&mut reader).await.unwrap().unwrap();
        let delta = DeltaFrame::from_frame(codec::decode(&delta, 4, 1).unwrap());
        assert_eq!(delta.pixels()[0], Pixel(0xFF11_2233));
        assert_eq!(delta.changed_count(), 1);

        flag.store(false, Ordering::SeqCst);
        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.total_frames, 2);
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mismatched_capture_is_rescaled() {
        let (client, server) = tokio::io::duplex(1 << 16);
        let (tx, source) = ChannelSource::new(4, Duration::from_millis(20));
        let flag = running();
        let session = SessionHandler::new(
            2,
            server,
            Box::new(source),
            Box::new(NoOverlay),
            SessionConfig::new(Resolution::new(2, 2)),
            flag.clone(),
        );
        let task = tokio::spawn(session.run());

        let mut client = client;
        let (_, rest) = handshake::read_handshake(&mut client).await.unwrap();
        let mut reader = FramedRead::new(client, MessageCodec::new());
        reader.read_buffer_mut().extend_from_slice(&rest);

        tx.send(Frame::filled(4, 4, Pixel(7))).await.unwrap();
        let full = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(codec::decode(&full, 2, 2).unwrap(), Frame::filled(2, 2, Pixel(7)));

        flag.store(false, Ordering::SeqCst);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn closed_client_ends_session_with_error() {
        let (client, server) = tokio::io::duplex(64);
        let (tx, source) = ChannelSource::new(4, Duration::from_millis(20));
        let session = SessionHandler::new(
            3,
            server,
            Box::new(source),
            Box::new(NoOverlay),
            SessionConfig::new(Resolution::new(64, 64)),
            running(),
        );
        drop(client);
        let task = tokio::spawn(session.run());
        let _ = tx.send(Frame::new(64, 64)).await;

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("session must end")
            .unwrap();
        assert!(matches!(result, Err(PaneError::Connection(_))));
    }

    #[tokio::test]
    async fn stop_flag_ends_idle_session() {
        let (_client, server) = tokio::io::duplex(1024);
        let (_tx, source) = ChannelSource::new(4, Duration::from_millis(10));
        let flag = running();
        let session = SessionHandler::new(
            4,
            server,
            Box::new(source),
            Box::new(NoOverlay),
            SessionConfig::new(Resolution::new(1, 1)),
            flag.clone(),
        );
        assert_eq!(session.phase(), SessionPhase::Handshake);
        let task = tokio::spawn(session.run());
        flag.store(false, Ordering::SeqCst);

        let stats = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("session must stop")
            .unwrap()
            .unwrap();
        assert_eq!(stats.total_frames, 0);
    }
}
