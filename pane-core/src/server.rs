//! TCP acceptor that spawns one streaming session per client.
//!
//! Sessions are independent: each gets its own socket, capture source,
//! overlay and reference frame, and a failure in one never touches the
//! others. The only shared state is the `running` flag.
//!
//! Shutdown: clearing the flag (via [`ScreenServer::stop`] or the handle
//! from [`ScreenServer::stop_handle`]) makes the accept loop exit; every
//! session notices the flag at its next loop boundary; `run` then waits for
//! all sessions to finish before returning.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::capture::CaptureFactory;
use crate::error::Result;
use crate::handshake::Resolution;
use crate::pool::SessionPool;
use crate::session::{SessionConfig, SessionHandler};
use crate::stats::SessionStats;

// ── ScreenServer ─────────────────────────────────────────────────

/// Listens for viewers and streams to each of them.
pub struct ScreenServer {
    listener: TcpListener,
    config: SessionConfig,
    factory: Arc<dyn CaptureFactory>,
    running: Arc<AtomicBool>,
    sessions: Mutex<SessionPool>,
}

impl ScreenServer {
    /// Bind the listening socket.
    ///
    /// A bind failure is returned to the caller. The server counts as
    /// running from here on, so a stop requested before [`run`](Self::run)
    /// makes `run` return immediately.
    pub async fn bind<A, F>(addr: A, config: SessionConfig, factory: F) -> Result<Self>
    where
        A: ToSocketAddrs,
        F: CaptureFactory,
    {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            config,
            factory: Arc::new(factory),
            running: Arc::new(AtomicBool::new(true)),
            sessions: Mutex::new(SessionPool::new()),
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn resolution(&self) -> Resolution {
        self.config.resolution
    }

    /// Accept clients until stopped, then wait for every session to end.
    pub async fn run(&self) -> Result<()> {
        let addr = self.local_addr()?;
        info!(
            resolution = %self.config.resolution,
            "screen server listening on {addr}"
        );

        while self.is_running() {
            let accept = tokio::select! {
                result = self.listener.accept() => result,
                _ = Self::wait_for_stop(&self.running) => break,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            info!("viewer connected from {peer}");
            if let Err(e) = self.start_session(stream, peer).await {
                warn!("could not start session for {peer}: {e}");
            }
        }

        let mut sessions = self.sessions.lock().await;
        info!("stopping; waiting for {} session(s)", sessions.len());
        sessions.join_all().await;
        info!("screen server stopped");
        Ok(())
    }

    /// Signal the server and all of its sessions to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// A handle that stops the server when set to `false`.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        sessions.reap();
        sessions.len()
    }

    /// Stats of every live session, ordered by session id.
    pub async fn session_stats(&self) -> Vec<(u64, SocketAddr, SessionStats)> {
        let mut sessions = self.sessions.lock().await;
        sessions.reap();
        sessions.stats()
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn start_session(&self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed for {peer}: {e}");
        }

        let resolution = self.config.resolution;
        let source = self.factory.source(resolution)?;
        let overlay = self.factory.overlay(resolution);

        let mut sessions = self.sessions.lock().await;
        sessions.reap();
        let id = sessions.next_id();
        let handler = SessionHandler::new(
            id,
            stream,
            source,
            overlay,
            self.config.clone(),
            Arc::clone(&self.running),
        );
        let stats = handler.stats_receiver();
        sessions.spawn(id, peer, stats, handler.run());
        debug!(session = id, "session started for {peer}");
        Ok(())
    }

    /// Poll the running flag until it is cleared.
    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{ChannelSource, FrameSource};
    use crate::error::PaneError;

    fn idle_factory(_: Resolution) -> Result<Box<dyn FrameSource>> {
        let (tx, source) = ChannelSource::new(1, Duration::from_millis(10));
        // Hold the sender until the session releases the source.
        tokio::spawn(async move {
            tx.closed().await;
        });
        Ok(Box::new(source))
    }

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let server = ScreenServer::bind(
            "127.0.0.1:0",
            SessionConfig::new(Resolution::new(2, 2)),
            idle_factory,
        )
        .await
        .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert!(server.is_running());
        assert_eq!(server.resolution(), Resolution::new(2, 2));
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let first = ScreenServer::bind(
            "127.0.0.1:0",
            SessionConfig::new(Resolution::new(2, 2)),
            idle_factory,
        )
        .await
        .unwrap();
        let taken = first.local_addr().unwrap();
        let second = ScreenServer::bind(
            taken,
            SessionConfig::new(Resolution::new(2, 2)),
            idle_factory,
        )
        .await;
        assert!(matches!(second, Err(PaneError::Connection(_))));
    }

    #[tokio::test]
    async fn stop_before_run_returns_promptly() {
        let server = ScreenServer::bind(
            "127.0.0.1:0",
            SessionConfig::new(Resolution::new(2, 2)),
            idle_factory,
        )
        .await
        .unwrap();
        server.stop();
        tokio::time::timeout(Duration::from_secs(2), server.run())
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(server.session_count().await, 0);
    }
}
