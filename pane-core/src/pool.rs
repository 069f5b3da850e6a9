//! Bookkeeping for spawned session tasks.
//!
//! Every session runs on its own tokio task. The pool keeps the join
//! handles so the server can wait for all of them at shutdown, and a
//! finished-event channel so entries of sessions that ended on their own
//! are removed without polling every handle.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::Result;
use crate::stats::SessionStats;

/// Emitted by a session task when it ends.
#[derive(Debug)]
pub enum SessionEvent {
    Finished(u64),
    Error(u64, String),
}

impl SessionEvent {
    pub fn id(&self) -> u64 {
        match self {
            SessionEvent::Finished(id) | SessionEvent::Error(id, _) => *id,
        }
    }
}

/// A running session as seen by the server.
pub struct SessionHandle {
    id: u64,
    peer: SocketAddr,
    stats: watch::Receiver<SessionStats>,
    handle: JoinHandle<()>,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Latest published stats.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }

    /// Wait for the session task to end.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!(session = self.id, "session task panicked: {e}");
        }
    }
}

/// Tracks session tasks by id.
pub struct SessionPool {
    sessions: HashMap<u64, SessionHandle>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    next_id: u64,
}

impl SessionPool {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            sessions: HashMap::new(),
            events_rx,
            events_tx,
            next_id: 1,
        }
    }

    /// Allocate the id for the next session.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Spawn `session` on the runtime and track it under `id`.
    ///
    /// The outcome is logged: a peer that went away is routine, anything
    /// else is a warning. Either way only this session is affected.
    pub fn spawn<F>(
        &mut self,
        id: u64,
        peer: SocketAddr,
        stats: watch::Receiver<SessionStats>,
        session: F,
    ) where
        F: Future<Output = Result<SessionStats>> + Send + 'static,
    {
        let events_tx = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            let event = match session.await {
                Ok(_) => SessionEvent::Finished(id),
                Err(e) if e.is_disconnect() => {
                    info!(session = id, %peer, "client disconnected: {e}");
                    SessionEvent::Finished(id)
                }
                Err(e) => {
                    warn!(session = id, %peer, "session failed: {e}");
                    SessionEvent::Error(id, e.to_string())
                }
            };
            let _ = events_tx.send(event);
        });

        self.sessions.insert(
            id,
            SessionHandle {
                id,
                peer,
                stats,
                handle,
            },
        );
    }

    /// Drop the entries of sessions that have ended. Returns how many
    /// were removed.
    pub fn reap(&mut self) -> usize {
        let mut removed = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            if self.sessions.remove(&event.id()).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Number of tracked sessions (running, or ended but not yet reaped).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Stats of every tracked session, ordered by id.
    pub fn stats(&self) -> Vec<(u64, SocketAddr, SessionStats)> {
        let mut all: Vec<_> = self
            .sessions
            .values()
            .map(|s| (s.id, s.peer, s.stats()))
            .collect();
        all.sort_by_key(|(id, _, _)| *id);
        all
    }

    /// Remove every session handle so the caller can join them.
    pub fn drain(&mut self) -> Vec<SessionHandle> {
        while self.events_rx.try_recv().is_ok() {}
        self.sessions.drain().map(|(_, s)| s).collect()
    }

    /// Wait for every tracked session to end.
    pub async fn join_all(&mut self) {
        for session in self.drain() {
            session.join().await;
        }
    }
}

impl Default for SessionPool {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────
