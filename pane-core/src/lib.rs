//! # pane-core
//!
//! Core library for pane, a delta-frame screen streaming protocol.
//!
//! A server captures frames, diffs each one against the previous frame it
//! sent, compresses the result and streams it over TCP. A viewer
//! decompresses every message and composes it onto a persistent
//! back-buffer.
//!
//! This crate contains:
//! - **Frame model**: `Pixel`, `Frame`, `DeltaFrame`, `FrameUpdate`
//! - **Delta**: `compute_delta` and the per-session `DeltaEncoder`
//! - **Codec**: zstd payloads and the length-prefixed `MessageCodec`
//! - **Handshake**: the `"WxH"` resolution exchange
//! - **Server**: `ScreenServer`, `SessionHandler` and the `SessionPool`
//! - **Client**: `StreamReceiver`, `Compositor` and `ScreenClient`
//! - **Error**: `PaneError`, a `thiserror`-based error type

pub mod capture;
pub mod client;
pub mod codec;
pub mod compositor;
pub mod delta;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod pool;
pub mod receiver;
pub mod server;
pub mod session;
pub mod stats;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use capture::{CaptureFactory, ChannelSource, FrameSource, NoOverlay, Overlay};
pub use client::{ClientConfig, FrameStats, Presenter, ScreenClient};
pub use codec::{MAX_MESSAGE_SIZE, MessageCodec};
pub use compositor::{Compositor, DEFAULT_DISPLAY_ALPHA, composite};
pub use delta::{DeltaEncoder, compute_delta};
pub use error::{PaneError, Result};
pub use frame::{DeltaFrame, Frame, FrameUpdate, Pixel};
pub use handshake::Resolution;
pub use pool::{SessionEvent, SessionHandle, SessionPool};
pub use receiver::StreamReceiver;
pub use server::ScreenServer;
pub use session::{SessionConfig, SessionHandler, SessionPhase};
pub use stats::{RateCounter, SessionStats};
