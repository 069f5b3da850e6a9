//! # pane-server
//!
//! Screen server for the pane protocol. Accepts viewers over TCP, sends
//! each one the stream resolution, then streams a full frame followed by
//! zstd-compressed delta frames.
//!
//! Frames come from a [`source::SyntheticSource`] per session, optionally
//! stamped with the [`overlay::StatusBadge`].

pub mod config;
pub mod overlay;
pub mod source;
