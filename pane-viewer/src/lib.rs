//! # pane-viewer
//!
//! Viewer for the pane protocol: connects to a server, composes the
//! stream of delta frames onto a back-buffer and presents it.

pub mod config;
pub mod presenter;
