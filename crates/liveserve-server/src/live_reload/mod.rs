//! Live reload transports.
//!
//! Bridges the filesystem watcher into the engine and exposes the poll and
//! WebSocket endpoints browsers use to learn about changes.

mod polling;
mod watcher;
mod websocket;

pub(crate) use polling::{poll, poll_root};
pub(crate) use watcher::{WatchHandle, watch};
pub(crate) use websocket::ws_handler;
