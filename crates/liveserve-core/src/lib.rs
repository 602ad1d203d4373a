//! Live reload coordination engine.
//!
//! Turns bursty filesystem events into reload signals for the browser tabs
//! displaying affected resources. The pieces compose as follows:
//!
//! ```text
//! WatchEvent ──► Engine::on_event ──► Debouncer (per EventKey)
//!                                          │
//!                                          ▼
//!                              normalize ──► reload targets
//!                                          │
//!                     ┌────────────────────┴───────────────────┐
//!                     ▼                                        ▼
//!            PendingReloads (poll)                   ListenerSet (socket)
//!                     │                                        │
//!          GET /livereload/{path}                 update / moved frames
//! ```
//!
//! The HTTP and WebSocket surfaces live in `liveserve-server`; this crate has
//! no networking of its own.

pub mod debounce;
mod engine;
mod event;
mod inject;
mod message;
mod path;
mod pattern;
mod policy;
mod registry;

pub use debounce::{BoxError, Debouncer};
pub use engine::{Engine, EngineConfig};
pub use event::{EventKey, WatchEvent};
pub use inject::{ReloadMode, UnknownModeError, inject, snippet};
pub use message::{ClientMessage, MovedPaths, ProtocolError, ServerMessage};
pub use path::{
    CanonicalPath, INDEX_FILES, PathEscapeError, SitePath, exists_case_sensitive, is_within,
    normalize, reload_targets, resolve,
};
pub use pattern::{PathPattern, PatternError};
pub use policy::{DefaultReloadPolicy, ReloadPolicy};
pub use registry::{ListenerId, ListenerSet, ListenerState, PendingReloads};

/// Route answering pull-variant polls.
pub const POLL_ENDPOINT: &str = "/livereload";

/// Route accepting push-variant WebSocket connections.
pub const SOCKET_ENDPOINT: &str = "/ws/_live_refresh_";
