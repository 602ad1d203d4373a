//! Reload registries, one per transport.
//!
//! The pull variant queues reload targets until a page polls for them; the
//! push variant tracks connected tabs and fans updates out immediately.

mod listeners;
mod pending;

pub use listeners::{ListenerId, ListenerSet, ListenerState};
pub use pending::PendingReloads;
