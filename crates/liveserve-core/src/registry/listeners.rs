//! Connected push clients.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::{Notify, mpsc};

use crate::message::{MovedPaths, ServerMessage};
use crate::path::CanonicalPath;

/// Identifier of one WebSocket connection.
pub type ListenerId = u64;

/// Lifecycle of a listener while it is registered.
///
/// Connections are registered once the upgrade completes, and removed when
/// closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerState {
    /// Upgraded, no `open` frame yet.
    Open,
    /// Sent `open`; receives broadcasts.
    Identified,
    /// Sent `closed`; waiting for the connection to go away.
    Closing,
}

struct Listener {
    identity: Option<CanonicalPath>,
    state: ListenerState,
    sender: mpsc::UnboundedSender<ServerMessage>,
}

/// Registry of push listeners.
///
/// Holds only the sending half of each connection's outbound channel; the
/// connection task owns the socket. Sends never wait on a client.
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<HashMap<ListenerId, Listener>>,
    next_id: AtomicU64,
    departed: Notify,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ListenerId, Listener>> {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ListenerId, Listener>> {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new connection and return its outbound channel.
    pub fn register(&self) -> (ListenerId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.write().insert(
            id,
            Listener {
                identity: None,
                state: ListenerState::Open,
                sender,
            },
        );
        tracing::debug!(listener = id, "Listener connected");
        (id, receiver)
    }

    /// Record the page a listener displays and start sending it broadcasts.
    ///
    /// Returns `false` for unknown or closing listeners.
    pub fn identify(&self, id: ListenerId, identity: CanonicalPath) -> bool {
        let mut listeners = self.write();
        let Some(listener) = listeners.get_mut(&id) else {
            return false;
        };
        if listener.state == ListenerState::Closing {
            return false;
        }
        tracing::debug!(listener = id, path = %identity, "Listener identified");
        listener.identity = Some(identity);
        listener.state = ListenerState::Identified;
        true
    }

    pub fn identity(&self, id: ListenerId) -> Option<CanonicalPath> {
        self.read().get(&id).and_then(|l| l.identity.clone())
    }

    pub fn state(&self, id: ListenerId) -> Option<ListenerState> {
        self.read().get(&id).map(|l| l.state)
    }

    /// Send a frame to one listener.
    pub fn send(&self, id: ListenerId, message: ServerMessage) -> bool {
        self.read()
            .get(&id)
            .is_some_and(|l| l.sender.send(message).is_ok())
    }

    /// Send a frame to every identified listener.
    ///
    /// Listeners whose channel has closed are dropped. Returns the number of
    /// listeners the frame was handed to.
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, listener) in self.read().iter() {
            if listener.state != ListenerState::Identified {
                continue;
            }
            if listener.sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }
        for id in dead {
            self.remove(id);
        }
        delivered
    }

    /// Rewrite identities below `src` to `dest` and broadcast the move.
    pub fn moved(&self, src: &CanonicalPath, dest: &CanonicalPath) -> usize {
        for listener in self.write().values_mut() {
            let rebased = listener
                .identity
                .as_ref()
                .and_then(|identity| identity.rebase(src, dest));
            if let Some(rebased) = rebased {
                listener.identity = Some(rebased);
            }
        }
        self.broadcast(&ServerMessage::Moved(MovedPaths {
            src: src.as_str().to_owned(),
            dest: dest.as_str().to_owned(),
        }))
    }

    /// Deregister a listener. Removing an unknown id is a no-op.
    pub fn remove(&self, id: ListenerId) -> bool {
        let removed = self.write().remove(&id).is_some();
        if removed {
            tracing::debug!(listener = id, "Listener disconnected");
            self.departed.notify_waiters();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Send `closed` to every listener and wait for them to disconnect.
    ///
    /// Listeners still registered after `grace` are dropped, which ends
    /// their connection tasks. Returns how many listeners were notified.
    pub async fn close_all(&self, grace: Duration) -> usize {
        let notified = {
            let mut listeners = self.write();
            for listener in listeners.values_mut() {
                let _ = listener.sender.send(ServerMessage::Closed);
                listener.state = ListenerState::Closing;
            }
            listeners.len()
        };

        let deadline = tokio::time::Instant::now() + grace;
        loop {
            let departed = self.departed.notified();
            if self.is_empty() {
                break;
            }
            if tokio::time::timeout_at(deadline, departed).await.is_err() {
                let remaining = self.len();
                tracing::warn!(remaining, "Listeners did not disconnect in time");
                self.write().clear();
                break;
            }
        }
        notified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::Arc;

    fn page(raw: &str) -> CanonicalPath {
        crate::path::normalize(Path::new("/srv/site"), raw).unwrap()
    }

    fn drain(receiver: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[test]
    fn test_register_and_identify() {
        let set = ListenerSet::new();
        let (id, _rx) = set.register();

        assert_eq!(set.state(id), Some(ListenerState::Open));
        assert!(set.identify(id, page("/blog/")));
        assert_eq!(set.state(id), Some(ListenerState::Identified));
        assert_eq!(set.identity(id), Some(page("/blog/")));
        assert!(!set.identify(999, page("/")));
    }

    #[test]
    fn test_broadcast_reaches_identified_listeners_only() {
        let set = ListenerSet::new();
        let (a, mut rx_a) = set.register();
        let (b, mut rx_b) = set.register();
        let (_c, mut rx_c) = set.register();
        set.identify(a, page("/a/"));
        set.identify(b, page("/b/"));

        let update = ServerMessage::Update("/a/".to_owned());
        assert_eq!(set.broadcast(&update), 2);

        assert_eq!(drain(&mut rx_a), vec![update.clone()]);
        assert_eq!(drain(&mut rx_b), vec![update]);
        assert!(drain(&mut rx_c).is_empty());
    }

    #[test]
    fn test_dropped_receiver_is_pruned_without_affecting_others() {
        let set = ListenerSet::new();
        let (a, rx_a) = set.register();
        let (b, mut rx_b) = set.register();
        set.identify(a, page("/"));
        set.identify(b, page("/"));
        drop(rx_a);

        assert_eq!(set.broadcast(&ServerMessage::Update("/".to_owned())), 1);
        assert_eq!(set.len(), 1);
        assert_eq!(drain(&mut rx_b).len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let set = ListenerSet::new();
        let (id, _rx) = set.register();

        assert!(set.remove(id));
        assert!(!set.remove(id));
        assert!(set.is_empty());
    }

    #[test]
    fn test_move_rewrites_identity() {
        let set = ListenerSet::new();
        let (old, mut rx_old) = set.register();
        let (nested, _rx_nested) = set.register();
        let (other, _rx_other) = set.register();
        set.identify(old, page("/old/"));
        set.identify(nested, page("/old/sub/"));
        set.identify(other, page("/other/"));

        set.moved(&page("/old/"), &page("/new/"));

        assert_eq!(set.identity(old), Some(page("/new/")));
        assert_eq!(set.identity(nested), Some(page("/new/sub/")));
        assert_eq!(set.identity(other), Some(page("/other/")));
        assert_eq!(
            drain(&mut rx_old),
            vec![ServerMessage::Moved(MovedPaths {
                src: "/old/".to_owned(),
                dest: "/new/".to_owned(),
            })]
        );
    }

    #[tokio::test]
    async fn test_close_all_sends_closed_first() {
        let set = Arc::new(ListenerSet::new());
        let (a, mut rx_a) = set.register();
        let (_b, mut rx_b) = set.register();
        set.identify(a, page("/"));

        let connection = {
            let set = Arc::clone(&set);
            tokio::spawn(async move {
                let first = rx_a.recv().await;
                set.remove(a);
                first
            })
        };

        let closer = {
            let set = Arc::clone(&set);
            tokio::spawn(async move { set.close_all(Duration::from_secs(5)).await })
        };

        assert_eq!(connection.await.unwrap(), Some(ServerMessage::Closed));
        assert_eq!(rx_b.recv().await, Some(ServerMessage::Closed));
        set.remove(1);

        assert_eq!(closer.await.unwrap(), 2);
        assert!(set.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_all_gives_up_after_grace() {
        let set = ListenerSet::new();
        let (id, mut rx) = set.register();
        set.identify(id, page("/"));

        assert_eq!(set.close_all(Duration::from_millis(100)).await, 1);
        assert!(set.is_empty());
        assert_eq!(rx.recv().await, Some(ServerMessage::Closed));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_closing_listeners_get_no_broadcasts() {
        let set = ListenerSet::new();
        let (id, mut rx) = set.register();
        set.identify(id, page("/"));
        set.write().get_mut(&id).unwrap().state = ListenerState::Closing;

        assert_eq!(set.broadcast(&ServerMessage::Update("/".to_owned())), 0);
        assert!(!set.identify(id, page("/")));
        assert!(drain(&mut rx).is_empty());
    }
}
