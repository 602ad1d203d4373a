//! Keyed trailing-edge debouncing.
//!
//! Editors emit several filesystem events per save. A [`Debouncer`] holds
//! one timer per key; each trigger restarts the timer and replaces the
//! arguments, and the callback runs once the key has been quiet for the
//! whole delay.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Error type returned by debounced callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Callback<A> = dyn Fn(A) -> Result<(), BoxError> + Send + Sync;

/// Default quiet period before a debounced callback fires.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

struct PendingCall {
    generation: u64,
    task: JoinHandle<()>,
}

struct Shared<K, A> {
    pending: Mutex<HashMap<K, PendingCall>>,
    callback: Box<Callback<A>>,
}

impl<K, A> Shared<K, A>
where
    K: Eq + Hash + Debug,
{
    fn pending(&self) -> MutexGuard<'_, HashMap<K, PendingCall>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the callback if `generation` is still the latest timer for `key`.
    fn fire(&self, key: &K, generation: u64, args: A) {
        {
            let mut pending = self.pending();
            match pending.get(key) {
                Some(call) if call.generation == generation => {
                    pending.remove(key);
                }
                _ => return,
            }
        }

        if let Err(error) = (self.callback)(args) {
            tracing::warn!(key = ?key, %error, "Debounced callback failed");
        }
    }
}

/// Per-key debouncer driving its timers on a tokio runtime.
///
/// [`trigger`](Self::trigger) may be called from any thread, including the
/// watcher's notification thread.
pub struct Debouncer<K, A> {
    shared: Arc<Shared<K, A>>,
    delay: Duration,
    runtime: Handle,
    next_generation: AtomicU64,
}

impl<K, A> Debouncer<K, A>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    A: Send + 'static,
{
    /// Create a debouncer whose timers run on `runtime`.
    pub fn new<F>(runtime: Handle, delay: Duration, callback: F) -> Self
    where
        F: Fn(A) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(HashMap::new()),
                callback: Box::new(callback),
            }),
            delay,
            runtime,
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule the callback for `key`, replacing any pending call.
    pub fn trigger(&self, key: K, args: A) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        let delay = self.delay;
        let task_key = key.clone();

        let mut pending = self.shared.pending();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            shared.fire(&task_key, generation, args);
        });
        if let Some(replaced) = pending.insert(key, PendingCall { generation, task }) {
            replaced.task.abort();
        }
    }

    /// Number of keys with a timer running.
    pub fn pending(&self) -> usize {
        self.shared.pending().len()
    }

    /// Abort every pending timer without running the callbacks.
    pub fn cancel_all(&self) {
        let mut pending = self.shared.pending();
        for (_, call) in pending.drain() {
            call.task.abort();
        }
    }
}

impl<K, A> Drop for Debouncer<K, A> {
    fn drop(&mut self) {
        let mut pending = self.shared.pending.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, call) in pending.drain() {
            call.task.abort();
        }
    }
}
