//! Pending reload queue for polling clients.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::path::CanonicalPath;
use crate::pattern::PathPattern;

/// FIFO of reload targets waiting for a page to poll.
///
/// A poll consumes every target that matches the polling page and leaves the
/// rest queued in their original order.
#[derive(Debug, Default)]
pub struct PendingReloads {
    queue: Mutex<VecDeque<PathPattern>>,
}

impl PendingReloads {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> Option<MutexGuard<'_, VecDeque<PathPattern>>> {
        match self.queue.lock() {
            Ok(queue) => Some(queue),
            Err(_) => {
                tracing::warn!("Pending reload queue lock poisoned");
                None
            }
        }
    }

    /// Queue a target. Returns `false` if an equal target is already pending.
    pub fn enqueue(&self, target: PathPattern) -> bool {
        let Some(mut queue) = self.queue() else {
            return false;
        };
        if queue.contains(&target) {
            return false;
        }
        tracing::debug!(pattern = %target, "Queued reload");
        queue.push_back(target);
        true
    }

    /// Consume the targets matching `page`.
    ///
    /// Returns `true` if at least one matched. Unmatched targets stay queued.
    /// A poisoned queue answers `false`.
    pub fn take_matching(&self, page: &CanonicalPath) -> bool {
        let Some(mut queue) = self.queue() else {
            return false;
        };
        let before = queue.len();
        queue.retain(|target| !target.matches(page.as_str()));
        before != queue.len()
    }

    pub fn len(&self) -> usize {
        self.queue().map_or(0, |queue| queue.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every pending target, returning how many were queued.
    pub fn clear(&self) -> usize {
        self.queue().map_or(0, |mut queue| {
            let count = queue.len();
            queue.clear();
            count
        })
    }
}
