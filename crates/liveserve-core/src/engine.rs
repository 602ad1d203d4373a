//! The coordination engine tying watcher events to reload signals.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;

use crate::debounce::{self, BoxError, Debouncer};
use crate::event::{EventKey, WatchEvent};
use crate::inject::{self, ReloadMode};
use crate::message::ServerMessage;
use crate::path::{self, CanonicalPath, PathEscapeError};
use crate::pattern::PathPattern;
use crate::policy::{DefaultReloadPolicy, ReloadPolicy};
use crate::registry::{ListenerSet, PendingReloads};

/// Engine settings.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Served root. Should be canonicalized so watcher paths strip cleanly.
    pub root: PathBuf,
    pub mode: ReloadMode,
    /// Root-relative paths matching any of these never trigger a reload.
    pub ignore: Vec<PathPattern>,
    pub debounce: Duration,
    /// Chooses the pages each change reloads.
    pub policy: Arc<dyn ReloadPolicy>,
}

impl EngineConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mode: ReloadMode::default(),
            ignore: Vec::new(),
            debounce: debounce::DEFAULT_DELAY,
            policy: Arc::new(DefaultReloadPolicy),
        }
    }
}

struct Shared {
    root: PathBuf,
    mode: ReloadMode,
    policy: Arc<dyn ReloadPolicy>,
    pending: PendingReloads,
    listeners: ListenerSet,
}

impl Shared {
    fn dispatch(&self, event: &WatchEvent) -> Result<(), BoxError> {
        let targets = match event {
            WatchEvent::Created(changed) => self.policy.created(&self.root, changed)?,
            WatchEvent::Modified(changed) => self.policy.modified(&self.root, changed)?,
            WatchEvent::Removed(changed) => self.policy.removed(&self.root, changed)?,
            WatchEvent::Moved { from, to } => self.move_targets(from, to)?,
        };
        self.publish(targets);
        Ok(())
    }

    /// Targets for both sides of a move, rewriting listeners for a moved
    /// directory first.
    fn move_targets(&self, from: &Path, to: &Path) -> Result<Vec<PathPattern>, PathEscapeError> {
        // Only a moved directory changes the identity of the pages below it;
        // a moved file leaves its old page behind, which must reload too.
        let dest = path::resolve(&self.root, &to.to_string_lossy())?;
        let mut targets = if self.mode == ReloadMode::Poll || dest.names_file(&self.root) {
            self.policy.removed(&self.root, from)?
        } else {
            let src = path::normalize(&self.root, &from.to_string_lossy())?;
            let dest = dest.page(&self.root);
            if src != dest {
                let notified = self.listeners.moved(&src, &dest);
                tracing::info!(src = %src, dest = %dest, notified, "Page moved");
            }
            Vec::new()
        };

        for target in self.policy.created(&self.root, to)? {
            if !targets.iter().any(|t| t.as_str() == target.as_str()) {
                targets.push(target);
            }
        }
        Ok(targets)
    }

    fn publish(&self, targets: Vec<PathPattern>) {
        for target in targets {
            match self.mode {
                ReloadMode::Poll => {
                    if self.pending.enqueue(target.clone()) {
                        tracing::info!(page = %target, "Reload queued");
                    }
                }
                ReloadMode::Socket => {
                    let notified = self
                        .listeners
                        .broadcast(&ServerMessage::Update(target.as_str().to_owned()));
                    tracing::info!(page = %target, notified, "Reload broadcast");
                }
            }
        }
    }
}

/// Live reload engine.
///
/// Each instance owns its registries; two engines never share state.
pub struct Engine {
    shared: Arc<Shared>,
    ignore: Vec<PathPattern>,
    debouncer: Debouncer<EventKey, WatchEvent>,
    stopped: AtomicBool,
}

impl Engine {
    /// Create an engine whose debounce timers run on `runtime`.
    pub fn new(config: EngineConfig, runtime: Handle) -> Self {
        let shared = Arc::new(Shared {
            root: config.root,
            mode: config.mode,
            policy: config.policy,
            pending: PendingReloads::new(),
            listeners: ListenerSet::new(),
        });
        let dispatcher = Arc::clone(&shared);
        let debouncer = Debouncer::new(runtime, config.debounce, move |event: WatchEvent| {
            dispatcher.dispatch(&event)
        });
        Self {
            shared,
            ignore: config.ignore,
            debouncer,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    pub fn mode(&self) -> ReloadMode {
        self.shared.mode
    }

    pub fn pending(&self) -> &PendingReloads {
        &self.shared.pending
    }

    pub fn listeners(&self) -> &ListenerSet {
        &self.shared.listeners
    }

    /// Whether changes to `path` are ignored.
    ///
    /// Paths outside the served root are always ignored, whether absolute
    /// or climbing out with `..`.
    pub fn is_ignored(&self, path: &Path) -> bool {
        if !path::is_within(&self.shared.root, path) {
            return true;
        }
        match path::resolve(&self.shared.root, &path.to_string_lossy()) {
            Ok(site_path) => {
                let relative = site_path.relative();
                self.ignore.iter().any(|pattern| pattern.matches(&relative))
            }
            Err(_) => true,
        }
    }

    /// Feed a raw watcher event into the debouncer.
    ///
    /// A move with one side outside the root is treated as a creation or
    /// removal of the side inside it. Events after [`shutdown`](Self::shutdown)
    /// are dropped.
    pub fn on_event(&self, event: WatchEvent) {
        if self.stopped.load(Ordering::Acquire) {
            tracing::trace!(kind = event.kind(), "Engine stopped, dropping event");
            return;
        }
        let Some(event) = self.confine(event) else {
            return;
        };
        if event.paths().iter().all(|path| self.is_ignored(path)) {
            tracing::trace!(kind = event.kind(), "Ignored filesystem event");
            return;
        }
        tracing::debug!(kind = event.kind(), paths = ?event.paths(), "Recorded filesystem event");
        self.debouncer.trigger(event.key(), event);
    }

    fn confine(&self, event: WatchEvent) -> Option<WatchEvent> {
        let root = &self.shared.root;
        let event = match event {
            WatchEvent::Moved { from, to } => {
                match (path::is_within(root, &from), path::is_within(root, &to)) {
                    (false, true) => WatchEvent::Created(to),
                    (true, false) => WatchEvent::Removed(from),
                    _ => WatchEvent::Moved { from, to },
                }
            }
            other => other,
        };
        if event.paths().iter().all(|path| !path::is_within(root, path)) {
            tracing::debug!(paths = ?event.paths(), "Dropped event outside the served root");
            return None;
        }
        Some(event)
    }

    /// Canonical page path for a request or announced identity.
    pub fn page(&self, raw: &str) -> Result<CanonicalPath, PathEscapeError> {
        path::normalize(&self.shared.root, raw)
    }

    /// Answer a poll: `true` if a reload is pending for the page.
    pub fn poll(&self, raw: &str) -> Result<bool, PathEscapeError> {
        let page = self.page(raw)?;
        Ok(self.shared.pending.take_matching(&page))
    }

    /// Bootstrap markup for the page containing `raw`.
    pub fn snippet_for(&self, raw: &str) -> Result<String, PathEscapeError> {
        Ok(inject::snippet(self.shared.mode, &self.page(raw)?))
    }

    /// Inject the bootstrap for this engine's transport.
    pub fn inject(&self, html: &str, page: &CanonicalPath) -> String {
        inject::inject(html, self.shared.mode, page)
    }

    /// Stop accepting events, cancel pending debounce timers and drop
    /// queued reloads.
    ///
    /// Returns the number of queued reloads dropped.
    pub fn shutdown(&self) -> usize {
        self.stopped.store(true, Ordering::Release);
        self.debouncer.cancel_all();
        self.shared.pending.clear()
    }
}
