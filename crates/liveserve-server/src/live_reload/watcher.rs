//! Filesystem watcher feeding the engine.

use std::path::PathBuf;
use std::sync::Arc;

use liveserve_core::{Engine, WatchEvent};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Keeps the watcher and its forwarding task alive. Dropping it stops both.
pub(crate) struct WatchHandle {
    watcher: Option<RecommendedWatcher>,
    forwarder: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop watching and wait for the forwarding task to finish.
    ///
    /// Events still buffered when this is called are discarded.
    pub(crate) async fn stop(mut self) {
        drop(self.watcher.take());
        self.forwarder.abort();
        let _ = (&mut self.forwarder).await;
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

/// Start watching `paths` recursively, forwarding events to `engine`.
///
/// Must be called within a tokio runtime.
pub(crate) fn watch(engine: Arc<Engine>, paths: &[PathBuf]) -> Result<WatchHandle, notify::Error> {
    let (tx, mut rx) = mpsc::channel::<Event>(100);

    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        match res {
            // Callback is sync; the receiver task drains the channel.
            Ok(event) => {
                let _ = tx.blocking_send(event);
            }
            Err(error) => tracing::warn!(%error, "File watcher error"),
        }
    })?;

    for path in paths {
        watcher.watch(path, RecursiveMode::Recursive)?;
        tracing::debug!(path = %path.display(), "Watching");
    }

    let forwarder = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            for watch_event in translate(&event) {
                engine.on_event(watch_event);
            }
        }
    });

    Ok(WatchHandle {
        watcher: Some(watcher),
        forwarder,
    })
}

/// Map a notify event to watch events.
///
/// Renames reported with both paths become moves; half renames become a
/// removal or creation. Directory modifications and access events are
/// dropped.
fn translate(event: &Event) -> Vec<WatchEvent> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter(|path| !path.is_dir())
            .cloned()
            .map(WatchEvent::Created)
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![WatchEvent::Moved {
                from: from.clone(),
                to: to.clone(),
            }],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.iter().cloned().map(WatchEvent::Removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().cloned().map(WatchEvent::Created).collect()
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|path| {
                if path.exists() {
                    WatchEvent::Created(path.clone())
                } else {
                    WatchEvent::Removed(path.clone())
                }
            })
            .collect(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .filter(|path| !path.is_dir())
            .cloned()
            .map(WatchEvent::Modified)
            .collect(),
        EventKind::Remove(_) => event.paths.iter().cloned().map(WatchEvent::Removed).collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange, RemoveKind};
    use pretty_assertions::assert_eq;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
    }

    #[test]
    fn test_translate_file_events() {
        assert_eq!(
            translate(&event(EventKind::Create(CreateKind::File), &["/nope/a.html"])),
            vec![WatchEvent::Created(PathBuf::from("/nope/a.html"))]
        );
        assert_eq!(
            translate(&event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &["/nope/a.html"]
            )),
            vec![WatchEvent::Modified(PathBuf::from("/nope/a.html"))]
        );
        assert_eq!(
            translate(&event(EventKind::Remove(RemoveKind::File), &["/nope/a.html"])),
            vec![WatchEvent::Removed(PathBuf::from("/nope/a.html"))]
        );
    }

    #[test]
    fn test_translate_renames() {
        assert_eq!(
            translate(&event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/nope/old", "/nope/new"]
            )),
            vec![WatchEvent::Moved {
                from: PathBuf::from("/nope/old"),
                to: PathBuf::from("/nope/new"),
            }]
        );
        assert_eq!(
            translate(&event(
                EventKind::Modify(ModifyKind::Name(RenameMode::From)),
                &["/nope/old"]
            )),
            vec![WatchEvent::Removed(PathBuf::from("/nope/old"))]
        );
        assert_eq!(
            translate(&event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
                &["/nope/gone"]
            )),
            vec![WatchEvent::Removed(PathBuf::from("/nope/gone"))]
        );
    }

    #[tokio::test]
    async fn test_stop_releases_engine() {
        use liveserve_core::{EngineConfig, ReloadMode};

        let dir = tempfile::TempDir::new().unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        let config = EngineConfig {
            mode: ReloadMode::Poll,
            ..EngineConfig::new(root.clone())
        };
        let engine = Arc::new(Engine::new(config, tokio::runtime::Handle::current()));

        let handle = watch(Arc::clone(&engine), &[root]).unwrap();
        assert_eq!(Arc::strong_count(&engine), 2);

        handle.stop().await;
        assert_eq!(Arc::strong_count(&engine), 1);
    }

    #[test]
    fn test_translate_drops_noise() {
        let dir = tempfile::TempDir::new().unwrap();
        let dir_path = dir.path().to_str().unwrap();

        assert!(translate(&event(EventKind::Access(AccessKind::Any), &["/nope/a.html"])).is_empty());
        assert!(translate(&event(EventKind::Create(CreateKind::Folder), &[dir_path])).is_empty());
        assert!(
            translate(&event(
                EventKind::Modify(ModifyKind::Metadata(notify::event::MetadataKind::Any)),
                &[dir_path]
            ))
            .is_empty()
        );
    }
}
