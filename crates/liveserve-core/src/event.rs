//! Filesystem change events.

use std::path::{Path, PathBuf};

/// A change reported by the watcher, with absolute or root-relative paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
}

impl WatchEvent {
    /// Debounce key of this event.
    ///
    /// Creation, modification and removal of one path are the same logical
    /// operation ("this path changed"), so a save that shows up as
    /// remove + create collapses into one reload.
    pub fn key(&self) -> EventKey {
        match self {
            Self::Created(path) | Self::Modified(path) | Self::Removed(path) => {
                EventKey::Changed(path.clone())
            }
            Self::Moved { from, to } => EventKey::Moved {
                from: from.clone(),
                to: to.clone(),
            },
        }
    }

    /// Every path the event touches.
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            Self::Created(path) | Self::Modified(path) | Self::Removed(path) => vec![path.as_path()],
            Self::Moved { from, to } => vec![from.as_path(), to.as_path()],
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Modified(_) => "modified",
            Self::Removed(_) => "removed",
            Self::Moved { .. } => "moved",
        }
    }
}

/// Identity under which raw events are debounced.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKey {
    Changed(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
}
