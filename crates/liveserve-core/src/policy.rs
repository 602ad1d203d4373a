//! Pluggable choice of which pages a change reloads.

use std::fmt;
use std::path::Path;

use crate::path::{self, PathEscapeError};
use crate::pattern::PathPattern;

/// Decides the reload targets for each kind of change.
///
/// Every method defaults to [`path::reload_targets`]: the page containing the
/// changed resource, plus `**` for stylesheets and scripts. Override only the
/// kinds that need different behavior. An empty list reloads nothing.
///
/// `changed` is the path reported by the watcher, already confirmed to lie
/// under `root`. A move calls [`removed`](Self::removed) for the source and
/// [`created`](Self::created) for the destination.
pub trait ReloadPolicy: fmt::Debug + Send + Sync {
    fn created(&self, root: &Path, changed: &Path) -> Result<Vec<PathPattern>, PathEscapeError> {
        path::reload_targets(root, &changed.to_string_lossy())
    }

    fn modified(&self, root: &Path, changed: &Path) -> Result<Vec<PathPattern>, PathEscapeError> {
        path::reload_targets(root, &changed.to_string_lossy())
    }

    fn removed(&self, root: &Path, changed: &Path) -> Result<Vec<PathPattern>, PathEscapeError> {
        path::reload_targets(root, &changed.to_string_lossy())
    }
}

/// Reloads the containing page, and every page for `.css`/`.js`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultReloadPolicy;

impl ReloadPolicy for DefaultReloadPolicy {}
