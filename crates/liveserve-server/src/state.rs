//! Application state.
//!
//! Shared state for all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use liveserve_core::Engine;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Live reload engine. Also owns the served root.
    pub(crate) engine: Arc<Engine>,
    /// Whether HTML responses carry the live reload bootstrap.
    pub(crate) live_reload: bool,
    /// Directory holding `<status>.html` error pages.
    pub(crate) error_pages: PathBuf,
    /// Suppress request logging.
    pub(crate) suppress_logs: bool,
}

impl AppState {
    pub(crate) fn root(&self) -> &std::path::Path {
        self.engine.root()
    }
}

#[cfg(test)]
pub(crate) fn test_state(
    root: &std::path::Path,
    mode: liveserve_core::ReloadMode,
    live_reload: bool,
) -> Arc<AppState> {
    use liveserve_core::EngineConfig;

    let root = std::fs::canonicalize(root).unwrap();
    let config = EngineConfig {
        mode,
        ..EngineConfig::new(root.clone())
    };
    Arc::new(AppState {
        engine: Arc::new(Engine::new(config, tokio::runtime::Handle::current())),
        live_reload,
        error_pages: root,
        suppress_logs: true,
    })
}
