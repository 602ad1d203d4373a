//! HTTP server for liveserve.
//!
//! Serves a directory tree with axum and wires a [`liveserve_core::Engine`]
//! to the browser:
//!
//! - Static files, directory listings and custom error pages, with the live
//!   reload bootstrap injected into HTML
//! - `GET /livereload/{path}` for polling pages
//! - `GET /ws/_live_refresh_` for WebSocket pages
//! - A `notify` watcher feeding filesystem changes into the engine
//!
//! # Quick Start
//!
//! ```ignore
//! use liveserve_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         root: "public".into(),
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = Server::bind(config).await.unwrap();
//!     println!("Listening on http://{}", server.local_addr());
//!     server.serve().await.unwrap();
//! }
//! ```
//!
//! # Shutdown
//!
//! On Ctrl-C or [`ShutdownHandle::shutdown`] the server stops accepting
//! connections, sends `closed` to every WebSocket listener and waits for them
//! to disconnect, stops the watcher, then drops queued reloads.

mod app;
mod error;
mod listing;
mod live_reload;
mod middleware;
mod state;
mod static_files;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use liveserve_core::{Engine, EngineConfig, PathPattern, ReloadMode};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::{Notify, oneshot};

pub use error::ServerError;
use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served at `/`.
    pub root: PathBuf,
    /// Directory holding `<status>.html` error pages (`None` uses `root`).
    pub error_pages: Option<PathBuf>,
    pub live_reload_enabled: bool,
    pub mode: ReloadMode,
    /// Paths to watch (`None` watches `root`).
    pub watch_paths: Option<Vec<PathBuf>>,
    /// Root-relative glob patterns whose changes never reload.
    pub ignore_patterns: Vec<String>,
    pub debounce: Duration,
    /// Open a browser once listening. Acted on by the caller.
    pub auto_open_browser: bool,
    /// Suppress request logging.
    pub suppress_logs: bool,
    /// How long to wait for WebSocket listeners to leave on shutdown.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 3031,
            root: PathBuf::from("."),
            error_pages: None,
            live_reload_enabled: true,
            mode: ReloadMode::default(),
            watch_paths: None,
            ignore_patterns: Vec::new(),
            debounce: Duration::from_millis(100),
            auto_open_browser: false,
            suppress_logs: false,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

/// Requests a graceful shutdown of a running [`Server`].
#[derive(Clone, Debug, Default)]
pub struct ShutdownHandle {
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.notify.notify_one();
    }

    async fn requested(&self) {
        self.notify.notified().await;
    }
}

/// A bound, not yet serving, live reload server.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: axum::Router,
    engine: Arc<Engine>,
    watcher: Option<live_reload::WatchHandle>,
    shutdown: ShutdownHandle,
    shutdown_grace: Duration,
}

impl Server {
    /// Validate the configuration, bind the listener and start watching.
    ///
    /// Bind failures are fatal. A watcher that cannot start is logged and
    /// the server runs without live reload events.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let root = std::fs::canonicalize(&config.root)
            .ok()
            .filter(|root| root.is_dir())
            .ok_or_else(|| ServerError::RootNotFound(config.root.clone()))?;

        let ignore = config
            .ignore_patterns
            .iter()
            .map(|pattern| PathPattern::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        let engine = Arc::new(Engine::new(
            EngineConfig {
                mode: config.mode,
                ignore,
                debounce: config.debounce,
                ..EngineConfig::new(root.clone())
            },
            Handle::current(),
        ));

        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let watcher = if config.live_reload_enabled {
            let watch_paths = config.watch_paths.unwrap_or_else(|| vec![root.clone()]);
            let watch_paths: Vec<PathBuf> = watch_paths
                .iter()
                .map(|path| canonical_watch_path(&root, path))
                .collect();
            match live_reload::watch(Arc::clone(&engine), &watch_paths) {
                Ok(handle) => Some(handle),
                Err(error) => {
                    tracing::warn!(%error, "File watcher unavailable, live reload disabled");
                    None
                }
            }
        } else {
            None
        };

        let error_pages = config
            .error_pages
            .map_or_else(|| root.clone(), |dir| canonical_watch_path(&root, &dir));
        let state = Arc::new(AppState {
            engine: Arc::clone(&engine),
            live_reload: config.live_reload_enabled,
            error_pages,
            suppress_logs: config.suppress_logs,
        });

        Ok(Self {
            listener,
            local_addr,
            router: app::create_router(state),
            engine,
            watcher,
            shutdown: ShutdownHandle::default(),
            shutdown_grace: config.shutdown_grace,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn engine(&self) -> Arc<Engine> {
        Arc::clone(&self.engine)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Serve until Ctrl-C or a shutdown request, then shut down in order.
    pub async fn serve(self) -> Result<(), ServerError> {
        let Self {
            listener,
            local_addr,
            router,
            engine,
            watcher,
            shutdown,
            shutdown_grace,
        } = self;

        tracing::info!(
            address = %local_addr,
            root = %engine.root().display(),
            mode = %engine.mode(),
            "Starting server"
        );

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let mut server = tokio::spawn(
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .into_future(),
        );

        tokio::select! {
            () = shutdown_signal(shutdown) => {}
            result = &mut server => {
                // Server ended on its own
                result.map_err(std::io::Error::other)??;
                return Ok(());
            }
        }

        // Stop accepting, then release WebSocket listeners while HTTP drains
        let _ = stop_tx.send(());
        let notified = engine.listeners().close_all(shutdown_grace).await;
        server.await.map_err(std::io::Error::other)??;

        if let Some(watcher) = watcher {
            watcher.stop().await;
        }
        let dropped = engine.shutdown();
        tracing::info!(notified, dropped, "Server stopped");

        Ok(())
    }
}

/// Resolve a configured path against the root, canonicalizing if it exists.
fn canonical_watch_path(root: &Path, path: &Path) -> PathBuf {
    let joined = root.join(path);
    std::fs::canonicalize(&joined).unwrap_or(joined)
}

/// Wait for Ctrl-C or a shutdown request.
async fn shutdown_signal(handle: ShutdownHandle) {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Shutdown signal received, stopping server..."),
        () = handle.requested() => tracing::info!("Shutdown requested, stopping server..."),
    }
}

/// Create server configuration from liveserve config.
#[must_use]
pub fn server_config_from_config(config: &liveserve_config::Config) -> ServerConfig {
    let watch_paths = if config.live_reload.watch.is_empty() {
        None
    } else {
        Some(config.watch_paths())
    };

    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        root: config.site_resolved.root.clone(),
        error_pages: config.site_resolved.error_pages.clone(),
        live_reload_enabled: config.live_reload.enabled,
        mode: config.live_reload.mode,
        watch_paths,
        ignore_patterns: config.live_reload.ignore.clone(),
        debounce: config.live_reload.debounce(),
        auto_open_browser: config.server.open,
        suppress_logs: config.server.silent,
        ..ServerConfig::default()
    }
}
