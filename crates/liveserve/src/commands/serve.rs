//! `liveserve serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use liveserve_config::{CliSettings, Config};
use liveserve_core::ReloadMode;
use liveserve_server::{Server, ServerConfig, server_config_from_config};

use crate::error::CliError;
use crate::output::Output;

/// Host bound by `--expose`.
const EXPOSED_HOST: &str = "0.0.0.0";

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Directory to serve (overrides config).
    root: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover liveserve.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to bind to (overrides config).
    #[arg(short, long, env = "LIVESERVE_PORT")]
    port: Option<u16>,

    /// Host to bind to (overrides config).
    #[arg(long, conflicts_with = "expose")]
    host: Option<String>,

    /// Listen on all interfaces.
    #[arg(short = 'x', long)]
    expose: bool,

    /// Paths to watch, relative to the root (repeatable).
    #[arg(short, long = "watch")]
    watch: Vec<String>,

    /// Glob patterns to ignore, relative to the root (repeatable).
    #[arg(short, long = "ignore")]
    ignore: Vec<String>,

    /// Reload transport.
    #[arg(short, long, value_parser = parse_mode)]
    mode: Option<ReloadMode>,

    /// Open the served root in a browser.
    #[arg(short, long)]
    open: bool,

    /// Only log errors and skip request logging.
    #[arg(short, long, conflicts_with = "verbose")]
    pub(crate) silent: bool,

    /// Log each request and reload.
    #[arg(short, long)]
    pub(crate) verbose: bool,

    /// Disable live reload.
    #[arg(long)]
    no_live_reload: bool,
}

fn parse_mode(value: &str) -> Result<ReloadMode, String> {
    value.parse().map_err(|e: liveserve_core::UnknownModeError| e.to_string())
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = self.cli_settings();
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let server_config = server_config_from_config(&config);
        tracing::debug!(?server_config, "Resolved server configuration");

        let server = Server::bind(server_config.clone()).await?;
        let url = format!("http://{}/", browser_addr(&server_config.host, server.local_addr()));

        if !server_config.suppress_logs {
            output.serving(&server_config.root, &url);
            for (label, value) in banner_details(&config, &server_config) {
                output.detail(label, value);
            }
        }

        if server_config.auto_open_browser {
            open_browser(&output, &url);
        }

        server.serve().await?;
        Ok(())
    }

    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            host: if self.expose {
                Some(EXPOSED_HOST.to_owned())
            } else {
                self.host.clone()
            },
            port: self.port,
            root: self.root.clone(),
            open: self.open.then_some(true),
            silent: self.silent.then_some(true),
            live_reload_enabled: self.no_live_reload.then_some(false),
            mode: self.mode,
            watch: self.watch.clone(),
            ignore: self.ignore.clone(),
        }
    }
}

/// `label: value` lines printed under the startup banner.
fn banner_details(config: &Config, server_config: &ServerConfig) -> Vec<(&'static str, String)> {
    let mut details = Vec::new();
    if server_config.live_reload_enabled {
        details.push(("Live reload", server_config.mode.to_string()));
        let watched = server_config
            .watch_paths
            .clone()
            .unwrap_or_else(|| vec![server_config.root.clone()]);
        for path in watched {
            details.push(("Watching", path.display().to_string()));
        }
    } else {
        details.push(("Live reload", "disabled".to_owned()));
    }
    if let Some(path) = &config.config_path {
        details.push(("Config", path.display().to_string()));
    }
    details.push(("Stop", "Ctrl+C".to_owned()));
    details
}

/// Address to show and open; wildcard hosts are reached via localhost.
fn browser_addr(host: &str, addr: std::net::SocketAddr) -> String {
    if host == EXPOSED_HOST || host == "::" {
        format!("localhost:{}", addr.port())
    } else {
        addr.to_string()
    }
}

/// Open `url` in the default browser.
///
/// Uses platform-specific commands:
/// - macOS: `open`
/// - Windows: `start`
/// - Linux: `xdg-open`
fn open_browser(output: &Output, url: &str) {
    use std::process::Command;

    let result = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", url]).spawn()
    } else {
        Command::new("xdg-open").arg(url).spawn()
    };

    if let Err(e) = result {
        output.warning(&format!("Failed to open browser: {e}"));
    }
}
