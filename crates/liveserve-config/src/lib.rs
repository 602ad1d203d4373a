//! Configuration management for liveserve.
//!
//! Parses `liveserve.toml` with serde, discovering it in the current
//! directory or its parents when no path is given. Command line values are
//! layered on top through [`CliSettings`].
//!
//! ```toml
//! [server]
//! host = "${LIVESERVE_HOST:-127.0.0.1}"
//! port = 3031
//! open = false
//!
//! [site]
//! root = "public"
//! error_pages = "public/errors"
//!
//! [live_reload]
//! mode = "poll"
//! watch = ["content", "assets"]
//! ignore = ["**/*.tmp"]
//! debounce_ms = 100
//! ```
//!
//! `server.host`, `site.root` and `site.error_pages` support `${VAR}` and
//! `${VAR:-default}` environment expansion.

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use liveserve_core::{PathPattern, ReloadMode};
use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "liveserve.toml";

/// Upper bound for `live_reload.debounce_ms`.
const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Command line values that override the configuration file.
///
/// Only `Some` fields take effect.
#[derive(Debug, Default)]
pub struct CliSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Served root, relative to the working directory.
    pub root: Option<PathBuf>,
    pub open: Option<bool>,
    pub silent: Option<bool>,
    pub live_reload_enabled: Option<bool>,
    pub mode: Option<ReloadMode>,
    /// Replaces the configured watch paths when non-empty.
    pub watch: Vec<String>,
    /// Added to the configured ignore patterns.
    pub ignore: Vec<String>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    site: SiteConfigRaw,
    pub live_reload: LiveReloadConfig,

    /// Site configuration with absolute paths (set after loading).
    #[serde(skip)]
    pub site_resolved: SiteConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Open the served root in a browser once listening.
    pub open: bool,
    /// Suppress request logging.
    pub silent: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 3031,
            open: false,
            silent: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SiteConfigRaw {
    root: Option<String>,
    error_pages: Option<String>,
}

/// Served site locations.
#[derive(Debug, Default)]
pub struct SiteConfig {
    /// Directory served at `/`.
    pub root: PathBuf,
    /// Directory holding `<status>.html` error pages. Defaults to the root.
    pub error_pages: Option<PathBuf>,
}

/// Live reload configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveReloadConfig {
    pub enabled: bool,
    pub mode: ReloadMode,
    /// Paths to watch, relative to the served root. Empty watches the root.
    pub watch: Vec<String>,
    /// Root-relative glob patterns whose changes never reload.
    pub ignore: Vec<String>,
    pub debounce_ms: u64,
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: ReloadMode::default(),
            watch: Vec::new(),
            ignore: vec!["**/.git/**".to_owned(), "**/*.swp".to_owned(), "**/*~".to_owned()],
            debounce_ms: 100,
        }
    }
}

impl LiveReloadConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Compile the ignore patterns.
    pub fn ignore_patterns(&self) -> Result<Vec<PathPattern>, ConfigError> {
        self.ignore
            .iter()
            .map(|pattern| {
                PathPattern::new(pattern).map_err(|err| ConfigError::Validation(err.to_string()))
            })
            .collect()
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Validation(String),

    #[error("Environment variable error in {field}: {message}")]
    EnvVar { field: String, message: String },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration, then apply CLI settings.
    ///
    /// An explicit `config_path` must exist. Without one, `liveserve.toml`
    /// is searched for in the working directory and its parents, falling
    /// back to defaults.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(open) = settings.open {
            self.server.open = open;
        }
        if let Some(silent) = settings.silent {
            self.server.silent = silent;
        }
        if let Some(root) = &settings.root {
            self.site_resolved.root.clone_from(root);
        }
        if let Some(enabled) = settings.live_reload_enabled {
            self.live_reload.enabled = enabled;
        }
        if let Some(mode) = settings.mode {
            self.live_reload.mode = mode;
        }
        if !settings.watch.is_empty() {
            self.live_reload.watch.clone_from(&settings.watch);
        }
        self.live_reload
            .ignore
            .extend(settings.ignore.iter().cloned());
    }

    /// Watch paths resolved against the served root.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        if self.live_reload.watch.is_empty() {
            return vec![self.site_resolved.root.clone()];
        }
        self.live_reload
            .watch
            .iter()
            .map(|path| self.site_resolved.root.join(path))
            .collect()
    }

    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            site: SiteConfigRaw::default(),
            live_reload: LiveReloadConfig::default(),
            site_resolved: SiteConfig {
                root: base.to_path_buf(),
                error_pages: None,
            },
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        let debounce = self.live_reload.debounce_ms;
        if debounce == 0 || debounce > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Validation(format!(
                "live_reload.debounce_ms must be between 1 and {MAX_DEBOUNCE_MS}"
            )));
        }

        for path in &self.live_reload.watch {
            require_non_empty(path, "live_reload.watch")?;
        }
        self.live_reload.ignore_patterns()?;

        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;
        if let Some(root) = &self.site.root {
            self.site.root = Some(expand::expand_env(root, "site.root")?);
        }
        if let Some(error_pages) = &self.site.error_pages {
            self.site.error_pages = Some(expand::expand_env(error_pages, "site.error_pages")?);
        }
        Ok(())
    }

    /// Resolve site paths relative to the config file's directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.site_resolved = SiteConfig {
            root: config_dir.join(self.site.root.as_deref().unwrap_or(".")),
            error_pages: self.site.error_pages.as_deref().map(|dir| config_dir.join(dir)),
        };
    }
}
