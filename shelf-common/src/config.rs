//! Configuration loading
//!
//! Resolution priority (highest first):
//! 1. Command-line arguments (passed in as [`ConfigOverrides`])
//! 2. Environment variables (`SHELF_*`)
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing TOML file is not fatal: the service runs on defaults plus
//! environment and reports `source: None`. A missing API key secret is fatal, see
//! [`TomlConfig::require_api_key`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_PATH: &str = "SHELF_CONFIG";
/// Environment variable holding the `x-api-key` secret
pub const ENV_API_KEY: &str = "SHELF_API_KEY";
/// Environment variable holding the platform bearer token
pub const ENV_PLATFORM_TOKEN: &str = "SHELF_PLATFORM_TOKEN";
/// Environment variable overriding the platform base URL
pub const ENV_PLATFORM_URL: &str = "SHELF_PLATFORM_URL";
/// Environment variable holding the platform site id
pub const ENV_SITE_ID: &str = "SHELF_SITE_ID";
/// Environment variable overriding the listen port
pub const ENV_PORT: &str = "SHELF_PORT";

const CONFIG_FILE_NAME: &str = "shelf-api.toml";

/// Service configuration as read from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared secret expected in the `x-api-key` header
    #[serde(default)]
    pub api_key: Option<String>,

    /// Hosted data platform connection
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Collection names and fetch/resolve tuning
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// File the configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Hosted data platform connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformConfig {
    /// REST API base URL
    #[serde(default = "default_platform_url")]
    pub base_url: String,

    /// Bearer token sent in `Authorization`
    #[serde(default)]
    pub api_token: Option<String>,

    /// Site the data collections belong to
    #[serde(default)]
    pub site_id: Option<String>,

    /// Per-request timeout for upstream calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Collection names and fetch/resolve tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Items requested per data query page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Maximum media resolutions in flight per request
    #[serde(default = "default_media_concurrency")]
    pub media_concurrency: usize,

    /// Per-resolution timeout; 0 disables it
    #[serde(default = "default_media_timeout_secs")]
    pub media_timeout_secs: u64,

    #[serde(default = "default_audiobooks_collection")]
    pub audiobooks_collection: String,

    #[serde(default = "default_chapters_collection")]
    pub chapters_collection: String,

    #[serde(default = "default_achievements_collection")]
    pub achievements_collection: String,

    #[serde(default = "default_member_reference_collection")]
    pub member_reference_collection: String,

    #[serde(default = "default_sponsorships_collection")]
    pub sponsorships_collection: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_platform_url() -> String {
    "https://www.wixapis.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> usize {
    1000
}

fn default_media_concurrency() -> usize {
    10
}

fn default_media_timeout_secs() -> u64 {
    20
}

fn default_audiobooks_collection() -> String {
    "PremiumAudiobooks".to_string()
}

fn default_chapters_collection() -> String {
    "audiobookChapters".to_string()
}

fn default_achievements_collection() -> String {
    "achievements".to_string()
}

fn default_member_reference_collection() -> String {
    "memberReferenceData".to_string()
}

fn default_sponsorships_collection() -> String {
    "sponsorships".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            api_key: None,
            platform: PlatformConfig::default(),
            catalog: CatalogConfig::default(),
            logging: LoggingConfig::default(),
            source: None,
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: default_platform_url(),
            api_token: None,
            site_id: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            media_concurrency: default_media_concurrency(),
            media_timeout_secs: default_media_timeout_secs(),
            audiobooks_collection: default_audiobooks_collection(),
            chapters_collection: default_chapters_collection(),
            achievements_collection: default_achievements_collection(),
            member_reference_collection: default_member_reference_collection(),
            sponsorships_collection: default_sponsorships_collection(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl PlatformConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl CatalogConfig {
    /// Per-resolution timeout, `None` when disabled
    pub fn media_timeout(&self) -> Option<Duration> {
        (self.media_timeout_secs > 0).then(|| Duration::from_secs(self.media_timeout_secs))
    }
}

impl TomlConfig {
    /// The configured API key secret
    ///
    /// The service refuses to start without one rather than serving
    /// unauthenticated requests.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(Error::Config(format!(
                "API key not configured. Set {} or `api_key` in {}",
                ENV_API_KEY, CONFIG_FILE_NAME
            ))),
        }
    }

    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.catalog.page_size == 0 {
            return Err(Error::Config("catalog.page_size must be positive".to_string()));
        }
        if self.catalog.media_concurrency == 0 {
            return Err(Error::Config(
                "catalog.media_concurrency must be positive".to_string(),
            ));
        }
        if self.platform.base_url.trim().is_empty() {
            return Err(Error::Config("platform.base_url must not be empty".to_string()));
        }
        Ok(())
    }

    /// Apply `SHELF_*` environment variables on top of file values
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(key) = non_empty_env(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(token) = non_empty_env(ENV_PLATFORM_TOKEN) {
            self.platform.api_token = Some(token);
        }
        if let Some(url) = non_empty_env(ENV_PLATFORM_URL) {
            self.platform.base_url = url;
        }
        if let Some(site) = non_empty_env(ENV_SITE_ID) {
            self.platform.site_id = Some(site);
        }
        if let Some(port) = non_empty_env(ENV_PORT) {
            self.port = port
                .parse()
                .map_err(|e| Error::Config(format!("Invalid {}: {}", ENV_PORT, e)))?;
        }
        Ok(())
    }

    /// Apply command-line overrides (highest priority)
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(bind) = &overrides.bind_address {
            self.bind_address = bind.clone();
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub port: Option<u16>,
    pub bind_address: Option<String>,
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Default config file locations, most specific first
///
/// `~/.config/shelf/shelf-api.toml`, then `/etc/shelf/shelf-api.toml` on unix.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("shelf").join(CONFIG_FILE_NAME));
    }
    if cfg!(unix) {
        paths.push(PathBuf::from("/etc/shelf").join(CONFIG_FILE_NAME));
    }
    paths
}

/// Resolve the full configuration
///
/// An explicitly named config file (CLI or `SHELF_CONFIG`) must exist; the
/// default locations are optional.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<TomlConfig> {
    let explicit = overrides
        .config_path
        .clone()
        .or_else(|| non_empty_env(ENV_CONFIG_PATH).map(PathBuf::from));

    let path = match explicit {
        Some(path) => Some(path),
        None => default_config_paths().into_iter().find(|p| p.exists()),
    };

    let mut config = match path {
        Some(path) => {
            let mut config = load_toml_config(&path)?;
            debug!("Loaded configuration from {}", path.display());
            config.source = Some(path);
            config
        }
        None => {
            debug!("No {} found, using defaults and environment", CONFIG_FILE_NAME);
            TomlConfig::default()
        }
    };

    config.apply_env()?;
    config.apply_overrides(overrides);
    config.validate()?;

    Ok(config)
}
