//! Configuration loading and backend URL resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`SKETCHCHECK_API_BASE_URL`)
//! 3. TOML config file (`~/.config/sketchcheck/config.toml`)
//! 4. Compiled default: the build-time `SKETCHCHECK_API_BASE_URL`, else
//!    `https://sketchcheck.shop`
//!
//! A missing TOML file is not an error: a warning is logged and defaults are
//! used. A TOML file that exists but does not parse is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{Error, Result};

/// Fallback backend when neither build nor runtime configuration names one
pub const DEFAULT_API_BASE_URL: &str = "https://sketchcheck.shop";

/// Environment variable overriding the backend base URL (also read at build time)
pub const API_BASE_URL_ENV: &str = "SKETCHCHECK_API_BASE_URL";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "SKETCHCHECK_CONFIG";

/// Default HTTP request timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

const APP_DIR: &str = "sketchcheck";

// ========================================
// TOML schema
// ========================================

/// Configuration file contents; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Backend base URL, e.g. `https://sketchcheck.shop`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    /// HTTP request timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Token storage file (defaults to the platform data directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// How the client waits for an uploaded sketch to finish analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionMode {
    /// Wait once, fetch once
    Fixed,
    /// Wait, then poll with backoff until the result is ready or time runs out
    Poll,
}

/// Completion wait tunables (all durations in milliseconds)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub mode: CompletionMode,
    pub initial_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub max_poll_interval_ms: u64,
    pub backoff_factor: f64,
    pub timeout_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            mode: CompletionMode::Poll,
            initial_delay_ms: 3000,
            poll_interval_ms: 1000,
            max_poll_interval_ms: 8000,
            backoff_factor: 2.0,
            timeout_ms: 60_000,
        }
    }
}

// ========================================
// Compiled defaults
// ========================================

/// Built-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub api_base_url: String,
    pub timeout: Duration,
    pub storage_path: PathBuf,
    pub config_path: PathBuf,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            api_base_url: option_env!("SKETCHCHECK_API_BASE_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(DEFAULT_API_BASE_URL)
                .to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            storage_path: default_storage_path(),
            config_path: default_config_path(),
        }
    }
}

/// `<data dir>/sketchcheck/storage.toml`
pub fn default_storage_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".").join(".sketchcheck"))
        .join("storage.toml")
}

/// `<config dir>/sketchcheck/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".").join(".sketchcheck"))
        .join("config.toml")
}

// ========================================
// Resolution
// ========================================

/// Fully resolved client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub timeout: Duration,
    pub storage_path: PathBuf,
    pub logging: LoggingConfig,
    pub analysis: AnalysisConfig,
}

/// Resolves [`ClientConfig`] from CLI, environment, TOML and defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_api_url: Option<String>,
    cli_config_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `--api-url` override
    pub fn with_api_url(mut self, url: Option<String>) -> Self {
        self.cli_api_url = url;
        self
    }

    /// `--config` override
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.cli_config_path = path;
        self
    }

    /// Config file that will be consulted (CLI > ENV > default)
    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = &self.cli_config_path {
            return path.clone();
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        default_config_path()
    }

    pub fn resolve(&self) -> Result<ClientConfig> {
        let defaults = CompiledDefaults::for_current_platform();
        let config_path = self.config_path();
        let toml_config = match load_toml_config(&config_path)? {
            Some(config) => {
                info!("Loaded configuration from {}", config_path.display());
                config
            }
            None => {
                warn!(
                    "Config file {} not found, using defaults",
                    config_path.display()
                );
                TomlConfig::default()
            }
        };

        let api_base_url = self.resolve_api_base_url(&toml_config, &defaults)?;

        Ok(ClientConfig {
            api_base_url,
            timeout: toml_config
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
            storage_path: toml_config.storage_path.unwrap_or(defaults.storage_path),
            logging: toml_config.logging,
            analysis: toml_config.analysis,
        })
    }

    fn resolve_api_base_url(
        &self,
        toml_config: &TomlConfig,
        defaults: &CompiledDefaults,
    ) -> Result<String> {
        // Priority 1: Command-line argument
        if let Some(url) = non_empty(self.cli_api_url.as_deref()) {
            info!("API base URL: {} (from command line)", url);
            return normalize_base_url(url);
        }

        // Priority 2: Environment variable
        if let Ok(url) = std::env::var(API_BASE_URL_ENV) {
            if let Some(url) = non_empty(Some(&url)) {
                info!("API base URL: {} (from {})", url, API_BASE_URL_ENV);
                return normalize_base_url(url);
            }
        }

        // Priority 3: TOML config file
        if let Some(url) = non_empty(toml_config.api_base_url.as_deref()) {
            info!("API base URL: {} (from config file)", url);
            return normalize_base_url(url);
        }

        // Priority 4: Compiled default
        info!("API base URL: {} (default)", defaults.api_base_url);
        normalize_base_url(&defaults.api_base_url)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validate an http(s) base URL and strip trailing slashes
///
/// # Examples
///
/// ```
/// use skc_common::config::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:8000/").unwrap(), "http://localhost:8000");
/// assert!(normalize_base_url("ftp://example.com").is_err());
/// ```
pub fn normalize_base_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let has_host = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .map(|rest| !rest.is_empty())
        .unwrap_or(false);

    if !has_host {
        return Err(Error::Config(format!(
            "API base URL must be an http(s) URL with a host, got {:?}",
            url
        )));
    }
    Ok(trimmed.to_string())
}

// ========================================
// TOML file I/O
// ========================================

/// Read a TOML config file; `Ok(None)` when the file does not exist
pub fn load_toml_config(path: &Path) -> Result<Option<TomlConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    Ok(Some(config))
}

/// Write a TOML config file atomically, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_analysis_config() {
        let analysis = AnalysisConfig::default();
        assert_eq!(analysis.mode, CompletionMode::Poll);
        assert_eq!(analysis.initial_delay_ms, 3000);
    }

    #[test]
    fn test_partial_analysis_table_keeps_defaults() {
        let config: TomlConfig = toml::from_str("[analysis]\nmode = \"fixed\"\n").unwrap();
        assert_eq!(config.analysis.mode, CompletionMode::Fixed);
        assert_eq!(config.analysis.initial_delay_ms, 3000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url(" https://sketchcheck.shop// ").unwrap(),
            "https://sketchcheck.shop"
        );
        assert!(normalize_base_url("https://").is_err());
        assert!(normalize_base_url("sketchcheck.shop").is_err());
    }

    #[test]
    fn test_default_paths_are_namespaced() {
        assert!(default_storage_path().ends_with("sketchcheck/storage.toml"));
        assert!(default_config_path().ends_with("sketchcheck/config.toml"));
    }
}
