//! Integration tests for configuration resolution and graceful degradation
//!
//! Covers:
//! - Missing TOML files SHALL NOT cause failure (defaults are used)
//! - Priority order: CLI > environment > TOML > compiled default
//! - Config write/read through the atomic writer
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SKETCHCHECK_API_BASE_URL or SKETCHCHECK_CONFIG are
//! marked with #[serial].

use serial_test::serial;
use skc_common::config::{
    load_toml_config, write_toml_config, AnalysisConfig, CompletionMode, ConfigResolver,
    LoggingConfig, TomlConfig, API_BASE_URL_ENV, CONFIG_PATH_ENV, DEFAULT_API_BASE_URL,
};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
#[serial]
fn test_missing_config_uses_defaults() {
    env::remove_var(API_BASE_URL_ENV);
    let dir = TempDir::new().unwrap();

    let config = ConfigResolver::new()
        .with_config_path(Some(dir.path().join("absent.toml")))
        .resolve()
        .unwrap();

    let expected = option_env!("SKETCHCHECK_API_BASE_URL").unwrap_or(DEFAULT_API_BASE_URL);
    assert_eq!(config.api_base_url, expected.trim_end_matches('/'));
    assert_eq!(config.timeout, Duration::from_millis(10_000));
    assert_eq!(config.logging, LoggingConfig::default());
    assert_eq!(config.analysis, AnalysisConfig::default());
}

#[test]
#[serial]
fn test_toml_values_are_applied() {
    env::remove_var(API_BASE_URL_ENV);
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
api_base_url = "http://52.78.81.44:8000/"
timeout_ms = 2500
storage_path = "/tmp/skc-storage.toml"

[logging]
level = "debug"

[analysis]
mode = "fixed"
initial_delay_ms = 500
"#,
    );

    let config = ConfigResolver::new()
        .with_config_path(Some(path))
        .resolve()
        .unwrap();

    assert_eq!(config.api_base_url, "http://52.78.81.44:8000");
    assert_eq!(config.timeout, Duration::from_millis(2500));
    assert_eq!(config.storage_path, PathBuf::from("/tmp/skc-storage.toml"));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.analysis.mode, CompletionMode::Fixed);
    assert_eq!(config.analysis.initial_delay_ms, 500);
    assert_eq!(config.analysis.timeout_ms, 60_000);
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "api_base_url = \"http://from-toml:1\"\n");
    env::set_var(API_BASE_URL_ENV, "http://from-env:2");

    let config = ConfigResolver::new()
        .with_config_path(Some(path))
        .resolve()
        .unwrap();
    assert_eq!(config.api_base_url, "http://from-env:2");

    env::remove_var(API_BASE_URL_ENV);
}

#[test]
#[serial]
fn test_cli_overrides_env_and_toml() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "api_base_url = \"http://from-toml:1\"\n");
    env::set_var(API_BASE_URL_ENV, "http://from-env:2");

    let config = ConfigResolver::new()
        .with_config_path(Some(path))
        .with_api_url(Some("http://from-cli:3/".to_string()))
        .resolve()
        .unwrap();
    assert_eq!(config.api_base_url, "http://from-cli:3");

    env::remove_var(API_BASE_URL_ENV);
}

#[test]
#[serial]
fn test_blank_env_value_is_ignored() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "api_base_url = \"http://from-toml:1\"\n");
    env::set_var(API_BASE_URL_ENV, "   ");

    let config = ConfigResolver::new()
        .with_config_path(Some(path))
        .resolve()
        .unwrap();
    assert_eq!(config.api_base_url, "http://from-toml:1");

    env::remove_var(API_BASE_URL_ENV);
}

#[test]
#[serial]
fn test_config_path_env_var() {
    env::set_var(CONFIG_PATH_ENV, "/tmp/skc-elsewhere.toml");
    assert_eq!(
        ConfigResolver::new().config_path(),
        PathBuf::from("/tmp/skc-elsewhere.toml")
    );

    // CLI flag still wins
    let resolver = ConfigResolver::new().with_config_path(Some(PathBuf::from("/tmp/cli.toml")));
    assert_eq!(resolver.config_path(), PathBuf::from("/tmp/cli.toml"));

    env::remove_var(CONFIG_PATH_ENV);
}

#[test]
#[serial]
fn test_invalid_toml_is_an_error() {
    env::remove_var(API_BASE_URL_ENV);
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "api_base_url = [not valid");

    let result = ConfigResolver::new().with_config_path(Some(path)).resolve();
    assert!(matches!(result, Err(skc_common::Error::Config(_))));
}

#[test]
#[serial]
fn test_invalid_url_is_an_error() {
    env::remove_var(API_BASE_URL_ENV);
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "api_base_url = \"sketchcheck.shop\"\n");

    let result = ConfigResolver::new().with_config_path(Some(path)).resolve();
    assert!(matches!(result, Err(skc_common::Error::Config(_))));
}

#[test]
fn test_write_then_load_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let config = TomlConfig {
        api_base_url: Some("http://localhost:8000".to_string()),
        timeout_ms: Some(5000),
        ..TomlConfig::default()
    };
    write_toml_config(&config, &path).unwrap();

    let loaded = load_toml_config(&path).unwrap().unwrap();
    assert_eq!(loaded, config);
    assert!(load_toml_config(&dir.path().join("missing.toml")).unwrap().is_none());
}
