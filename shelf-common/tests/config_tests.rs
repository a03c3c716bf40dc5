//! Tests for configuration loading and resolution priority
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SHELF_* variables are marked with #[serial].

use serial_test::serial;
use shelf_common::config::{
    load_toml_config, resolve_config, ConfigOverrides, TomlConfig, ENV_API_KEY, ENV_CONFIG_PATH,
    ENV_PLATFORM_TOKEN, ENV_PLATFORM_URL, ENV_PORT, ENV_SITE_ID,
};
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

fn clear_env() {
    for name in [
        ENV_API_KEY,
        ENV_CONFIG_PATH,
        ENV_PLATFORM_TOKEN,
        ENV_PLATFORM_URL,
        ENV_PORT,
        ENV_SITE_ID,
    ] {
        env::remove_var(name);
    }
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file
}

#[test]
fn test_defaults() {
    let config = TomlConfig::default();

    assert_eq!(config.bind_address, "127.0.0.1");
    assert_eq!(config.port, 5780);
    assert!(config.api_key.is_none());
    assert_eq!(config.platform.base_url, "https://www.wixapis.com");
    assert_eq!(config.platform.request_timeout(), Duration::from_secs(30));
    assert_eq!(config.catalog.page_size, 1000);
    assert_eq!(config.catalog.media_concurrency, 10);
    assert_eq!(config.catalog.media_timeout(), Some(Duration::from_secs(20)));
    assert_eq!(config.catalog.audiobooks_collection, "PremiumAudiobooks");
    assert_eq!(config.catalog.chapters_collection, "audiobookChapters");
    assert_eq!(config.catalog.achievements_collection, "achievements");
    assert_eq!(config.catalog.member_reference_collection, "memberReferenceData");
    assert_eq!(config.catalog.sponsorships_collection, "sponsorships");
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_partial_toml_fills_defaults() {
    let file = write_config(
        r#"
        port = 6000
        api_key = "from-toml"

        [catalog]
        media_concurrency = 4
        media_timeout_secs = 0
        "#,
    );

    let config = load_toml_config(file.path()).unwrap();

    assert_eq!(config.port, 6000);
    assert_eq!(config.api_key.as_deref(), Some("from-toml"));
    assert_eq!(config.catalog.media_concurrency, 4);
    assert_eq!(config.catalog.media_timeout(), None);
    assert_eq!(config.catalog.page_size, 1000);
    assert_eq!(config.platform.base_url, "https://www.wixapis.com");
}

#[test]
fn test_invalid_toml_is_config_error() {
    let file = write_config("port = \"not a number\"");

    let err = load_toml_config(file.path()).unwrap_err();

    assert!(err.to_string().contains("Configuration error"));
}

#[test]
fn test_require_api_key() {
    let mut config = TomlConfig::default();
    assert!(config.require_api_key().is_err());

    config.api_key = Some("   ".to_string());
    assert!(config.require_api_key().is_err());

    config.api_key = Some("secret".to_string());
    assert_eq!(config.require_api_key().unwrap(), "secret");
}

#[test]
fn test_validate_rejects_zero_values() {
    let mut config = TomlConfig::default();
    assert!(config.validate().is_ok());

    config.catalog.media_concurrency = 0;
    assert!(config.validate().is_err());

    config.catalog.media_concurrency = 1;
    config.catalog.page_size = 0;
    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();
    let file = write_config(
        r#"
        api_key = "from-toml"
        port = 6000

        [platform]
        base_url = "https://toml.example"
        "#,
    );

    env::set_var(ENV_API_KEY, "from-env");
    env::set_var(ENV_PLATFORM_URL, "https://env.example");
    env::set_var(ENV_PLATFORM_TOKEN, "token");
    env::set_var(ENV_SITE_ID, "site-1");

    let overrides = ConfigOverrides {
        config_path: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    let config = resolve_config(&overrides).unwrap();

    assert_eq!(config.api_key.as_deref(), Some("from-env"));
    assert_eq!(config.platform.base_url, "https://env.example");
    assert_eq!(config.platform.api_token.as_deref(), Some("token"));
    assert_eq!(config.platform.site_id.as_deref(), Some("site-1"));
    assert_eq!(config.port, 6000);

    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env();
    let file = write_config("port = 6000");
    env::set_var(ENV_PORT, "6100");

    let overrides = ConfigOverrides {
        config_path: Some(file.path().to_path_buf()),
        port: Some(6200),
        bind_address: Some("0.0.0.0".to_string()),
    };
    let config = resolve_config(&overrides).unwrap();

    assert_eq!(config.port, 6200);
    assert_eq!(config.bind_address, "0.0.0.0");

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_port_is_error() {
    clear_env();
    let file = write_config("");
    env::set_var(ENV_PORT, "eighty");

    let overrides = ConfigOverrides {
        config_path: Some(file.path().to_path_buf()),
        ..Default::default()
    };

    assert!(resolve_config(&overrides).is_err());

    clear_env();
}

#[test]
#[serial]
fn test_config_path_from_env() {
    clear_env();
    let file = write_config("port = 6300");
    env::set_var(ENV_CONFIG_PATH, file.path());

    let config = resolve_config(&ConfigOverrides::default()).unwrap();

    assert_eq!(config.port, 6300);
    assert_eq!(config.source.as_deref(), Some(file.path()));

    clear_env();
}

#[test]
#[serial]
fn test_explicit_missing_file_is_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let missing: PathBuf = dir.path().join("absent.toml");

    let overrides = ConfigOverrides {
        config_path: Some(missing),
        ..Default::default()
    };

    assert!(resolve_config(&overrides).is_err());
}
