//! Integration tests for `depscan config` command.
//!
//! Tests config validation and display functionality with real TOML files.

use std::fs;
use tempfile::TempDir;

use depscan_core::config::DepscanConfig;
use depscan_core::error::{ConfigError, DepscanError};

#[tokio::test]
async fn test_config_validate_valid_toml() {
    // Given: A valid config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("depscan.toml");

    let valid_config = r#"
[general]
log_level = "info"
log_format = "json"

[scan]
num_workers = 8
scan_mode = "pkg|language"
sbom_format = "spdx"
"#;

    fs::write(&config_path, valid_config).expect("should write config");

    // When: Loading the config
    let result = DepscanConfig::load(&config_path).await;

    // Then: Should succeed
    let config = result.expect("valid config should load successfully");
    assert_eq!(config.scan.num_workers, 8);
    assert_eq!(config.scan.scan_mode, "pkg|language");
}

#[tokio::test]
async fn test_config_validate_malformed_toml() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("bad.toml");

    fs::write(&config_path, "[general\nlog_level = \"info\"\n").expect("should write bad config");

    let result = DepscanConfig::load(&config_path).await;

    assert!(
        matches!(
            result,
            Err(DepscanError::Config(ConfigError::ParseFailed { .. }))
        ),
        "malformed TOML should fail to parse"
    );
}

#[tokio::test]
async fn test_config_validate_missing_file() {
    let config_path = std::path::PathBuf::from("/nonexistent/depscan.toml");

    let result = DepscanConfig::load(&config_path).await;

    assert!(matches!(
        result,
        Err(DepscanError::Config(ConfigError::FileNotFound { .. }))
    ));
}

#[tokio::test]
async fn test_config_missing_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("absent.toml");

    let config = DepscanConfig::load_or_default(&config_path)
        .await
        .expect("missing file should use defaults");

    assert_eq!(config.scan.sbom_format, "cyclonedx");
    assert!(config.scan.endpoint.is_empty());
}

#[tokio::test]
async fn test_config_validate_empty_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("empty.toml");

    fs::write(&config_path, "").expect("should write empty file");

    let config = DepscanConfig::load(&config_path)
        .await
        .expect("empty config should use defaults");
    assert_eq!(config.general.log_format, "pretty");
    assert!(!config.scan.strict, "strict should be off by default");
}

#[tokio::test]
async fn test_config_invalid_worker_count() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("workers.toml");

    fs::write(&config_path, "[scan]\nnum_workers = 0\n").expect("should write config");

    let result = DepscanConfig::load(&config_path).await;

    match result {
        Err(DepscanError::Config(ConfigError::InvalidValue { field, .. })) => {
            assert_eq!(field, "scan.num_workers");
        }
        other => panic!("expected invalid value error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_config_show_full_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("depscan.toml");

    let full_config = r#"
[general]
log_level = "debug"
log_format = "pretty"

[scan]
num_workers = 2
scan_mode = "language"
used_analyzers = ["dpkg"]
disable_languages = [
    "java-jar",
    "go-binary",
]
endpoint = "unix:///var/run/docker.sock"
max_file_size = 1048576
strict = true
sbom_format = "cyclonedx"
"#;

    fs::write(&config_path, full_config).expect("should write config");

    let config = DepscanConfig::load(&config_path)
        .await
        .expect("full config should load");

    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.scan.used_analyzers, vec!["dpkg"]);
    assert_eq!(config.scan.disable_languages.len(), 2);
    assert!(config.scan.endpoint.starts_with("unix://"));
    assert_eq!(config.scan.max_file_size, 1_048_576);
    assert!(config.scan.strict);

    // The effective config serialises back to TOML for `config show`.
    let rendered = toml::to_string_pretty(&config.scan).expect("serialize scan section");
    assert!(rendered.contains("num_workers = 2"));
}

#[tokio::test]
async fn test_config_unknown_sbom_format_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("sbom.toml");

    fs::write(&config_path, "[scan]\nsbom_format = \"swid\"\n").expect("should write config");

    assert!(DepscanConfig::load(&config_path).await.is_err());
}
