//! depscan.toml 통합 설정 테스트
//!
//! - depscan.toml.example 파싱 테스트
//! - 파일 로딩 및 환경변수 우선순위 테스트
//! - 잘못된 형식 에러 테스트

use std::io::Write;

use depscan_core::config::DepscanConfig;
use depscan_core::error::{ConfigError, DepscanError};
use serial_test::serial;

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../depscan.toml.example");
    let config = DepscanConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.scan.num_workers, 5);
    assert_eq!(config.scan.scan_mode, "all");
    assert_eq!(config.scan.max_file_size, 268_435_456);
    assert!(config.scan.endpoint.is_empty());
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../depscan.toml.example");
    let config = DepscanConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[tokio::test]
#[serial]
async fn load_applies_env_over_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[scan]\nnum_workers = 3\nstrict = false").unwrap();

    // SAFETY: serial 테스트로 환경변수 접근이 직렬화됩니다.
    unsafe { std::env::set_var("DEPSCAN_SCAN_STRICT", "true") };
    let config = DepscanConfig::load(file.path()).await;
    unsafe { std::env::remove_var("DEPSCAN_SCAN_STRICT") };

    let config = config.unwrap();
    assert_eq!(config.scan.num_workers, 3);
    assert!(config.scan.strict);
}

#[tokio::test]
#[serial]
async fn load_rejects_invalid_values_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[scan]\nnum_workers = 1000").unwrap();

    let err = DepscanConfig::load(file.path()).await.unwrap_err();
    assert!(matches!(
        err,
        DepscanError::Config(ConfigError::InvalidValue { .. })
    ));
}

#[tokio::test]
async fn load_reports_parse_failure() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[scan\nnum_workers = ").unwrap();

    let err = DepscanConfig::from_file(file.path()).await.unwrap_err();
    assert!(matches!(
        err,
        DepscanError::Config(ConfigError::ParseFailed { .. })
    ));
}
