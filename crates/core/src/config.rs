//! 설정 관리 -- depscan.toml 파싱 및 런타임 설정
//!
//! [`DepscanConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DEPSCAN_SCAN_NUM_WORKERS=8` 형식)
//! 3. 설정 파일 (`depscan.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), depscan_core::error::DepscanError> {
//! use depscan_core::config::DepscanConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DepscanConfig::load("depscan.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DepscanConfig::parse("[scan]\nnum_workers = 8")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, DepscanError};

/// 허용되는 스캔 모드 이름 (`|`로 조합 가능)
pub const SCAN_MODES: [&str; 3] = ["all", "pkg", "language"];

/// 워커 수 상한
pub const MAX_NUM_WORKERS: usize = 256;

/// 단일 파일 최대 크기 상한 (1 GiB)
pub const MAX_FILE_SIZE_LIMIT: usize = 1024 * 1024 * 1024;

/// depscan 통합 설정
///
/// `depscan.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepscanConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스캔 설정
    #[serde(default)]
    pub scan: ScanConfig,
}

impl DepscanConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DepscanError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일이 없으면 기본값에 환경변수만 적용합니다.
    ///
    /// CLI처럼 설정 파일 없이도 동작해야 하는 호출자를 위한 진입점입니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, DepscanError> {
        let path = path.as_ref();
        match Self::load(path).await {
            Err(DepscanError::Config(ConfigError::FileNotFound { .. })) => {
                debug!(path = %path.display(), "config file not found, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DepscanError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DepscanError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DepscanError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DepscanError> {
        toml::from_str(toml_str).map_err(|e| {
            DepscanError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DEPSCAN_{SECTION}_{FIELD}`
    /// 예: `DEPSCAN_SCAN_SCAN_MODE=pkg|language`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DEPSCAN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DEPSCAN_GENERAL_LOG_FORMAT");

        // Scan
        override_usize(&mut self.scan.num_workers, "DEPSCAN_SCAN_NUM_WORKERS");
        override_string(&mut self.scan.scan_mode, "DEPSCAN_SCAN_SCAN_MODE");
        override_csv(
            &mut self.scan.used_analyzers,
            "DEPSCAN_SCAN_USED_ANALYZERS",
        );
        override_csv(
            &mut self.scan.disable_languages,
            "DEPSCAN_SCAN_DISABLE_LANGUAGES",
        );
        override_string(&mut self.scan.endpoint, "DEPSCAN_SCAN_ENDPOINT");
        override_usize(&mut self.scan.max_file_size, "DEPSCAN_SCAN_MAX_FILE_SIZE");
        override_bool(&mut self.scan.strict, "DEPSCAN_SCAN_STRICT");
        override_string(&mut self.scan.sbom_format, "DEPSCAN_SCAN_SBOM_FORMAT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DepscanError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        self.scan.validate()
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 스캔 설정
///
/// 스캐너 크레이트는 이 섹션을 `ScannerConfig::from_core`로 변환해 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 분석 워커 수
    pub num_workers: usize,
    /// 스캔 모드 (`all`, `pkg`, `language`, `|`로 조합)
    pub scan_mode: String,
    /// 명시적으로 사용할 분석기 태그
    pub used_analyzers: Vec<String>,
    /// 비활성화할 분석기 태그
    pub disable_languages: Vec<String>,
    /// 컨테이너 런타임 소켓 경로 (빈 값이면 로컬 기본값)
    pub endpoint: String,
    /// 분석 대상 파일 최대 크기 (바이트)
    pub max_file_size: usize,
    /// strict 모드 (일부 분석기의 파싱 실패를 스캔 실패로 전파)
    pub strict: bool,
    /// SBOM 출력 형식 (cyclonedx, spdx)
    pub sbom_format: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            num_workers: 5,
            scan_mode: "all".to_owned(),
            used_analyzers: Vec::new(),
            disable_languages: Vec::new(),
            endpoint: String::new(),
            max_file_size: 256 * 1024 * 1024, // 256MB
            strict: false,
            sbom_format: "cyclonedx".to_owned(),
        }
    }
}

impl ScanConfig {
    /// 스캔 섹션의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DepscanError> {
        if self.num_workers == 0 || self.num_workers > MAX_NUM_WORKERS {
            return Err(ConfigError::InvalidValue {
                field: "scan.num_workers".to_owned(),
                reason: format!("must be between 1 and {MAX_NUM_WORKERS}"),
            }
            .into());
        }

        for mode in self.scan_mode.split('|').map(str::trim) {
            if !SCAN_MODES.contains(&mode) {
                return Err(ConfigError::InvalidValue {
                    field: "scan.scan_mode".to_owned(),
                    reason: format!(
                        "unknown mode '{mode}', must be one of: {}",
                        SCAN_MODES.join(", ")
                    ),
                }
                .into());
            }
        }

        if self.max_file_size == 0 || self.max_file_size > MAX_FILE_SIZE_LIMIT {
            return Err(ConfigError::InvalidValue {
                field: "scan.max_file_size".to_owned(),
                reason: format!("must be between 1 and {MAX_FILE_SIZE_LIMIT}"),
            }
            .into());
        }

        let valid_sbom_formats = ["cyclonedx", "spdx"];
        if !valid_sbom_formats.contains(&self.sbom_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "scan.sbom_format".to_owned(),
                reason: format!("must be one of: {}", valid_sbom_formats.join(", ")),
            }
            .into());
        }

        Ok(())
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = DepscanConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.scan.num_workers, 5);
        assert_eq!(config.scan.scan_mode, "all");
        assert!(!config.scan.strict);
        assert!(config.scan.used_analyzers.is_empty());
    }

    #[test]
    fn default_config_passes_validation() {
        let config = DepscanConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = DepscanConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.scan.sbom_format, "cyclonedx");
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[scan]
num_workers = 12
scan_mode = "pkg|language"
used_analyzers = ["conan"]
"#;
        let config = DepscanConfig::parse(toml).unwrap();
        assert_eq!(config.scan.num_workers, 12);
        assert_eq!(config.scan.scan_mode, "pkg|language");
        assert_eq!(config.scan.used_analyzers, vec!["conan"]);
        // general은 기본값 유지
        assert_eq!(config.general.log_level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let result = DepscanConfig::parse("invalid = [[[toml");
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            DepscanError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = DepscanConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = DepscanConfig::default();
        config.scan.num_workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("num_workers"));
    }

    #[test]
    fn validate_rejects_unknown_scan_mode() {
        let mut config = DepscanConfig::default();
        config.scan.scan_mode = "pkg|os".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scan_mode"));
    }

    #[test]
    fn validate_rejects_oversized_max_file_size() {
        let mut config = DepscanConfig::default();
        config.scan.max_file_size = MAX_FILE_SIZE_LIMIT + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_file_size"));
    }

    #[test]
    fn validate_rejects_unknown_sbom_format() {
        let mut config = DepscanConfig::default();
        config.scan.sbom_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sbom_format"));
    }

    #[test]
    #[serial]
    fn env_override_applies_to_scan_section() {
        let mut config = DepscanConfig::default();
        // SAFETY: serial 테스트로 환경변수 접근이 직렬화됩니다.
        unsafe {
            std::env::set_var("DEPSCAN_SCAN_NUM_WORKERS", "9");
            std::env::set_var("DEPSCAN_SCAN_DISABLE_LANGUAGES", "java-jar, node-npm");
        }
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("DEPSCAN_SCAN_NUM_WORKERS");
            std::env::remove_var("DEPSCAN_SCAN_DISABLE_LANGUAGES");
        }
        assert_eq!(config.scan.num_workers, 9);
        assert_eq!(config.scan.disable_languages, vec!["java-jar", "node-npm"]);
    }

    #[test]
    #[serial]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = false;
        // SAFETY: serial 테스트로 환경변수 접근이 직렬화됩니다.
        unsafe { std::env::set_var("TEST_DEPSCAN_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_DEPSCAN_BOOL_BAD");
        assert!(!val);
        unsafe { std::env::remove_var("TEST_DEPSCAN_BOOL_BAD") };
    }

    #[test]
    #[serial]
    fn env_override_csv_skips_empty_items() {
        let mut val = vec!["a".to_owned()];
        // SAFETY: serial 테스트로 환경변수 접근이 직렬화됩니다.
        unsafe { std::env::set_var("TEST_DEPSCAN_CSV", "x,, y ,") };
        override_csv(&mut val, "TEST_DEPSCAN_CSV");
        assert_eq!(val, vec!["x", "y"]);
        unsafe { std::env::remove_var("TEST_DEPSCAN_CSV") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_DEPSCAN_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = DepscanConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = DepscanConfig::parse(&toml_str).unwrap();
        assert_eq!(config.general.log_level, parsed.general.log_level);
        assert_eq!(config.scan.max_file_size, parsed.scan.max_file_size);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = DepscanConfig::from_file("/nonexistent/path/depscan.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DepscanError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    #[serial]
    async fn load_or_default_falls_back_when_missing() {
        let config = DepscanConfig::load_or_default("/nonexistent/path/depscan.toml")
            .await
            .unwrap();
        assert_eq!(config.scan.num_workers, 5);
    }
}
