//! 스캐너 설정
//!
//! [`ScannerConfig`]는 core의 [`ScanConfig`](depscan_core::config::ScanConfig)에서
//! 파생되며, 문자열로 된 모드와 분석기 태그를 타입으로 해석한 형태입니다.
//!
//! # 사용 예시
//!
//! ```
//! use depscan_scanner::{AnalyzerType, ScanMode, ScannerConfig, ScannerConfigBuilder};
//!
//! // 기본값으로 생성
//! let config = ScannerConfig::default();
//! config.validate().unwrap();
//!
//! // 빌더로 생성
//! let config = ScannerConfigBuilder::new()
//!     .num_workers(8)
//!     .scan_mode(ScanMode::LANGUAGE)
//!     .disable_analyzer(AnalyzerType::JavaJar)
//!     .build()
//!     .unwrap();
//! ```

use depscan_core::config::{MAX_FILE_SIZE_LIMIT, MAX_NUM_WORKERS, ScanConfig};

use crate::error::ScannerError;
use crate::types::{AnalyzerType, SbomFormat, ScanMode};

/// 스캔 실행 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    /// 분석 워커 수
    pub num_workers: usize,
    /// 스캔 모드
    pub scan_mode: ScanMode,
    /// 항상 포함할 분석기
    pub used_analyzers: Vec<AnalyzerType>,
    /// 제외할 분석기
    pub disabled_analyzers: Vec<AnalyzerType>,
    /// 컨테이너 런타임 소켓 (빈 값이면 로컬 기본값)
    pub endpoint: String,
    /// 분석 대상 파일 최대 크기 (바이트)
    pub max_file_size: u64,
    /// strict 모드
    pub strict: bool,
    /// SBOM 출력 형식
    pub sbom_format: SbomFormat,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            num_workers: 5,
            scan_mode: ScanMode::ALL,
            used_analyzers: Vec::new(),
            disabled_analyzers: Vec::new(),
            endpoint: String::new(),
            max_file_size: 256 * 1024 * 1024, // 256MB
            strict: false,
            sbom_format: SbomFormat::CycloneDx,
        }
    }
}

impl ScannerConfig {
    /// core의 `[scan]` 섹션에서 스캐너 설정을 생성합니다.
    ///
    /// 알 수 없는 스캔 모드나 분석기 태그는 설정 에러입니다.
    pub fn from_core(core: &ScanConfig) -> Result<Self, ScannerError> {
        let scan_mode = ScanMode::parse(&core.scan_mode).ok_or_else(|| ScannerError::Config {
            field: "scan_mode".to_owned(),
            reason: format!("unknown scan mode '{}'", core.scan_mode),
        })?;
        let sbom_format =
            SbomFormat::from_str_loose(&core.sbom_format).ok_or_else(|| ScannerError::Config {
                field: "sbom_format".to_owned(),
                reason: format!("unknown sbom format '{}'", core.sbom_format),
            })?;

        let config = Self {
            num_workers: core.num_workers,
            scan_mode,
            used_analyzers: parse_tags("used_analyzers", &core.used_analyzers)?,
            disabled_analyzers: parse_tags("disable_languages", &core.disable_languages)?,
            endpoint: core.endpoint.clone(),
            max_file_size: u64::try_from(core.max_file_size).unwrap_or(u64::MAX),
            strict: core.strict,
            sbom_format,
        };
        config.validate()?;
        Ok(config)
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - `num_workers`: 1-256
    /// - `max_file_size`: 1 - 1 GiB
    pub fn validate(&self) -> Result<(), ScannerError> {
        if self.num_workers == 0 || self.num_workers > MAX_NUM_WORKERS {
            return Err(ScannerError::Config {
                field: "num_workers".to_owned(),
                reason: format!("must be 1-{MAX_NUM_WORKERS}"),
            });
        }

        if self.max_file_size == 0 || self.max_file_size > MAX_FILE_SIZE_LIMIT as u64 {
            return Err(ScannerError::Config {
                field: "max_file_size".to_owned(),
                reason: format!("must be 1-{MAX_FILE_SIZE_LIMIT}"),
            });
        }

        Ok(())
    }
}

/// 분석기 태그 목록을 해석합니다.
pub fn parse_tags(field: &str, tags: &[String]) -> Result<Vec<AnalyzerType>, ScannerError> {
    tags.iter()
        .map(|tag| {
            AnalyzerType::from_tag(tag).ok_or_else(|| ScannerError::Config {
                field: field.to_owned(),
                reason: format!("unknown analyzer '{tag}'"),
            })
        })
        .collect()
}

/// [`ScannerConfig`] 빌더
#[derive(Default)]
pub struct ScannerConfigBuilder {
    config: ScannerConfig,
}

impl ScannerConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_workers(mut self, workers: usize) -> Self {
        self.config.num_workers = workers;
        self
    }

    pub fn scan_mode(mut self, mode: ScanMode) -> Self {
        self.config.scan_mode = mode;
        self
    }

    /// 항상 포함할 분석기를 추가합니다.
    pub fn use_analyzer(mut self, kind: AnalyzerType) -> Self {
        self.config.used_analyzers.push(kind);
        self
    }

    /// 제외할 분석기를 추가합니다.
    pub fn disable_analyzer(mut self, kind: AnalyzerType) -> Self {
        self.config.disabled_analyzers.push(kind);
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn max_file_size(mut self, size: u64) -> Self {
        self.config.max_file_size = size;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    pub fn sbom_format(mut self, format: SbomFormat) -> Self {
        self.config.sbom_format = format;
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `ScannerError::Config` 반환
    pub fn build(self) -> Result<ScannerConfig, ScannerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
