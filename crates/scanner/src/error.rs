//! 스캐너 에러 타입
//!
//! [`ScannerError`]는 스캐너 모듈 내에서 발생할 수 있는 모든 에러를 나타냅니다.
//! `From<ScannerError> for DepscanError` 구현을 통해 `?` 연산자로
//! 상위 에러 타입으로 자연스럽게 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **소스 접근 (치명적)**: `SourceAccess`, `Docker`, `Git`
//! - **파일 파싱 (복구 가능)**: `Parse`, `FileTooBig`
//! - **SBOM 생성**: `SbomGeneration`
//! - **설정**: `Config`
//! - **실행**: `Worker`, `Cancelled`
//! - **파일 I/O**: `Io`

use depscan_core::error::{DepscanError, ScanError};

/// 스캐너 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    /// 매니페스트 파싱 실패
    #[error("parse error: {path}: {reason}")]
    Parse {
        /// 파싱 대상 파일 경로
        path: String,
        /// 파싱 실패 사유
        reason: String,
    },

    /// 스캔 대상을 열거나 순회할 수 없음
    #[error("source access error: {source_name}: {reason}")]
    SourceAccess {
        /// 스캔 대상 (경로, 이미지 ID 등)
        source_name: String,
        /// 실패 사유
        reason: String,
    },

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// Docker 데몬 통신 실패
    #[error("docker error: {0}")]
    Docker(String),

    /// git 명령 실행 실패
    #[error("git error: {0}")]
    Git(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// SBOM 문서 생성 실패
    #[error("sbom generation error: {0}")]
    SbomGeneration(String),

    /// 파일 크기 초과
    #[error("file too large: {path}: {size} bytes (max: {max})")]
    FileTooBig {
        /// 파일 경로
        path: String,
        /// 실제 파일 크기 (바이트)
        size: u64,
        /// 최대 허용 크기 (바이트)
        max: u64,
    },

    /// 분석 워커 실행 실패
    #[error("worker error: {0}")]
    Worker(String),

    /// 호출자가 스캔을 취소함
    #[error("scan cancelled")]
    Cancelled,
}

impl ScannerError {
    /// 파일 단위 에러여서 스캔을 계속할 수 있는지 여부를 반환합니다.
    ///
    /// 복구 가능한 에러는 로그로 남기고 해당 파일의 결과만 제외합니다.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::FileTooBig { .. } | Self::Io { .. }
        )
    }

    /// 파싱 에러를 생성하는 헬퍼
    pub(crate) fn parse(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// 소스 접근 에러를 생성하는 헬퍼
    pub(crate) fn source_access(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceAccess {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<ScannerError> for DepscanError {
    fn from(err: ScannerError) -> Self {
        match err {
            ScannerError::Parse { path, reason } => {
                DepscanError::Scan(ScanError::ParseFailed(format!("{path}: {reason}")))
            }
            ScannerError::SourceAccess {
                source_name,
                reason,
            } => DepscanError::Scan(ScanError::SourceAccess(format!("{source_name}: {reason}"))),
            ScannerError::Docker(msg) => {
                DepscanError::Scan(ScanError::SourceAccess(format!("docker: {msg}")))
            }
            ScannerError::Git(msg) => {
                DepscanError::Scan(ScanError::SourceAccess(format!("git: {msg}")))
            }
            ScannerError::Io { path, source } => {
                DepscanError::Scan(ScanError::ScanFailed(format!("io error: {path}: {source}")))
            }
            ScannerError::Config { field, reason } => DepscanError::Config(
                depscan_core::error::ConfigError::InvalidValue { field, reason },
            ),
            ScannerError::SbomGeneration(msg) => DepscanError::Scan(ScanError::SbomExport(msg)),
            ScannerError::FileTooBig { path, size, max } => DepscanError::Scan(
                ScanError::ScanFailed(format!("file too large: {path}: {size} bytes (max: {max})")),
            ),
            ScannerError::Worker(msg) => DepscanError::Scan(ScanError::ScanFailed(msg)),
            ScannerError::Cancelled => {
                DepscanError::Scan(ScanError::ScanFailed("scan cancelled".to_owned()))
            }
        }
    }
}
