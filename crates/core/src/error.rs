//! 에러 타입 -- 도메인별 에러 정의

/// depscan 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DepscanError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 스캔 처리 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DepscanError {
    /// 스캔 전체를 중단시킨 소스 접근 실패인지 확인합니다.
    pub fn is_source_access(&self) -> bool {
        matches!(self, Self::Scan(ScanError::SourceAccess(_)))
    }
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 스캔 처리 에러
///
/// 스캐너 크레이트의 세부 에러는 이 분류로 축약되어 상위로 전파됩니다.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 스캔 대상(디렉토리, 이미지, 저장소)을 열 수 없음
    #[error("source access failed: {0}")]
    SourceAccess(String),

    /// 매니페스트 파싱 실패
    #[error("parse failed: {0}")]
    ParseFailed(String),

    /// 스캔 실행 실패
    #[error("scan failed: {0}")]
    ScanFailed(String),

    /// SBOM 문서 생성 실패
    #[error("sbom export failed: {0}")]
    SbomExport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_into_depscan_error() {
        let err: DepscanError = ConfigError::InvalidValue {
            field: "scan.num_workers".to_owned(),
            reason: "must be greater than 0".to_owned(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.starts_with("config error"));
        assert!(msg.contains("scan.num_workers"));
    }

    #[test]
    fn source_access_is_detected() {
        let err: DepscanError = ScanError::SourceAccess("/nope".to_owned()).into();
        assert!(err.is_source_access());

        let err: DepscanError = ScanError::ParseFailed("go.mod".to_owned()).into();
        assert!(!err.is_source_access());
    }
}
