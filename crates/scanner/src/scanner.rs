//! 스캐너 오케스트레이터 -- 스캔 소스와 SBOM 생성을 하나로 묶음
//!
//! [`Scanner`]는 검증된 [`ScannerConfig`]와 취소 토큰을 보관하고,
//! 소스별 스캔 함수([`crate::source`])를 같은 설정으로 호출합니다.
//!
//! ```text
//! Scanner::scan_* --> source::* --> AnalyzerGroup --> link/merge --> ScanReport
//!                                                                      |
//!                                                     Scanner::generate_sbom --> SbomDocument
//! ```

use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::config::ScannerConfig;
use crate::error::ScannerError;
use crate::sbom::SbomGenerator;
use crate::source::{self, ScanReport};
use crate::types::SbomDocument;

/// 스캐너
///
/// 하나의 인스턴스로 여러 대상을 차례로 스캔할 수 있습니다.
/// [`Scanner::cancel`] 후에는 진행 중인 스캔과 이후 스캔이 모두 `Cancelled`로 끝나므로,
/// 다시 스캔하려면 [`ScannerBuilder`]로 새 인스턴스를 만들어야 합니다.
pub struct Scanner {
    config: ScannerConfig,
    generator: SbomGenerator,
    cancel: CancellationToken,
}

impl Scanner {
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// 진행 중인 스캔을 취소합니다.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 로컬 디렉토리를 스캔합니다.
    pub async fn scan_filesystem(&self, root: impl AsRef<Path>) -> Result<ScanReport, ScannerError> {
        source::scan_local_filesystem(root, &self.config, &self.cancel).await
    }

    /// git 저장소의 전체 이력을 스캔합니다.
    pub async fn scan_git(&self, repo: impl AsRef<Path>) -> Result<ScanReport, ScannerError> {
        source::scan_git_repo(repo, &self.config, &self.cancel).await
    }

    /// `docker save` 형식의 tar 파일을 스캔합니다.
    pub async fn scan_image_file(
        &self,
        archive: impl AsRef<Path>,
    ) -> Result<ScanReport, ScannerError> {
        source::scan_docker_image_from_file(archive, &self.config, &self.cancel).await
    }

    /// Docker 데몬의 이미지를 스캔합니다.
    pub async fn scan_image(&self, image: &str) -> Result<ScanReport, ScannerError> {
        source::scan_docker_image_from_context(image, &self.config, &self.cancel).await
    }

    /// Docker 데몬의 컨테이너를 스캔합니다.
    pub async fn scan_container(&self, container: &str) -> Result<ScanReport, ScannerError> {
        source::scan_docker_container_from_context(container, &self.config, &self.cancel).await
    }

    /// 설정된 형식으로 스캔 결과의 SBOM을 생성합니다.
    pub fn generate_sbom(&self, report: &ScanReport) -> Result<SbomDocument, ScannerError> {
        self.generator.generate(&report.graph)
    }
}

/// 스캐너 빌더
pub struct ScannerBuilder {
    config: ScannerConfig,
    cancel: Option<CancellationToken>,
}

impl ScannerBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ScannerConfig::default(),
            cancel: None,
        }
    }

    /// 스캐너 설정을 지정합니다.
    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// 외부 취소 토큰을 연결합니다.
    ///
    /// 지정하지 않으면 스캐너 전용 토큰을 만듭니다.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 설정을 검증하고 스캐너를 빌드합니다.
    pub fn build(self) -> Result<Scanner, ScannerError> {
        self.config.validate()?;
        Ok(Scanner {
            generator: SbomGenerator::new(self.config.sbom_format),
            config: self.config,
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

impl Default for ScannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
