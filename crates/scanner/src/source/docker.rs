//! Docker 데몬 스캔
//!
//! 이미지(`docker save`)나 컨테이너 파일 시스템(`docker export`)을 임시 파일로
//! 내려받은 뒤 tar 스캐너로 넘깁니다.
//!
//! 데몬 호출은 [`ExportClient`] trait 뒤에 있어 테스트에서 대체할 수 있습니다.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ScannerConfig;
use crate::error::ScannerError;

use super::image::{scan_image_archive, scan_rootfs_archive};
use super::{ScanReport, SourceKind, record_scan};

/// 데몬 연결 타임아웃 (초)
const CONNECT_TIMEOUT_SECS: u64 = 120;

/// 이미지/컨테이너 참조 최대 길이
const MAX_REFERENCE_LEN: usize = 256;

/// 이미지와 컨테이너를 tar로 내보내는 클라이언트
pub trait ExportClient: Send + Sync + 'static {
    /// 이미지를 `docker save` 형식 tar로 `dest`에 씁니다.
    fn export_image(
        &self,
        image: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<(), ScannerError>> + Send;

    /// 컨테이너 파일 시스템을 tar로 `dest`에 씁니다.
    fn export_container(
        &self,
        container: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<(), ScannerError>> + Send;
}

/// `bollard` 기반 클라이언트
pub struct BollardExportClient {
    docker: Arc<bollard::Docker>,
}

impl BollardExportClient {
    /// 엔드포인트로 데몬에 연결합니다.
    ///
    /// - 빈 문자열: 플랫폼 기본 소켓
    /// - `tcp://`, `http://`: HTTP 연결
    /// - 그 외: 유닉스 소켓 경로 (`unix://` 접두사 허용)
    pub fn connect(endpoint: &str) -> Result<Self, ScannerError> {
        let docker = if endpoint.is_empty() {
            bollard::Docker::connect_with_local_defaults()
        } else if endpoint.starts_with("tcp://") || endpoint.starts_with("http://") {
            bollard::Docker::connect_with_http(
                endpoint,
                CONNECT_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )
        } else {
            bollard::Docker::connect_with_socket(
                endpoint,
                CONNECT_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )
        }
        .map_err(|e| ScannerError::Docker(format!("failed to connect to docker: {e}")))?;

        Ok(Self {
            docker: Arc::new(docker),
        })
    }
}

impl ExportClient for BollardExportClient {
    async fn export_image(&self, image: &str, dest: &Path) -> Result<(), ScannerError> {
        let stream = self.docker.export_image(image);
        write_stream(stream, dest).await
    }

    async fn export_container(&self, container: &str, dest: &Path) -> Result<(), ScannerError> {
        let stream = self.docker.export_container(container);
        write_stream(stream, dest).await
    }
}

async fn write_stream<S>(stream: S, dest: &Path) -> Result<(), ScannerError>
where
    S: futures_util::Stream<Item = Result<bytes::Bytes, bollard::errors::Error>>,
{
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| ScannerError::Io {
            path: dest.display().to_string(),
            source: e,
        })?;

    let mut stream = std::pin::pin!(stream);
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ScannerError::Docker(format!("export failed: {e}")))?;
        file.write_all(&chunk).await.map_err(|e| ScannerError::Io {
            path: dest.display().to_string(),
            source: e,
        })?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| ScannerError::Io {
        path: dest.display().to_string(),
        source: e,
    })?;

    debug!(dest = %dest.display(), bytes = written, "export written");
    Ok(())
}

/// 데몬의 이미지를 스캔합니다. `config.endpoint`로 소켓을 고릅니다.
pub async fn scan_docker_image_from_context(
    image: &str,
    config: &ScannerConfig,
    cancel: &CancellationToken,
) -> Result<ScanReport, ScannerError> {
    let client = BollardExportClient::connect(&config.endpoint)?;
    scan_image_with(&client, image, config, cancel).await
}

/// 데몬의 컨테이너 파일 시스템을 스캔합니다.
pub async fn scan_docker_container_from_context(
    container: &str,
    config: &ScannerConfig,
    cancel: &CancellationToken,
) -> Result<ScanReport, ScannerError> {
    let client = BollardExportClient::connect(&config.endpoint)?;
    scan_container_with(&client, container, config, cancel).await
}

/// 주어진 클라이언트로 이미지를 내보내고 스캔합니다.
pub async fn scan_image_with<C: ExportClient>(
    client: &C,
    image: &str,
    config: &ScannerConfig,
    cancel: &CancellationToken,
) -> Result<ScanReport, ScannerError> {
    let started = Instant::now();
    info!(image, "scanning docker image");

    let result = async {
        validate_reference(image)?;
        let export = export_file()?;
        client.export_image(image, export.path()).await?;
        scan_image_archive(
            export.path().to_path_buf(),
            SourceKind::Image,
            image,
            config,
            cancel,
        )
        .await
    }
    .await;

    record_scan(SourceKind::Image, image, started, &result);
    result
}

/// 주어진 클라이언트로 컨테이너를 내보내고 스캔합니다.
pub async fn scan_container_with<C: ExportClient>(
    client: &C,
    container: &str,
    config: &ScannerConfig,
    cancel: &CancellationToken,
) -> Result<ScanReport, ScannerError> {
    let started = Instant::now();
    info!(container, "scanning docker container");

    let result = async {
        validate_reference(container)?;
        let export = export_file()?;
        client.export_container(container, export.path()).await?;
        scan_rootfs_archive(
            export.path().to_path_buf(),
            SourceKind::Container,
            container,
            config,
            cancel,
        )
        .await
    }
    .await;

    record_scan(SourceKind::Container, container, started, &result);
    result
}

fn export_file() -> Result<tempfile::NamedTempFile, ScannerError> {
    tempfile::Builder::new()
        .prefix("depscan-export-")
        .suffix(".tar")
        .tempfile()
        .map_err(|e| ScannerError::Io {
            path: std::env::temp_dir().display().to_string(),
            source: e,
        })
}

/// 이미지/컨테이너 참조를 검증합니다.
fn validate_reference(reference: &str) -> Result<(), ScannerError> {
    if reference.is_empty() || reference.len() > MAX_REFERENCE_LEN {
        return Err(ScannerError::Docker(format!(
            "invalid reference: length {} (must be 1-{MAX_REFERENCE_LEN})",
            reference.len()
        )));
    }
    if reference
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(ScannerError::Docker(
            "invalid reference: contains whitespace or control characters".to_owned(),
        ));
    }
    Ok(())
}
