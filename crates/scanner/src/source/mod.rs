//! 스캔 소스 -- 후보 파일을 분석기 그룹에 공급
//!
//! 각 소스는 대상(디렉토리, git 저장소, 이미지 tar, Docker 데몬)을 순회하며
//! 파일을 [`AnalyzerGroup::append`]로 넘기고, 분석이 끝나면
//! 그래프 구성([`link_packages`])과 병합([`merge_packages`])을 한 번 수행합니다.
//!
//! 대상 자체를 열 수 없는 경우에만 스캔이 실패합니다.
//! 개별 파일의 실패는 [`ScanReport::errors`]에 남습니다.

pub mod docker;
pub mod fs;
pub mod git;
pub mod image;

use std::fmt;
use std::time::Instant;

use tracing::info;

use depscan_core::metrics as m;

use crate::analyzer::{AnalyzerGroup, FileError, filter_analyzers};
use crate::config::ScannerConfig;
use crate::error::ScannerError;
use crate::graph::{MergeSummary, PackageGraph, link_packages, merge_packages};
use crate::package::Package;

pub use docker::{scan_docker_container_from_context, scan_docker_image_from_context};
pub use fs::scan_local_filesystem;
pub use git::scan_git_repo;
pub use image::scan_docker_image_from_file;

/// 스캔 소스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Filesystem,
    Git,
    Image,
    Container,
}

impl SourceKind {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::Git => "git",
            Self::Image => "image",
            Self::Container => "container",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 스캔 결과
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// 스캔 소스 종류
    pub source: SourceKind,
    /// 스캔 대상 (경로, 이미지 ID 등)
    pub target: String,
    /// 연결과 병합이 끝난 패키지 그래프
    pub graph: PackageGraph,
    /// 파일 단위 분석 실패
    pub errors: Vec<FileError>,
    /// 생성된 간선 수
    pub links: usize,
    /// 병합 요약
    pub merge: MergeSummary,
}

impl ScanReport {
    /// 그래프의 패키지
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.graph.packages()
    }

    pub fn package_count(&self) -> usize {
        self.graph.len()
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScanReport(source={}, target={}, packages={}, errors={})",
            self.source,
            self.target,
            self.graph.len(),
            self.errors.len()
        )
    }
}

/// 설정에 맞는 분석기로 그룹을 만듭니다.
pub(crate) fn new_group(config: &ScannerConfig) -> AnalyzerGroup {
    let analyzers = filter_analyzers(
        config.scan_mode,
        &config.used_analyzers,
        &config.disabled_analyzers,
    );
    AnalyzerGroup::new(
        analyzers,
        config.num_workers,
        config.max_file_size,
        config.strict,
    )
}

/// 그룹이 모은 패키지로 그래프를 만들고 연결, 병합합니다.
pub(crate) fn finish(
    source: SourceKind,
    target: impl Into<String>,
    mut group: AnalyzerGroup,
) -> ScanReport {
    let mut graph = PackageGraph::from_packages(group.take_packages());
    let links = link_packages(&mut graph);
    let merge = merge_packages(&mut graph);

    metrics::counter!(m::PACKAGES_DISCOVERED_TOTAL, m::LABEL_SOURCE => source.as_str())
        .increment(graph.len() as u64);

    ScanReport {
        source,
        target: target.into(),
        graph,
        errors: group.errors().to_vec(),
        links,
        merge,
    }
}

/// 스캔 하나의 소요 시간과 결과를 기록합니다.
pub(crate) fn record_scan(
    source: SourceKind,
    target: &str,
    started: Instant,
    result: &Result<ScanReport, ScannerError>,
) {
    let elapsed = started.elapsed();
    let outcome = if result.is_ok() { "success" } else { "failure" };
    metrics::counter!(
        m::SCANS_COMPLETED_TOTAL,
        m::LABEL_SOURCE => source.as_str(),
        m::LABEL_RESULT => outcome
    )
    .increment(1);
    metrics::histogram!(m::SCAN_DURATION_SECONDS, m::LABEL_SOURCE => source.as_str())
        .record(elapsed.as_secs_f64());

    match result {
        Ok(report) => info!(
            source = %source,
            target,
            packages = report.package_count(),
            errors = report.errors.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scan completed"
        ),
        Err(e) => info!(source = %source, target, error = %e, "scan failed"),
    }
}

/// 블로킹 순회 작업의 join 실패를 변환합니다.
pub(crate) fn join_error(e: tokio::task::JoinError) -> ScannerError {
    ScannerError::Worker(format!("spawn_blocking failed: {e}"))
}

/// 스캔 루트 기준 경로를 `/`로 시작하는 형태로 정규화합니다.
pub(crate) fn virtual_path(raw: &str) -> String {
    let trimmed = raw.trim_start_matches("./").trim_start_matches('/');
    format!("/{trimmed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_paths_start_with_slash() {
        assert_eq!(virtual_path("var/lib/dpkg/status"), "/var/lib/dpkg/status");
        assert_eq!(virtual_path("./app/go.mod"), "/app/go.mod");
        assert_eq!(virtual_path("/etc/os-release"), "/etc/os-release");
    }

    #[test]
    fn source_kind_labels() {
        assert_eq!(SourceKind::Filesystem.as_str(), "filesystem");
        assert_eq!(SourceKind::Container.to_string(), "container");
    }
}
