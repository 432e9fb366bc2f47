//! 로컬 파일 시스템 스캔

use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::analyzer::{AnalyzerGroup, Candidate, FileMeta};
use crate::config::ScannerConfig;
use crate::error::ScannerError;

use super::{ScanReport, SourceKind, finish, join_error, new_group, record_scan};

/// 디렉토리를 재귀적으로 스캔합니다.
///
/// 심볼릭 링크는 따라가지 않으며, 경로는 `root` 기준으로 `/`를 붙여 보고됩니다.
pub async fn scan_local_filesystem(
    root: impl AsRef<Path>,
    config: &ScannerConfig,
    cancel: &CancellationToken,
) -> Result<ScanReport, ScannerError> {
    let root = root.as_ref().to_path_buf();
    let target = root.display().to_string();
    let started = Instant::now();
    info!(target = %target, "scanning local filesystem");

    let result = scan(root, config, cancel).await;
    record_scan(SourceKind::Filesystem, &target, started, &result);
    result
}

async fn scan(
    root: PathBuf,
    config: &ScannerConfig,
    cancel: &CancellationToken,
) -> Result<ScanReport, ScannerError> {
    let target = root.display().to_string();
    let meta = tokio::fs::metadata(&root)
        .await
        .map_err(|e| ScannerError::source_access(&target, e))?;
    if !meta.is_dir() {
        return Err(ScannerError::source_access(&target, "not a directory"));
    }

    let group = new_group(config);
    let walk_cancel = cancel.clone();
    let mut group = tokio::task::spawn_blocking(move || {
        let mut group = group;
        walk_dir(&root, &mut group, &walk_cancel)?;
        Ok::<_, ScannerError>(group)
    })
    .await
    .map_err(join_error)??;

    group.analyze(cancel).await?;
    Ok(finish(SourceKind::Filesystem, target, group))
}

/// 디렉토리를 순회하며 모든 일반 파일을 그룹에 넘깁니다.
///
/// `spawn_blocking` 안에서 호출되어야 합니다.
pub(crate) fn walk_dir(
    root: &Path,
    group: &mut AnalyzerGroup,
    cancel: &CancellationToken,
) -> Result<usize, ScannerError> {
    let mut visited = 0;
    for entry in WalkDir::new(root).follow_links(false) {
        if cancel.is_cancelled() {
            return Err(ScannerError::Cancelled);
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => {
                return Err(ScannerError::source_access(root.display().to_string(), e));
            }
            Err(e) => {
                warn!(error = %e, "failed to read directory entry, skipping");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(m) => FileMeta::from_std(&m),
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "failed to read file metadata");
                continue;
            }
        };
        let path = relative_path(root, entry.path());
        visited += 1;

        if let Err(e) = group.append(&path, meta, Candidate::Local(entry.path())) {
            warn!(path = %path, error = %e, "failed to match file, skipping");
        }
    }

    debug!(root = %root.display(), files = visited, matched = group.matched_len(), "walk finished");
    Ok(visited)
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("/{}", parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_use_forward_slashes() {
        let root = Path::new("/tmp/scan");
        assert_eq!(
            relative_path(root, Path::new("/tmp/scan/app/go.mod")),
            "/app/go.mod"
        );
        assert_eq!(relative_path(root, Path::new("/tmp/scan/x")), "/x");
    }

    #[tokio::test]
    async fn missing_root_is_source_access_error() {
        let err = scan_local_filesystem(
            "/nonexistent/path/for/depscan/test",
            &ScannerConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScannerError::SourceAccess { .. }));
    }

    #[tokio::test]
    async fn file_root_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = scan_local_filesystem(
            file.path(),
            &ScannerConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScannerError::SourceAccess { .. }));
    }

    #[tokio::test]
    async fn empty_directory_yields_empty_graph() {
        let dir = tempfile::tempdir().unwrap();
        let report = scan_local_filesystem(
            dir.path(),
            &ScannerConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(report.package_count(), 0);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn go_mod_without_sum_yields_two_linked_packages() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("go.mod"),
            "module github.com/x/y\n\ngo 1.20\n\nrequire golang.org/z v1.0.0\n",
        )
        .unwrap();

        let report = scan_local_filesystem(
            dir.path(),
            &ScannerConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.package_count(), 2);
        let module = report.graph.find_by_name("github.com/x/y")[0];
        let dep = report.graph.find_by_name("golang.org/z")[0];
        assert!(!report.graph.get(dep).unwrap().potential);
        assert_eq!(report.graph.upstream(dep).count(), 0);
        assert_eq!(report.graph.downstream(dep).collect::<Vec<_>>(), vec![module]);
        assert!(report.graph.is_mirrored());
    }
}
