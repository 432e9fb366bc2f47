//! git 커밋 이력 스캔
//!
//! 어느 커밋에서든 도달 가능한 모든 blob을 후보로 봅니다.
//! 같은 경로의 과거 버전도 각각 분석되고, 중복은 병합 단계에서 정리됩니다.
//!
//! blob 내용은 분석기가 실제로 읽을 때 `git cat-file blob`으로 가져옵니다.
//! git 객체에는 실행 권한 정보가 없으므로 모든 후보는 실행 불가로 취급됩니다.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analyzer::{AnalyzerGroup, Candidate, FileMeta};
use crate::config::ScannerConfig;
use crate::error::ScannerError;

use super::{ScanReport, SourceKind, finish, join_error, new_group, record_scan, virtual_path};

/// git 저장소의 전체 이력을 스캔합니다.
pub async fn scan_git_repo(
    repo: impl AsRef<Path>,
    config: &ScannerConfig,
    cancel: &CancellationToken,
) -> Result<ScanReport, ScannerError> {
    let repo = repo.as_ref().to_path_buf();
    let target = repo.display().to_string();
    let started = Instant::now();
    info!(target = %target, "scanning git history");

    let result = scan(repo, config, cancel).await;
    record_scan(SourceKind::Git, &target, started, &result);
    result
}

async fn scan(
    repo: PathBuf,
    config: &ScannerConfig,
    cancel: &CancellationToken,
) -> Result<ScanReport, ScannerError> {
    let target = repo.display().to_string();
    let group = new_group(config);
    let walk_cancel = cancel.clone();
    let mut group = tokio::task::spawn_blocking(move || {
        let mut group = group;
        walk_history(&repo, &mut group, &walk_cancel)?;
        Ok::<_, ScannerError>(group)
    })
    .await
    .map_err(join_error)??;

    group.analyze(cancel).await?;
    Ok(finish(SourceKind::Git, target, group))
}

/// 저장소의 blob을 모두 그룹에 넘깁니다.
fn walk_history(
    repo: &Path,
    group: &mut AnalyzerGroup,
    cancel: &CancellationToken,
) -> Result<usize, ScannerError> {
    git(repo, &["rev-parse", "--git-dir"])
        .map_err(|e| ScannerError::source_access(repo.display().to_string(), e))?;

    let batch = git(
        repo,
        &[
            "cat-file",
            "--batch-all-objects",
            "--batch-check=%(objectname) %(objecttype) %(objectsize)",
        ],
    )?;
    let sizes = blob_sizes(&batch);
    let objects = git(repo, &["rev-list", "--objects", "--all"])?;

    let mut visited = 0;
    for (sha, path) in list_objects(&objects) {
        if cancel.is_cancelled() {
            return Err(ScannerError::Cancelled);
        }
        let Some(size) = sizes.get(sha) else {
            continue;
        };

        let path = virtual_path(path);
        let mut blob = LazyBlob::new(repo, sha);
        visited += 1;
        if let Err(e) = group.append(&path, FileMeta::new(*size, false), Candidate::Stream(&mut blob))
        {
            warn!(path = %path, sha, error = %e, "failed to match blob, skipping");
        }
    }

    debug!(repo = %repo.display(), blobs = visited, matched = group.matched_len(), "history walk finished");
    Ok(visited)
}

/// `git` 명령을 실행하고 표준 출력을 반환합니다.
fn git(repo: &Path, args: &[&str]) -> Result<String, ScannerError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .map_err(|e| ScannerError::Git(format!("failed to run git: {e}")))?;
    if !output.status.success() {
        return Err(ScannerError::Git(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    String::from_utf8(output.stdout).map_err(|e| ScannerError::Git(e.to_string()))
}

/// `--batch-check` 출력에서 blob 크기 맵을 만듭니다.
fn blob_sizes(batch_check: &str) -> HashMap<&str, u64> {
    batch_check
        .lines()
        .filter_map(|line| {
            let mut fields = line.split(' ');
            let sha = fields.next()?;
            let kind = fields.next()?;
            let size = fields.next()?.parse().ok()?;
            (kind == "blob").then_some((sha, size))
        })
        .collect()
}

/// `rev-list --objects` 출력에서 경로가 있는 (객체, 경로) 쌍을 뽑습니다.
fn list_objects(rev_list: &str) -> impl Iterator<Item = (&str, &str)> {
    rev_list
        .lines()
        .filter_map(|line| line.split_once(' '))
        .filter(|(_, path)| !path.is_empty())
}

/// 처음 읽을 때 내용을 가져오는 blob
struct LazyBlob<'a> {
    repo: &'a Path,
    sha: &'a str,
    content: Option<Cursor<Vec<u8>>>,
}

impl<'a> LazyBlob<'a> {
    fn new(repo: &'a Path, sha: &'a str) -> Self {
        Self {
            repo,
            sha,
            content: None,
        }
    }
}

impl Read for LazyBlob<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.content.is_none() {
            let output = Command::new("git")
                .arg("-C")
                .arg(self.repo)
                .args(["cat-file", "blob", self.sha])
                .output()?;
            if !output.status.success() {
                return Err(std::io::Error::other(format!(
                    "git cat-file blob {} failed",
                    self.sha
                )));
            }
            self.content = Some(Cursor::new(output.stdout));
        }
        match self.content.as_mut() {
            Some(content) => content.read(buf),
            None => Ok(0),
        }
    }
}
