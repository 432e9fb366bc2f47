//! 컨테이너 이미지 tar 스캔
//!
//! `docker save` 형식의 tar는 `manifest.json`의 `Layers` 순서대로 레이어를 읽습니다.
//! 레이어는 일반 tar 또는 gzip tar이며, 레이어마다 분석을 끝낸 뒤 그룹을 비웁니다.
//! whiteout 엔트리(`.wh.`)는 무시합니다.
//!
//! 컨테이너 export 결과처럼 루트 파일 시스템 하나로 된 tar는
//! [`scan_rootfs_archive`]가 한 번에 읽습니다.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

use flate2::read::GzDecoder;
use serde::Deserialize;
use tar::Archive;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analyzer::{AnalyzerGroup, Candidate, FileMeta};
use crate::config::ScannerConfig;
use crate::error::ScannerError;

use super::{ScanReport, SourceKind, finish, join_error, new_group, record_scan, virtual_path};

const MANIFEST: &str = "manifest.json";
const WHITEOUT_PREFIX: &str = ".wh.";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ManifestEntry {
    #[serde(default)]
    layers: Vec<String>,
}

/// `docker save`로 만든 이미지 tar를 스캔합니다.
pub async fn scan_docker_image_from_file(
    archive: impl AsRef<Path>,
    config: &ScannerConfig,
    cancel: &CancellationToken,
) -> Result<ScanReport, ScannerError> {
    let archive = archive.as_ref().to_path_buf();
    let target = archive.display().to_string();
    let started = Instant::now();
    info!(target = %target, "scanning image archive");

    let result = scan_image_archive(archive, SourceKind::Image, &target, config, cancel).await;
    record_scan(SourceKind::Image, &target, started, &result);
    result
}

/// 레이어 단위로 이미지 tar를 스캔합니다.
pub(crate) async fn scan_image_archive(
    archive: PathBuf,
    source: SourceKind,
    target: &str,
    config: &ScannerConfig,
    cancel: &CancellationToken,
) -> Result<ScanReport, ScannerError> {
    let layers = {
        let archive = archive.clone();
        tokio::task::spawn_blocking(move || read_manifest(&archive))
            .await
            .map_err(join_error)??
    };
    debug!(target, layers = layers.len(), "image manifest loaded");

    let mut group = new_group(config);
    for layer in layers {
        let archive = archive.clone();
        let walk_cancel = cancel.clone();
        group = tokio::task::spawn_blocking(move || {
            let mut group = group;
            walk_layer(&archive, &layer, &mut group, &walk_cancel)?;
            Ok::<_, ScannerError>(group)
        })
        .await
        .map_err(join_error)??;

        group.analyze(cancel).await?;
        group.clear();
    }

    Ok(finish(source, target, group))
}

/// 루트 파일 시스템 tar 하나를 스캔합니다.
pub(crate) async fn scan_rootfs_archive(
    archive: PathBuf,
    source: SourceKind,
    target: &str,
    config: &ScannerConfig,
    cancel: &CancellationToken,
) -> Result<ScanReport, ScannerError> {
    let group = new_group(config);
    let walk_cancel = cancel.clone();
    let mut group = tokio::task::spawn_blocking(move || {
        let mut group = group;
        let file = File::open(&archive)
            .map_err(|e| ScannerError::source_access(archive.display().to_string(), e))?;
        walk_tar(file, &mut group, &walk_cancel)
            .map_err(|e| ScannerError::source_access(archive.display().to_string(), e))?;
        Ok::<_, ScannerError>(group)
    })
    .await
    .map_err(join_error)??;

    group.analyze(cancel).await?;
    Ok(finish(source, target, group))
}

/// `manifest.json`에서 레이어 경로를 순서대로 읽습니다.
fn read_manifest(archive: &Path) -> Result<Vec<String>, ScannerError> {
    let source_name = archive.display().to_string();
    let file = File::open(archive).map_err(|e| ScannerError::source_access(&source_name, e))?;
    let mut tar = Archive::new(file);
    let entries = tar
        .entries_with_seek()
        .map_err(|e| ScannerError::source_access(&source_name, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| ScannerError::source_access(&source_name, e))?;
        let is_manifest = entry
            .path()
            .map(|p| p.as_os_str() == MANIFEST)
            .unwrap_or(false);
        if !is_manifest {
            continue;
        }

        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(|e| ScannerError::source_access(&source_name, e))?;
        let manifest: Vec<ManifestEntry> = serde_json::from_str(&content)
            .map_err(|e| ScannerError::source_access(&source_name, format!("invalid manifest: {e}")))?;

        let mut layers: Vec<String> = Vec::new();
        for layer in manifest.into_iter().flat_map(|m| m.layers) {
            if !layers.contains(&layer) {
                layers.push(layer);
            }
        }
        return Ok(layers);
    }

    Err(ScannerError::source_access(
        source_name,
        "manifest.json not found",
    ))
}

/// 이미지 tar에서 레이어 하나를 찾아 그룹에 넘깁니다.
fn walk_layer(
    archive: &Path,
    layer: &str,
    group: &mut AnalyzerGroup,
    cancel: &CancellationToken,
) -> Result<usize, ScannerError> {
    let source_name = archive.display().to_string();
    let file = File::open(archive).map_err(|e| ScannerError::source_access(&source_name, e))?;
    let mut tar = Archive::new(file);
    let entries = tar
        .entries_with_seek()
        .map_err(|e| ScannerError::source_access(&source_name, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| ScannerError::source_access(&source_name, e))?;
        let matches_layer = entry
            .path()
            .map(|p| p.as_os_str() == layer)
            .unwrap_or(false);
        if !matches_layer {
            continue;
        }

        let mut reader = BufReader::new(entry);
        let gzip = reader
            .fill_buf()
            .map(|head| head.starts_with(&GZIP_MAGIC))
            .map_err(|e| ScannerError::source_access(&source_name, e))?;
        let reader: Box<dyn Read + '_> = if gzip {
            Box::new(GzDecoder::new(reader))
        } else {
            Box::new(reader)
        };

        let visited = walk_tar(reader, group, cancel)
            .map_err(|e| ScannerError::source_access(format!("{source_name}:{layer}"), e))?;
        debug!(layer, files = visited, matched = group.matched_len(), "layer walked");
        return Ok(visited);
    }

    Err(ScannerError::source_access(
        source_name,
        format!("layer {layer} not found"),
    ))
}

/// tar 스트림의 일반 파일을 모두 그룹에 넘깁니다.
///
/// tar 구조 자체를 읽을 수 없으면 I/O 에러를 반환합니다.
fn walk_tar(
    reader: impl Read,
    group: &mut AnalyzerGroup,
    cancel: &CancellationToken,
) -> std::io::Result<usize> {
    let mut tar = Archive::new(reader);
    let mut visited = 0;

    for entry in tar.entries()? {
        if cancel.is_cancelled() {
            break;
        }
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let raw = entry.path()?.to_string_lossy().into_owned();
        if is_whiteout(&raw) {
            continue;
        }
        let path = virtual_path(&raw);
        let mode = entry.header().mode().unwrap_or(0o644);
        let meta = FileMeta::from_mode(entry.size(), mode);
        visited += 1;

        if let Err(e) = group.append(&path, meta, Candidate::Stream(&mut entry)) {
            warn!(path = %path, error = %e, "failed to match layer entry, skipping");
        }
    }
    Ok(visited)
}

fn is_whiteout(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|name| name.starts_with(WHITEOUT_PREFIX))
}
