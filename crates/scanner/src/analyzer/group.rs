//! 분석기 그룹 -- 후보 파일 매칭과 병렬 분석
//!
//! [`AnalyzerGroup`]은 스캔 하나에서 선택된 분석기 집합입니다.
//!
//! 1. 스캔 소스가 [`AnalyzerGroup::append`]로 후보 파일을 하나씩 넘깁니다.
//!    매칭된 파일은 (분석기, 파일) 쌍으로 보관되고, 모든 매칭 파일은 형제 맵에도 들어갑니다.
//! 2. [`AnalyzerGroup::analyze`]가 보관된 쌍을 제한된 큐에 넣고
//!    `num_workers`개의 블로킹 워커가 병렬로 분석합니다.
//! 3. 모든 워커가 끝난 뒤 결과를 매칭 순서대로 모읍니다.
//!
//! 분석 실패는 파일 단위로 기록하고 건너뜁니다.
//! strict 모드에서 `strict_errors()`가 참인 분석기가 실패하면 스캔 전체를 중단합니다.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use depscan_core::metrics as m;

use crate::error::ScannerError;
use crate::package::Package;
use crate::types::AnalyzerType;

use super::{Analyzer, FileInfo, FileMeta, MatchInfo, NO_MATCH};

/// 후보 파일의 내용이 있는 곳
pub enum Candidate<'a> {
    /// 로컬 파일 시스템 경로
    Local(&'a Path),
    /// 한 번만 읽을 수 있는 스트림 (tar 엔트리, git blob 등)
    ///
    /// 매칭되면 그룹의 임시 디렉토리에 내용을 복사합니다.
    Stream(&'a mut dyn Read),
}

/// 파일 하나의 분석 실패 기록
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    pub path: String,
    pub analyzer: AnalyzerType,
    pub error: String,
}

struct Job {
    seq: usize,
    analyzer: Arc<dyn Analyzer>,
    file: FileInfo,
}

#[derive(Default)]
struct WorkerOutput {
    packages: Vec<(usize, Vec<Package>)>,
    errors: Vec<(usize, FileError)>,
    fatal: Option<(usize, ScannerError)>,
}

/// 스캔 하나에서 사용하는 분석기 집합
pub struct AnalyzerGroup {
    analyzers: Vec<Arc<dyn Analyzer>>,
    num_workers: usize,
    max_file_size: u64,
    strict: bool,
    matched: Vec<(Arc<dyn Analyzer>, FileInfo)>,
    siblings: HashMap<String, FileInfo>,
    spool: Option<tempfile::TempDir>,
    spooled: usize,
    packages: Vec<Package>,
    errors: Vec<FileError>,
}

impl AnalyzerGroup {
    /// `num_workers`가 0이면 1로 취급합니다.
    pub fn new(
        analyzers: Vec<Arc<dyn Analyzer>>,
        num_workers: usize,
        max_file_size: u64,
        strict: bool,
    ) -> Self {
        Self {
            analyzers,
            num_workers: num_workers.max(1),
            max_file_size,
            strict,
            matched: Vec::new(),
            siblings: HashMap::new(),
            spool: None,
            spooled: 0,
            packages: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// 그룹에 포함된 분석기 태그
    pub fn analyzer_types(&self) -> Vec<AnalyzerType> {
        self.analyzers.iter().map(|a| a.analyzer_type()).collect()
    }

    /// 후보 파일을 모든 분석기에 매칭합니다.
    ///
    /// 매칭한 분석기 수를 반환합니다. `max_file_size`를 넘는 파일은 보지 않고 0을 반환합니다.
    pub fn append(
        &mut self,
        path: &str,
        meta: FileMeta,
        candidate: Candidate<'_>,
    ) -> Result<usize, ScannerError> {
        if meta.size > self.max_file_size {
            warn!(
                path,
                size = meta.size,
                max = self.max_file_size,
                "skipping oversized file"
            );
            return Ok(0);
        }

        match candidate {
            Candidate::Local(location) => {
                let info = MatchInfo::from_file(path, meta, location);
                let hits = self.match_all(&info);
                for (analyzer, status) in &hits {
                    self.record(analyzer, FileInfo::new(path, meta, *status, location));
                }
                Ok(hits.len())
            }
            Candidate::Stream(reader) => {
                let info = MatchInfo::from_stream(path, meta, reader);
                let hits = self.match_all(&info);
                if hits.is_empty() {
                    return Ok(0);
                }
                let (header, rest) = info
                    .into_stream()
                    .ok_or_else(|| ScannerError::Worker("stream candidate lost".to_owned()))?;
                let location = self.spool_stream(path, &header, rest)?;
                for (analyzer, status) in &hits {
                    self.record(analyzer, FileInfo::new(path, meta, *status, &location));
                }
                Ok(hits.len())
            }
        }
    }

    fn match_all(&self, info: &MatchInfo<'_>) -> Vec<(Arc<dyn Analyzer>, u8)> {
        self.analyzers
            .iter()
            .filter_map(|analyzer| {
                let status = analyzer.matches(info);
                (status != NO_MATCH).then(|| (Arc::clone(analyzer), status))
            })
            .collect()
    }

    fn record(&mut self, analyzer: &Arc<dyn Analyzer>, file: FileInfo) {
        let kind = analyzer.analyzer_type();
        debug!(path = %file.path, analyzer = %kind, status = file.match_status, "file matched");
        metrics::counter!(m::FILES_MATCHED_TOTAL, m::LABEL_ANALYZER => kind.as_str()).increment(1);

        self.siblings
            .entry(file.path.clone())
            .or_insert_with(|| file.clone());
        self.matched.push((Arc::clone(analyzer), file));
    }

    fn spool_stream(
        &mut self,
        path: &str,
        header: &[u8],
        rest: &mut dyn Read,
    ) -> Result<PathBuf, ScannerError> {
        let io_err = |source| ScannerError::Io {
            path: path.to_owned(),
            source,
        };

        if self.spool.is_none() {
            self.spool = Some(tempfile::tempdir().map_err(io_err)?);
        }
        let dir = match &self.spool {
            Some(dir) => dir.path(),
            None => return Err(ScannerError::Worker("spool directory missing".to_owned())),
        };

        self.spooled += 1;
        let location = dir.join(self.spooled.to_string());
        let mut out = std::fs::File::create(&location).map_err(io_err)?;
        out.write_all(header).map_err(io_err)?;
        std::io::copy(rest, &mut out).map_err(io_err)?;
        Ok(location)
    }

    /// 매칭된 파일 수
    pub fn matched_len(&self) -> usize {
        self.matched.len()
    }

    /// 매칭된 모든 파일 (경로 -> 파일)
    pub fn siblings(&self) -> &HashMap<String, FileInfo> {
        &self.siblings
    }

    /// 보관된 파일을 병렬로 분석합니다.
    ///
    /// 결과는 이전 분석 결과 뒤에 추가됩니다. `cancel`이 취소되면 그때까지의
    /// 결과를 보관한 채 [`ScannerError::Cancelled`]를 반환합니다.
    pub async fn analyze(&mut self, cancel: &CancellationToken) -> Result<(), ScannerError> {
        if self.matched.is_empty() {
            return if cancel.is_cancelled() {
                Err(ScannerError::Cancelled)
            } else {
                Ok(())
            };
        }

        let token = cancel.child_token();
        let (tx, rx) = mpsc::channel::<Job>(self.num_workers * 2);
        let rx = Arc::new(Mutex::new(rx));
        let siblings = Arc::new(self.siblings.clone());
        let workers = self.num_workers.min(self.matched.len());

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = Arc::clone(&rx);
            let siblings = Arc::clone(&siblings);
            let token = token.clone();
            let strict = self.strict;
            handles.push(tokio::task::spawn_blocking(move || {
                run_worker(&rx, &siblings, &token, strict)
            }));
        }

        for (seq, (analyzer, file)) in self.matched.iter().enumerate() {
            let job = Job {
                seq,
                analyzer: Arc::clone(analyzer),
                file: file.clone(),
            };
            tokio::select! {
                _ = token.cancelled() => break,
                sent = tx.send(job) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
        drop(tx);

        let mut packages = Vec::new();
        let mut errors = Vec::new();
        let mut fatal: Option<(usize, ScannerError)> = None;
        let mut join_error = None;
        for handle in handles {
            match handle.await {
                Ok(output) => {
                    packages.extend(output.packages);
                    errors.extend(output.errors);
                    if let Some((seq, err)) = output.fatal {
                        if fatal.as_ref().is_none_or(|(first, _)| seq < *first) {
                            fatal = Some((seq, err));
                        }
                    }
                }
                Err(e) => {
                    join_error.get_or_insert_with(|| {
                        ScannerError::Worker(format!("analysis worker panicked: {e}"))
                    });
                }
            }
        }

        packages.sort_by_key(|(seq, _)| *seq);
        errors.sort_by_key(|(seq, _)| *seq);
        self.packages
            .extend(packages.into_iter().flat_map(|(_, pkgs)| pkgs));
        self.errors.extend(errors.into_iter().map(|(_, e)| e));

        if let Some(err) = join_error {
            return Err(err);
        }
        if let Some((_, err)) = fatal {
            return Err(err);
        }
        if cancel.is_cancelled() {
            return Err(ScannerError::Cancelled);
        }
        Ok(())
    }

    /// 지금까지 모은 패키지
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// 모은 패키지를 꺼냅니다.
    pub fn take_packages(&mut self) -> Vec<Package> {
        std::mem::take(&mut self.packages)
    }

    /// 파일 단위 분석 실패 기록
    pub fn errors(&self) -> &[FileError] {
        &self.errors
    }

    /// 매칭 상태와 임시 파일을 비웁니다. 모은 패키지와 에러 기록은 유지합니다.
    ///
    /// 이미지 스캔은 레이어마다 호출합니다.
    pub fn clear(&mut self) {
        self.matched.clear();
        self.siblings.clear();
        self.spool = None;
        self.spooled = 0;
    }
}

fn run_worker(
    rx: &Mutex<mpsc::Receiver<Job>>,
    siblings: &HashMap<String, FileInfo>,
    token: &CancellationToken,
    strict: bool,
) -> WorkerOutput {
    let mut output = WorkerOutput::default();
    loop {
        let job = rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .blocking_recv();
        let Some(job) = job else { break };
        if token.is_cancelled() {
            break;
        }

        let kind = job.analyzer.analyzer_type();
        match job.analyzer.analyze(&job.file, siblings) {
            Ok(pkgs) => {
                debug!(path = %job.file.path, analyzer = %kind, count = pkgs.len(), "file analyzed");
                output.packages.push((job.seq, pkgs));
            }
            Err(err) => {
                warn!(path = %job.file.path, analyzer = %kind, error = %err, "analysis failed");
                metrics::counter!(m::ANALYZE_ERRORS_TOTAL, m::LABEL_ANALYZER => kind.as_str())
                    .increment(1);
                output.errors.push((
                    job.seq,
                    FileError {
                        path: job.file.path.clone(),
                        analyzer: kind,
                        error: err.to_string(),
                    },
                ));
                if strict && job.analyzer.strict_errors() {
                    token.cancel();
                    output.fatal = Some((job.seq, err));
                    break;
                }
            }
        }
    }
    output
}
