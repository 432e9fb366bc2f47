//! 분석기 -- 파일 매칭과 패키지 추출
//!
//! [`Analyzer`]는 한두 개의 매니페스트 파서를 `matches`/`analyze` 계약 뒤에 감쌉니다.
//!
//! # 흐름
//!
//! ```text
//! 후보 파일 --> matches(path, meta, header) --> MatchStatus
//!                                                  |
//!                                       (0이 아니면 FileInfo로 보관)
//!                                                  |
//! analyze(self, siblings) --> ManifestParser --> ParseOutput --> Vec<Package>
//! ```
//!
//! `matches`는 경로와 앞부분 헤더만 보고 판단해야 합니다.
//! 파일 전체 내용은 `analyze` 단계에서 처음 읽습니다.

pub mod custom;
pub mod golang;
pub mod group;
pub mod java;
pub mod native;
pub mod node;
pub mod os;
pub mod php;
pub mod python;
pub mod registry;
pub mod ruby;

use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::ScannerError;
use crate::package::Package;
use crate::parser::{ManifestParser, ParseOutput};
use crate::types::{AnalyzerType, ScanMode};

pub use custom::{CustomAnalyzer, CustomPackage};
pub use group::{AnalyzerGroup, Candidate, FileError};
pub use registry::{AnalyzerRegistry, filter_analyzers, register_analyzer};

/// 매칭 상태 코드 (0 = 매칭 안 됨, 양수 값의 의미는 분석기가 정의)
pub type MatchStatus = u8;

/// 매칭되지 않음
pub const NO_MATCH: MatchStatus = 0;
/// 분석 대상 주 파일 (예: `go.mod`)
pub const PRIMARY: MatchStatus = 1;
/// 보조 파일 (예: `go.sum`), 주로 형제 파일로 참조됨
pub const SIBLING: MatchStatus = 2;

/// 매칭 시 읽는 헤더 최대 길이 (바이트)
pub const HEADER_LEN: usize = 512;

/// 후보 파일의 가벼운 메타데이터
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileMeta {
    /// 파일 크기 (바이트)
    pub size: u64,
    /// 실행 권한 비트가 있는지
    pub executable: bool,
}

impl FileMeta {
    pub fn new(size: u64, executable: bool) -> Self {
        Self { size, executable }
    }

    /// 파일 모드 비트에서 메타데이터를 만듭니다.
    pub fn from_mode(size: u64, mode: u32) -> Self {
        Self::new(size, mode & 0o111 != 0)
    }

    /// 로컬 파일 시스템 메타데이터에서 변환합니다.
    pub fn from_std(meta: &std::fs::Metadata) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            Self::from_mode(meta.len(), meta.permissions().mode())
        }
        #[cfg(not(unix))]
        {
            Self::new(meta.len(), false)
        }
    }
}

enum Header<'a> {
    Loaded(&'a [u8]),
    File {
        location: &'a Path,
        cache: OnceCell<Vec<u8>>,
    },
    Stream {
        reader: RefCell<&'a mut dyn Read>,
        cache: OnceCell<Vec<u8>>,
    },
}

/// `matches`에 전달되는 후보 파일 정보
///
/// 헤더는 분석기가 처음 요청할 때 한 번만 읽습니다.
pub struct MatchInfo<'a> {
    /// 스캔 대상 기준 경로 (`/`로 시작)
    pub path: &'a str,
    pub meta: FileMeta,
    header: Header<'a>,
}

impl<'a> MatchInfo<'a> {
    /// 이미 읽은 헤더로 생성합니다.
    pub fn new(path: &'a str, meta: FileMeta, header: &'a [u8]) -> Self {
        Self {
            path,
            meta,
            header: Header::Loaded(header),
        }
    }

    /// 로컬 파일 헤더를 필요할 때 읽도록 생성합니다.
    pub fn from_file(path: &'a str, meta: FileMeta, location: &'a Path) -> Self {
        Self {
            path,
            meta,
            header: Header::File {
                location,
                cache: OnceCell::new(),
            },
        }
    }

    /// 스트림 헤더를 필요할 때 읽도록 생성합니다.
    ///
    /// 읽은 헤더는 [`MatchInfo::consumed_header`]로 돌려받아야 스트림 내용이 이어집니다.
    pub(crate) fn from_stream(path: &'a str, meta: FileMeta, reader: &'a mut dyn Read) -> Self {
        Self {
            path,
            meta,
            header: Header::Stream {
                reader: RefCell::new(reader),
                cache: OnceCell::new(),
            },
        }
    }

    /// 파일 이름 (경로의 마지막 구성 요소)
    pub fn file_name(&self) -> &str {
        file_name(self.path)
    }

    /// 파일 앞부분 최대 [`HEADER_LEN`] 바이트
    ///
    /// 읽기에 실패하면 빈 슬라이스를 반환합니다.
    pub fn header(&self) -> &[u8] {
        match &self.header {
            Header::Loaded(bytes) => bytes,
            Header::File { location, cache } => cache.get_or_init(|| {
                std::fs::File::open(location)
                    .and_then(|f| read_header(&mut f.take(HEADER_LEN as u64)))
                    .unwrap_or_default()
            }),
            Header::Stream { reader, cache } => cache.get_or_init(|| {
                let mut reader = reader.borrow_mut();
                read_header(&mut (&mut **reader).take(HEADER_LEN as u64)).unwrap_or_default()
            }),
        }
    }

    /// 스트림에서 이미 소비한 헤더 바이트와 원본 스트림을 돌려줍니다.
    pub(crate) fn into_stream(self) -> Option<(Vec<u8>, &'a mut dyn Read)> {
        match self.header {
            Header::Stream { reader, cache } => {
                Some((cache.into_inner().unwrap_or_default(), reader.into_inner()))
            }
            _ => None,
        }
    }
}

fn read_header(reader: &mut impl Read) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(HEADER_LEN);
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

/// 매칭된 파일
///
/// 내용은 `location`에 있고 [`FileInfo::read`]를 호출할 때 처음 엽니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// 스캔 대상 기준 경로
    pub path: String,
    pub meta: FileMeta,
    /// 매칭한 분석기가 돌려준 상태 코드
    pub match_status: MatchStatus,
    location: PathBuf,
}

impl FileInfo {
    pub fn new(
        path: impl Into<String>,
        meta: FileMeta,
        match_status: MatchStatus,
        location: impl Into<PathBuf>,
    ) -> Self {
        Self {
            path: path.into(),
            meta,
            match_status,
            location: location.into(),
        }
    }

    /// 실제 내용이 있는 로컬 경로
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// 파일 이름
    pub fn file_name(&self) -> &str {
        file_name(&self.path)
    }

    /// 전체 내용을 읽습니다.
    pub fn read(&self) -> Result<Vec<u8>, ScannerError> {
        std::fs::read(&self.location).map_err(|e| ScannerError::Io {
            path: self.path.clone(),
            source: e,
        })
    }

    /// 전체 내용을 UTF-8 문자열로 읽습니다.
    pub fn read_to_string(&self) -> Result<String, ScannerError> {
        String::from_utf8(self.read()?).map_err(|e| ScannerError::parse(&self.path, e))
    }

    /// 같은 디렉토리에 있는 형제 파일을 찾습니다.
    pub fn sibling<'m>(
        &self,
        siblings: &'m HashMap<String, FileInfo>,
        name: &str,
    ) -> Option<&'m FileInfo> {
        let dir = self.path.rsplit_once('/').map_or("", |(dir, _)| dir);
        siblings.get(&format!("{dir}/{name}"))
    }
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status={})", self.path, self.match_status)
    }
}

/// 분석기 trait
///
/// 구현체는 워커 스레드에서 동시에 호출되므로 `Send + Sync`여야 합니다.
pub trait Analyzer: Send + Sync {
    /// 분석기 태그
    fn analyzer_type(&self) -> AnalyzerType;

    /// 이 분석기가 속하는 스캔 모드
    fn scan_mode(&self) -> ScanMode {
        self.analyzer_type().scan_mode()
    }

    /// 후보 파일이 이 분석기의 대상인지 판단합니다. 부수 효과가 없어야 합니다.
    fn matches(&self, info: &MatchInfo<'_>) -> MatchStatus;

    /// 매칭된 파일에서 패키지를 추출합니다.
    ///
    /// `siblings`는 같은 스캔에서 매칭된 모든 파일 (경로 -> 파일)입니다.
    fn analyze(
        &self,
        file: &FileInfo,
        siblings: &HashMap<String, FileInfo>,
    ) -> Result<Vec<Package>, ScannerError>;

    /// strict 모드에서 분석 실패를 스캔 전체 실패로 취급할지 여부
    fn strict_errors(&self) -> bool {
        false
    }
}

/// 파일 하나를 하나의 파서로 읽는 분석기
///
/// 대부분의 잠금 파일 형식이 이 형태입니다.
pub struct ParserAnalyzer<P> {
    kind: AnalyzerType,
    accepts: fn(&str) -> bool,
    parser: P,
}

impl<P: ManifestParser> ParserAnalyzer<P> {
    /// `accepts`는 스캔 경로를 받아 주 파일 여부를 반환합니다.
    pub const fn new(kind: AnalyzerType, accepts: fn(&str) -> bool, parser: P) -> Self {
        Self {
            kind,
            accepts,
            parser,
        }
    }
}

impl<P: ManifestParser> Analyzer for ParserAnalyzer<P> {
    fn analyzer_type(&self) -> AnalyzerType {
        self.kind
    }

    fn matches(&self, info: &MatchInfo<'_>) -> MatchStatus {
        if (self.accepts)(info.path) {
            PRIMARY
        } else {
            NO_MATCH
        }
    }

    fn analyze(
        &self,
        file: &FileInfo,
        _siblings: &HashMap<String, FileInfo>,
    ) -> Result<Vec<Package>, ScannerError> {
        parse_file(&self.parser, file, self.kind)
    }
}

/// 파일을 문자열로 읽어 파싱하고 패키지로 변환합니다.
pub(crate) fn parse_file(
    parser: &dyn ManifestParser,
    file: &FileInfo,
    kind: AnalyzerType,
) -> Result<Vec<Package>, ScannerError> {
    let content = file.read_to_string()?;
    let output = parser.parse(&content, &file.path)?;
    Ok(to_packages(output, &file.path, kind))
}

/// 파서 결과를 출처가 붙은 패키지 목록으로 변환합니다.
pub fn to_packages(output: ParseOutput, path: &str, kind: AnalyzerType) -> Vec<Package> {
    let ParseOutput {
        libraries,
        dependencies,
    } = output;
    let mut depends_on: HashMap<String, _> = dependencies
        .into_iter()
        .map(|d| (d.id, d.depends_on))
        .collect();

    libraries
        .into_iter()
        .map(|lib| {
            let id = lib.id();
            let mut pkg = Package::new(lib.name, lib.version).with_source(path, kind);
            pkg.license = lib.license;
            pkg.verification = lib.verification;
            pkg.indirect = lib.indirect;
            pkg.depends_on = depends_on.remove(&id).unwrap_or_default();
            pkg
        })
        .collect()
}

/// 경로의 마지막 구성 요소
pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// 경로의 부모 디렉토리 이름
pub(crate) fn parent_name(path: &str) -> &str {
    path.rsplit('/').nth(1).unwrap_or_default()
}
