//! 매니페스트 파서 -- 에코시스템별 파일 형식을 라이브러리 목록으로 변환
//!
//! [`ManifestParser`] trait은 텍스트 기반 형식의 파서가 구현하는 인터페이스입니다.
//! 바이너리 형식(jar, Go 실행 파일, egg)은 바이트 슬라이스를 받는 별도 함수를 제공합니다.
//!
//! 파서는 파일 내용만 보고 [`ParseOutput`]을 만듭니다. 경로, 분석기 태그 같은
//! 출처 정보는 분석기가 [`Package`](crate::package::Package)로 변환할 때 붙입니다.
//!
//! # 지원 형식
//!
//! | 모듈 | 형식 |
//! |------|------|
//! | [`apk`] | `lib/apk/db/installed` |
//! | [`dpkg`] | `var/lib/dpkg/status`, `status.d/*` |
//! | [`rpm`] | `var/lib/rpmmanifest/container-manifest-2` |
//! | [`conan`] | `conan.lock` (v1 그래프, v2 requires) |
//! | [`golang`] | `go.mod`, `go.sum`, Go 빌드 정보 |
//! | [`composer`] | `composer.lock`, `composer.json` |
//! | [`java`] | `gradle.lockfile`, `pom.xml`, jar/war/ear |
//! | [`python`] | `requirements.txt`, `Pipfile.lock`, `poetry.lock`, `METADATA`/`PKG-INFO` |
//! | [`npm`] | `package.json`, `package-lock.json` |
//! | [`yarn`] | `yarn.lock` (v1, berry) |
//! | [`pnpm`] | `pnpm-lock.yaml` |
//! | [`ruby`] | `Gemfile.lock`, `*.gemspec` |
//! | [`cargo`] | `Cargo.lock` |

pub mod apk;
pub mod cargo;
pub mod composer;
pub mod conan;
pub mod dpkg;
pub mod golang;
pub mod java;
pub mod npm;
pub mod pnpm;
pub mod python;
pub mod rpm;
pub mod ruby;
pub mod yarn;

use crate::error::ScannerError;
use crate::package::DependsOn;

/// 텍스트 매니페스트 파서 trait
pub trait ManifestParser: Send + Sync {
    /// 매니페스트 내용을 파싱합니다.
    ///
    /// # Arguments
    ///
    /// - `content`: 파일 내용 (UTF-8 문자열)
    /// - `source_path`: 원본 파일 경로 (에러 메시지용)
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError>;
}

/// 파서가 발견한 라이브러리
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Library {
    pub name: String,
    pub version: String,
    pub license: Vec<String>,
    /// 스킴 접두사가 붙은 다이제스트
    pub verification: Option<String>,
    pub indirect: bool,
}

impl Library {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// `name@version` 형태의 파서 내부 식별자
    pub fn id(&self) -> String {
        library_id(&self.name, &self.version)
    }
}

/// 라이브러리 하나의 의존성 선언
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependency {
    /// 선언한 라이브러리의 [`Library::id`]
    pub id: String,
    pub depends_on: DependsOn,
}

/// 파서 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutput {
    pub libraries: Vec<Library>,
    pub dependencies: Vec<Dependency>,
}

impl ParseOutput {
    /// 라이브러리와 (비어있지 않은) 의존성 선언을 함께 추가합니다.
    pub fn push(&mut self, library: Library, depends_on: DependsOn) {
        if !depends_on.is_empty() {
            self.dependencies.push(Dependency {
                id: library.id(),
                depends_on,
            });
        }
        self.libraries.push(library);
    }

    /// 이름으로 라이브러리를 찾습니다.
    pub fn find(&self, name: &str) -> Option<&Library> {
        self.libraries.iter().find(|l| l.name == name)
    }

    /// 라이브러리의 의존성 선언을 찾습니다.
    pub fn depends_on(&self, library: &Library) -> Option<&DependsOn> {
        let id = library.id();
        self.dependencies
            .iter()
            .find(|d| d.id == id)
            .map(|d| &d.depends_on)
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

/// `name@version` 식별자를 만듭니다.
pub fn library_id(name: &str, version: &str) -> String {
    format!("{name}@{version}")
}

/// `Key: Value` 헤더 블록을 빈 줄 기준으로 나눕니다.
///
/// 공백으로 시작하는 줄은 앞 필드의 연속 줄로 이어 붙입니다.
/// dpkg status와 Python 메타데이터가 이 형식을 씁니다.
pub(crate) fn header_blocks(content: &str) -> Vec<Vec<(String, String)>> {
    let mut blocks = Vec::new();
    let mut current: Vec<(String, String)> = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = current.last_mut() {
                value.push('\n');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            current.push((key.trim().to_owned(), value.trim().to_owned()));
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// 헤더 블록에서 첫 번째 필드 값을 찾습니다.
pub(crate) fn header_value<'a>(block: &'a [(String, String)], key: &str) -> Option<&'a str> {
    block
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}
