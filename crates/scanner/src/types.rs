//! 도메인 타입 -- 분석기 태그, 스캔 모드, SBOM 형식
//!
//! 패키지 자체는 [`crate::package`]에, 그래프는 [`crate::graph`]에 정의됩니다.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// 분석기 태그
///
/// 각 태그는 하나의 패키지 관리자/매니페스트 형식에 대응하며,
/// 레지스트리 키와 패키지 출처(`from_analyzer`)로 사용됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalyzerType {
    /// RPM (`container-manifest-2`)
    Rpm,
    /// Debian dpkg (`var/lib/dpkg/status`)
    Dpkg,
    /// Alpine apk (`lib/apk/db/installed`)
    Apk,
    /// C/C++ Conan (`conan.lock`)
    Conan,
    /// Go 바이너리 (빌드 정보)
    GoBinary,
    /// Go 모듈 (`go.mod` + `go.sum`)
    GoMod,
    /// PHP Composer (`composer.lock`)
    PhpComposer,
    /// Gradle (`gradle.lockfile`)
    JavaGradle,
    /// Maven (`pom.xml`)
    JavaPom,
    /// Java 아카이브 (`*.jar`, `*.war`, `*.ear`, `*.par`)
    JavaJar,
    /// pip (`requirements.txt`)
    PythonPip,
    /// Python 패키지 메타데이터 (`METADATA`, `PKG-INFO`, `*.egg`)
    PythonPackaging,
    /// Pipenv (`Pipfile.lock`)
    PythonPipenv,
    /// Poetry (`poetry.lock`)
    PythonPoetry,
    /// npm (`package.json`, `package-lock.json`)
    NodeNpm,
    /// pnpm (`pnpm-lock.yaml`)
    NodePnpm,
    /// Yarn (`yarn.lock`)
    NodeYarn,
    /// Bundler (`Gemfile.lock`)
    RubyBundler,
    /// gemspec (`*.gemspec`)
    RubyGemspec,
    /// Cargo (`Cargo.lock`)
    RustCargo,
    /// 사용자 정의 분석기
    Custom,
}

impl AnalyzerType {
    /// 레지스트리에 내장된 모든 태그 (등록 순서)
    pub const BUILTIN: [AnalyzerType; 20] = [
        Self::Rpm,
        Self::Dpkg,
        Self::Apk,
        Self::Conan,
        Self::GoBinary,
        Self::GoMod,
        Self::PhpComposer,
        Self::JavaGradle,
        Self::JavaPom,
        Self::JavaJar,
        Self::PythonPip,
        Self::PythonPackaging,
        Self::PythonPipenv,
        Self::PythonPoetry,
        Self::NodeNpm,
        Self::NodePnpm,
        Self::NodeYarn,
        Self::RubyBundler,
        Self::RubyGemspec,
        Self::RustCargo,
    ];

    /// 태그 문자열을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rpm => "rpm",
            Self::Dpkg => "dpkg",
            Self::Apk => "apk",
            Self::Conan => "conan",
            Self::GoBinary => "go-binary",
            Self::GoMod => "go-mod",
            Self::PhpComposer => "php-composer",
            Self::JavaGradle => "java-gradle",
            Self::JavaPom => "java-pom",
            Self::JavaJar => "java-jar",
            Self::PythonPip => "python-pip",
            Self::PythonPackaging => "python-packaging",
            Self::PythonPipenv => "python-pipenv",
            Self::PythonPoetry => "python-poetry",
            Self::NodeNpm => "node-npm",
            Self::NodePnpm => "node-pnpm",
            Self::NodeYarn => "node-yarn",
            Self::RubyBundler => "ruby-bundler",
            Self::RubyGemspec => "ruby-gemspec",
            Self::RustCargo => "rust-cargo",
            Self::Custom => "custom",
        }
    }

    /// 태그 문자열에서 분석기 타입을 파싱합니다 (대소문자 구분 없음).
    pub fn from_tag(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        if lower == "custom" {
            return Some(Self::Custom);
        }
        Self::BUILTIN.into_iter().find(|t| t.as_str() == lower)
    }

    /// 이 분석기가 속하는 스캔 모드를 반환합니다.
    pub fn scan_mode(&self) -> ScanMode {
        match self {
            Self::Rpm | Self::Dpkg | Self::Apk => ScanMode::PKG,
            Self::Custom => ScanMode::ALL,
            _ => ScanMode::LANGUAGE,
        }
    }

    /// Package URL 타입을 반환합니다.
    ///
    /// 예: Dpkg -> "deb", GoMod -> "golang"
    pub fn purl_type(&self) -> &'static str {
        match self {
            Self::Rpm => "rpm",
            Self::Dpkg => "deb",
            Self::Apk => "apk",
            Self::Conan => "conan",
            Self::GoBinary | Self::GoMod => "golang",
            Self::PhpComposer => "composer",
            Self::JavaGradle | Self::JavaPom | Self::JavaJar => "maven",
            Self::PythonPip | Self::PythonPackaging | Self::PythonPipenv | Self::PythonPoetry => {
                "pypi"
            }
            Self::NodeNpm | Self::NodePnpm | Self::NodeYarn => "npm",
            Self::RubyBundler | Self::RubyGemspec => "gem",
            Self::RustCargo => "cargo",
            Self::Custom => "generic",
        }
    }
}

impl fmt::Display for AnalyzerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 스캔 모드 비트마스크
///
/// `ALL`, `PKG`, `LANGUAGE`를 `|`로 조합할 수 있습니다.
/// `PKG`나 `LANGUAGE`가 포함되면 `ALL`은 무시됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanMode(u8);

impl ScanMode {
    /// 모든 분석기
    pub const ALL: ScanMode = ScanMode(1);
    /// OS 패키지 관리자 분석기
    pub const PKG: ScanMode = ScanMode(1 << 1);
    /// 언어 생태계 분석기
    pub const LANGUAGE: ScanMode = ScanMode(1 << 2);

    /// 비트마스크 값을 반환합니다.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// `other`의 비트가 모두 포함되어 있는지 확인합니다.
    pub fn contains(&self, other: ScanMode) -> bool {
        self.0 & other.0 == other.0
    }

    /// `|`로 조합된 모드 문자열을 파싱합니다 (예: `"pkg|language"`).
    pub fn parse(s: &str) -> Option<Self> {
        let mut mode = ScanMode(0);
        for part in s.split('|').map(str::trim) {
            mode |= match part.to_lowercase().as_str() {
                "all" => Self::ALL,
                "pkg" => Self::PKG,
                "language" | "lang" => Self::LANGUAGE,
                _ => return None,
            };
        }
        if mode.0 == 0 { None } else { Some(mode) }
    }
}

impl Default for ScanMode {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for ScanMode {
    type Output = ScanMode;

    fn bitor(self, rhs: Self) -> Self::Output {
        ScanMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for ScanMode {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.contains(Self::ALL) {
            parts.push("all");
        }
        if self.contains(Self::PKG) {
            parts.push("pkg");
        }
        if self.contains(Self::LANGUAGE) {
            parts.push("language");
        }
        f.write_str(&parts.join("|"))
    }
}

/// SBOM 출력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SbomFormat {
    /// CycloneDX 1.5 JSON
    CycloneDx,
    /// SPDX 2.3 JSON
    Spdx,
}

impl fmt::Display for SbomFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CycloneDx => write!(f, "cyclonedx"),
            Self::Spdx => write!(f, "spdx"),
        }
    }
}

impl SbomFormat {
    /// 문자열에서 SBOM 형식을 파싱합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cyclonedx" | "cdx" => Some(Self::CycloneDx),
            "spdx" => Some(Self::Spdx),
            _ => None,
        }
    }
}

/// SBOM 문서
///
/// 생성된 SBOM의 형식과 내용을 담습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SbomDocument {
    /// SBOM 형식
    pub format: SbomFormat,
    /// JSON 문자열 내용
    pub content: String,
    /// 포함된 컴포넌트 수
    pub component_count: usize,
}

impl fmt::Display for SbomDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SbomDocument(format={}, components={})",
            self.format, self.component_count,
        )
    }
}
