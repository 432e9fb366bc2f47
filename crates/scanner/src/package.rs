//! 패키지 데이터 모델
//!
//! [`Package`]는 분석기가 발견한 하나의 패키지 레코드입니다.
//! 패키지 간 관계(upstream/downstream)는 패키지 자체가 아니라
//! [`PackageGraph`](crate::graph::PackageGraph) 아레나가 소유합니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::AnalyzerType;

/// 버전 제약이 없는 의존성의 버전 표기
pub const ANY_VERSION: &str = "*";

/// OR 그룹 대안의 이름/버전 구분자
pub const OR_SEPARATOR: char = '|';

/// OR 의존성 그룹: 선언 순서를 유지하는 (이름, 버전 제약) 목록
pub type OrGroup = Vec<(String, String)>;

/// 의존성 선언
///
/// `and`의 모든 항목이 필요하고, `or`의 각 그룹에서는 하나의 대안만 필요합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependsOn {
    /// 의존성 이름 -> 버전 제약
    #[serde(default)]
    pub and: BTreeMap<String, String>,
    /// 대안 그룹 목록
    #[serde(default)]
    pub or: Vec<OrGroup>,
}

impl DependsOn {
    /// 선언된 의존성이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.and.is_empty() && self.or.iter().all(|g| g.is_empty())
    }

    /// AND 의존성을 추가합니다. 이미 있는 이름은 덮어쓰지 않습니다.
    pub fn require(&mut self, name: impl Into<String>, constraint: impl Into<String>) {
        self.and.entry(name.into()).or_insert_with(|| constraint.into());
    }

    /// OR 그룹을 추가합니다. 빈 그룹과 중복 그룹은 무시합니다.
    pub fn require_any(&mut self, group: OrGroup) {
        if !group.is_empty() && !self.or.contains(&group) {
            self.or.push(group);
        }
    }

    /// 다른 선언을 합칩니다.
    pub fn extend(&mut self, other: &DependsOn) {
        for (name, constraint) in &other.and {
            self.require(name.clone(), constraint.clone());
        }
        for group in &other.or {
            self.require_any(group.clone());
        }
    }
}

/// 소프트웨어 패키지
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// 패키지 이름
    pub name: String,
    /// 버전 (`*` 또는 범위 표현식일 수 있음)
    pub version: String,
    /// `name + version`의 SHA-256 (hex)
    pub identifier: String,

    /// 간접(전이) 의존성으로 발견됨
    pub indirect: bool,
    /// 파일에서 직접 관측되지 않고 합성된 자리표시자
    pub potential: bool,
    /// `version`이 정확한 값이 아닌 제약 조건
    pub is_version_range: bool,

    /// 스킴 접두사가 붙은 다이제스트 (예: `sha1:...`)
    pub verification: Option<String>,
    /// 라이선스 목록
    pub license: Vec<String>,
    /// 보안 도구용 CPE 보강
    pub amended_cpe: Vec<String>,
    /// 보안 도구용 CVE 연결
    pub associated_cve: Vec<String>,

    /// 발견된 파일 경로 (병합 시 합집합)
    pub from_file: Vec<String>,
    /// 발견한 분석기 (병합 시 합집합)
    pub from_analyzer: Vec<AnalyzerType>,

    /// 의존성 선언
    pub depends_on: DependsOn,
}

impl Package {
    /// 이름과 버전으로 패키지를 생성합니다.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        let version = version.into();
        let identifier = make_identifier(&name, &version);
        Self {
            name,
            version,
            identifier,
            ..Self::default()
        }
    }

    /// 선언되었지만 관측되지 않은 의존성의 자리표시자를 생성합니다.
    ///
    /// 빈 제약은 `*`로 기록됩니다.
    pub fn potential(name: impl Into<String>, constraint: &str) -> Self {
        let version = if constraint.trim().is_empty() {
            ANY_VERSION.to_owned()
        } else {
            constraint.trim().to_owned()
        };
        let mut pkg = Self::new(name, version);
        pkg.potential = true;
        pkg.is_version_range = true;
        pkg
    }

    /// 출처(파일, 분석기)를 추가합니다.
    pub fn with_source(mut self, file: impl Into<String>, analyzer: AnalyzerType) -> Self {
        self.add_source(file, analyzer);
        self
    }

    /// 출처를 중복 없이 추가합니다.
    pub fn add_source(&mut self, file: impl Into<String>, analyzer: AnalyzerType) {
        push_unique(&mut self.from_file, file.into());
        push_unique(&mut self.from_analyzer, analyzer);
    }

    /// 버전을 바꾸고 식별자를 다시 계산합니다.
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
        self.identifier = make_identifier(&self.name, &self.version);
    }

    /// OR 자리표시자 노드인지 확인합니다.
    pub fn is_or_placeholder(&self) -> bool {
        self.name.contains(OR_SEPARATOR)
    }

    /// 정확한 버전 값이 아닌지 확인합니다 (`*`, 범위, 범위 플래그).
    pub fn has_loose_version(&self) -> bool {
        self.version == ANY_VERSION || self.is_version_range || is_range_expr(&self.version)
    }

    /// 첫 번째 분석기 기준의 Package URL을 반환합니다.
    pub fn purl(&self) -> String {
        let purl_type = self
            .from_analyzer
            .first()
            .map(|a| a.purl_type())
            .unwrap_or("generic");
        format!("pkg:{}/{}@{}", purl_type, self.name, self.version)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)?;
        if self.potential {
            write!(f, " (potential)")?;
        }
        Ok(())
    }
}

/// `name + version`의 안정적인 식별자를 계산합니다.
pub fn make_identifier(name: &str, version: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(version.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 버전 문자열이 범위 제약인지 확인합니다.
///
/// `<`, `>`를 포함하거나 `^`, `~` 접두사로 시작하면 범위입니다.
/// `1.0~rc1` 같은 Debian 버전의 중간 `~`는 범위가 아닙니다.
pub fn is_range_expr(version: &str) -> bool {
    let version = version.trim_start();
    version.contains(['<', '>']) || version.starts_with(['^', '~'])
}

/// 순서를 유지하며 중복 없이 추가합니다.
pub(crate) fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_is_stable_and_version_sensitive() {
        let a = Package::new("openssl", "3.0.5");
        let b = Package::new("openssl", "3.0.5");
        let c = Package::new("openssl", "3.0.6");
        assert_eq!(a.identifier, b.identifier);
        assert_ne!(a.identifier, c.identifier);
        assert_eq!(a.identifier.len(), 64);
    }

    #[test]
    fn potential_uses_star_for_empty_constraint() {
        let p = Package::potential("passwd", "");
        assert_eq!(p.version, "*");
        assert!(p.potential);
        assert!(p.is_version_range);

        let p = Package::potential("libc6", ">= 2.34");
        assert_eq!(p.version, ">= 2.34");
    }

    #[test]
    fn add_source_deduplicates() {
        let mut p = Package::new("zlib", "1.2.13")
            .with_source("/lib/apk/db/installed", AnalyzerType::Apk);
        p.add_source("/lib/apk/db/installed", AnalyzerType::Apk);
        p.add_source("/layer2/lib/apk/db/installed", AnalyzerType::Apk);
        assert_eq!(p.from_file.len(), 2);
        assert_eq!(p.from_analyzer, vec![AnalyzerType::Apk]);
    }

    #[test]
    fn set_version_updates_identifier() {
        let mut p = Package::potential("zlib", "*");
        let before = p.identifier.clone();
        p.set_version("1.2.13");
        assert_ne!(before, p.identifier);
        assert_eq!(p.identifier, make_identifier("zlib", "1.2.13"));
    }

    #[test]
    fn depends_on_require_keeps_first_constraint() {
        let mut deps = DependsOn::default();
        deps.require("libc6", ">= 2.34");
        deps.require("libc6", ">= 2.0");
        assert_eq!(deps.and["libc6"], ">= 2.34");
    }

    #[test]
    fn depends_on_ignores_empty_or_group() {
        let mut deps = DependsOn::default();
        deps.require_any(Vec::new());
        assert!(deps.is_empty());
    }

    #[test]
    fn purl_from_first_analyzer() {
        let p = Package::new("bash", "5.1-6ubuntu1").with_source("/status", AnalyzerType::Dpkg);
        assert_eq!(p.purl(), "pkg:deb/bash@5.1-6ubuntu1");
        assert_eq!(Package::new("x", "1").purl(), "pkg:generic/x@1");
    }

    #[test]
    fn loose_version_detection() {
        assert!(Package::new("x", "*").has_loose_version());
        assert!(Package::new("x", ">2.0").has_loose_version());
        assert!(!Package::new("x", "1.2.3").has_loose_version());
        assert!(Package::potential("x", "^1.2").has_loose_version());
    }

    #[test]
    fn range_expr_by_text() {
        assert!(is_range_expr(">= 2.34"));
        assert!(is_range_expr("~> 7.0"));
        assert!(is_range_expr("^4.17.0"));
        assert!(is_range_expr("~1.2"));
        assert!(!is_range_expr("1.0~rc1-1"));
        assert!(!is_range_expr("2.0.0"));
    }
}
