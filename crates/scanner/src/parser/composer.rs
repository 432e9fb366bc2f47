//! PHP composer.lock 파서
//!
//! `packages`와 `packages-dev` 배열을 읽습니다. 버전 문자열은 그대로
//! 유지합니다 (`v1.0.2` 등). `require`의 `php`, `ext-*`, `lib-*` 같은
//! 플랫폼 요구사항은 의존성에서 제외합니다.
//!
//! 같은 디렉토리의 composer.json이 있으면 그 `require`에 없는 패키지를
//! 간접 의존성으로 표시합니다. composer.json이 없거나 깨져 있어도
//! lockfile 결과는 그대로 사용합니다.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::error::ScannerError;
use crate::package::DependsOn;
use crate::parser::{Library, ManifestParser, ParseOutput};

/// composer.lock 파서
pub struct ComposerLockParser;

#[derive(Deserialize)]
struct ComposerLock {
    #[serde(default)]
    packages: Vec<LockedPackage>,
    #[serde(default, rename = "packages-dev")]
    packages_dev: Vec<LockedPackage>,
}

#[derive(Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
    #[serde(default)]
    license: Vec<String>,
    #[serde(default)]
    require: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct ComposerJson {
    #[serde(default)]
    require: BTreeMap<String, String>,
    #[serde(default, rename = "require-dev")]
    require_dev: BTreeMap<String, String>,
}

impl ManifestParser for ComposerLockParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        parse_composer_lock(content, None, source_path)
    }
}

/// composer.json에서 직접 의존성 이름을 읽습니다. 깨진 파일은 `None`입니다.
pub fn direct_requirements(composer_json: &str) -> Option<HashSet<String>> {
    let json: ComposerJson = serde_json::from_str(composer_json).ok()?;
    Some(json.require.into_keys().chain(json.require_dev.into_keys()).collect())
}

/// composer.lock을 파싱합니다. `direct`가 주어지면 간접 의존성을 표시합니다.
pub fn parse_composer_lock(
    content: &str,
    direct: Option<&HashSet<String>>,
    source_path: &str,
) -> Result<ParseOutput, ScannerError> {
    let lock: ComposerLock =
        serde_json::from_str(content).map_err(|e| ScannerError::parse(source_path, e))?;

    let mut out = ParseOutput::default();
    for pkg in lock.packages.into_iter().chain(lock.packages_dev) {
        let mut depends_on = DependsOn::default();
        for (name, constraint) in &pkg.require {
            if is_platform_requirement(name) {
                continue;
            }
            depends_on.require(name, constraint);
        }

        let mut library = Library::new(pkg.name, pkg.version);
        library.license = pkg.license;
        library.indirect = direct.is_some_and(|d| !d.contains(&library.name));
        out.push(library, depends_on);
    }
    Ok(out)
}

fn is_platform_requirement(name: &str) -> bool {
    name == "php"
        || name.starts_with("php-")
        || name.starts_with("ext-")
        || name.starts_with("lib-")
        || name == "composer-plugin-api"
        || name == "composer-runtime-api"
}
