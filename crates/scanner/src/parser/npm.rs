//! package.json / package-lock.json 파서
//!
//! [`NpmLockParser`]는 package-lock.json v1(`dependencies` 중첩)과
//! v2/v3(`packages` 평면 맵)을 모두 읽습니다.
//! [`PackageJsonParser`]는 `node_modules` 아래 설치된 패키지나 lockfile이 없는
//! 프로젝트의 package.json을 읽어 패키지 하나와 그 의존성 선언을 만듭니다.
//!
//! # package-lock.json v3 형식 예시
//!
//! ```json
//! {
//!   "name": "my-app",
//!   "lockfileVersion": 3,
//!   "packages": {
//!     "": { "name": "my-app", "version": "1.0.0", "dependencies": { "lodash": "^4.17.21" } },
//!     "node_modules/lodash": { "version": "4.17.21", "resolved": "...", "integrity": "sha512-..." }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::error::ScannerError;
use crate::package::DependsOn;
use crate::parser::{Library, ManifestParser, ParseOutput};

/// package-lock.json 파서
pub struct NpmLockParser;

/// package-lock.json 구조 (파싱용)
#[derive(Deserialize)]
struct NpmLockFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    packages: BTreeMap<String, NpmPackageEntry>,
    /// lockfile v1
    #[serde(default)]
    dependencies: BTreeMap<String, NpmLegacyEntry>,
}

/// v2/v3 `packages` 항목 (파싱용)
#[derive(Deserialize)]
struct NpmPackageEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    integrity: Option<String>,
    #[serde(default)]
    license: Option<serde_json::Value>,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    dev: bool,
    #[serde(default)]
    link: bool,
}

/// v1 `dependencies` 항목 (파싱용)
#[derive(Deserialize)]
struct NpmLegacyEntry {
    version: String,
    #[serde(default)]
    integrity: Option<String>,
    #[serde(default)]
    dev: bool,
    #[serde(default)]
    requires: BTreeMap<String, String>,
    #[serde(default)]
    dependencies: BTreeMap<String, NpmLegacyEntry>,
}

impl ManifestParser for NpmLockParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        let lock_file: NpmLockFile =
            serde_json::from_str(content).map_err(|e| ScannerError::parse(source_path, e))?;

        let mut out = ParseOutput::default();
        if lock_file.packages.is_empty() {
            parse_legacy(&lock_file, &mut out);
        } else {
            parse_packages(&lock_file, &mut out);
        }
        Ok(out)
    }
}

fn parse_packages(lock_file: &NpmLockFile, out: &mut ParseOutput) {
    let mut direct: HashSet<&str> = HashSet::new();

    // 루트 패키지는 키가 빈 문자열
    if let Some(root) = lock_file.packages.get("") {
        direct.extend(root.dependencies.keys().map(String::as_str));
        let name = root.name.as_ref().or(lock_file.name.as_ref());
        let version = root.version.as_ref().or(lock_file.version.as_ref());
        if let (Some(name), Some(version)) = (name, version) {
            let mut library = Library::new(name, version);
            library.license = license_of(root.license.as_ref());
            out.push(library, depends_on(&root.dependencies));
        }
    }

    for (key, entry) in &lock_file.packages {
        if key.is_empty() || entry.link || entry.dev {
            continue;
        }
        // 버전 없는 항목은 건너뜀
        let Some(version) = &entry.version else {
            continue;
        };
        let name = entry
            .name
            .clone()
            .unwrap_or_else(|| extract_package_name(key));

        let mut library = Library::new(&name, version);
        library.license = license_of(entry.license.as_ref());
        library.verification = entry.integrity.as_deref().map(integrity_to_verification);
        let top_level = key == &format!("node_modules/{name}");
        library.indirect = !(top_level && direct.contains(name.as_str()));
        out.push(library, depends_on(&entry.dependencies));
    }
}

fn parse_legacy(lock_file: &NpmLockFile, out: &mut ParseOutput) {
    if let (Some(name), Some(version)) = (&lock_file.name, &lock_file.version) {
        let mut root_deps = DependsOn::default();
        for (dep, entry) in &lock_file.dependencies {
            if !entry.dev {
                root_deps.require(dep, &entry.version);
            }
        }
        out.push(Library::new(name, version), root_deps);
    }
    walk_legacy(&lock_file.dependencies, false, out);
}

fn walk_legacy(entries: &BTreeMap<String, NpmLegacyEntry>, nested: bool, out: &mut ParseOutput) {
    for (name, entry) in entries {
        if entry.dev {
            continue;
        }
        let mut library = Library::new(name, &entry.version);
        library.verification = entry.integrity.as_deref().map(integrity_to_verification);
        library.indirect = nested;
        out.push(library, depends_on(&entry.requires));
        walk_legacy(&entry.dependencies, true, out);
    }
}

/// package.json 파서
pub struct PackageJsonParser;

#[derive(Deserialize)]
struct PackageJson {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    license: Option<serde_json::Value>,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

impl ManifestParser for PackageJsonParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        let manifest: PackageJson =
            serde_json::from_str(content).map_err(|e| ScannerError::parse(source_path, e))?;

        let mut out = ParseOutput::default();
        // 이름이나 버전이 없는 package.json은 배포 단위가 아님
        let (Some(name), Some(version)) = (manifest.name, manifest.version) else {
            return Ok(out);
        };
        let mut library = Library::new(name, version);
        library.license = license_of(manifest.license.as_ref());
        out.push(library, depends_on(&manifest.dependencies));
        Ok(out)
    }
}

fn depends_on(deps: &BTreeMap<String, String>) -> DependsOn {
    let mut depends_on = DependsOn::default();
    for (name, constraint) in deps {
        depends_on.require(name, constraint);
    }
    depends_on
}

/// `"MIT"` 또는 `{ "type": "MIT" }` 형식의 라이선스
fn license_of(value: Option<&serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => vec![s.clone()],
        Some(serde_json::Value::Object(o)) => o
            .get("type")
            .and_then(|t| t.as_str())
            .map(|t| vec![t.to_owned()])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// `sha512-<base64>` -> `sha512:<base64>`
fn integrity_to_verification(integrity: &str) -> String {
    match integrity.split_once('-') {
        Some((algo, digest)) => format!("{algo}:{digest}"),
        None => integrity.to_owned(),
    }
}

/// "node_modules/@scope/name" 또는 "node_modules/name" 에서 패키지명 추출
pub(crate) fn extract_package_name(key: &str) -> String {
    // 마지막 "node_modules/" 이후의 부분을 패키지명으로 사용
    // scoped 패키지는 "node_modules/@scope/name" 형식
    if let Some(pos) = key.rfind("node_modules/") {
        let after = &key[pos + "node_modules/".len()..];
        after.to_owned()
    } else {
        key.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PACKAGE_LOCK: &str = r#"{
  "name": "my-app",
  "version": "1.0.0",
  "lockfileVersion": 3,
  "packages": {
    "": {
      "name": "my-app",
      "version": "1.0.0",
      "license": "MIT",
      "dependencies": {
        "express": "^4.18.2"
      },
      "devDependencies": {
        "jest": "^29.0.0"
      }
    },
    "node_modules/accepts": {
      "version": "1.3.8",
      "integrity": "sha512-PYAthTa2m2VKxuvSD3DPC/Gy+U+sOA1LAuT8mkmRuvw+NACSaeXEQ+NHcVF7rONl6qcaxV3Uuemwawk+7+SJLw=="
    },
    "node_modules/express": {
      "version": "4.18.2",
      "resolved": "https://registry.npmjs.org/express/-/express-4.18.2.tgz",
      "integrity": "sha512-abc",
      "license": "MIT",
      "dependencies": {
        "accepts": "~1.3.8"
      }
    },
    "node_modules/jest": {
      "version": "29.0.0",
      "dev": true
    },
    "node_modules/express/node_modules/debug": {
      "version": "2.6.9"
    }
  }
}"#;

    const SAMPLE_PACKAGE_LOCK_V1: &str = r#"{
  "name": "legacy-app",
  "version": "0.1.0",
  "lockfileVersion": 1,
  "requires": true,
  "dependencies": {
    "send": {
      "version": "0.16.2",
      "requires": { "debug": "2.6.9", "parseurl": "~1.3.2" },
      "dependencies": {
        "debug": { "version": "2.6.9" }
      }
    },
    "safe-buffer": { "version": "5.1.2" }
  }
}"#;

    const SAMPLE_PACKAGE_JSON: &str = r#"{
  "name": "body-parser",
  "version": "1.18.3",
  "license": "MIT",
  "dependencies": {
    "bytes": "3.0.0",
    "iconv-lite": "0.4.23"
  },
  "devDependencies": {
    "mocha": "2.5.3"
  }
}"#;

    #[test]
    fn parse_sample_package_lock() {
        let out = NpmLockParser.parse(SAMPLE_PACKAGE_LOCK, "package-lock.json").unwrap();
        let ids: Vec<_> = out.libraries.iter().map(|l| l.id()).collect();
        assert_eq!(
            ids,
            vec![
                "my-app@1.0.0",
                "accepts@1.3.8",
                "express@4.18.2",
                "debug@2.6.9",
            ]
        );

        let express = out.find("express").unwrap();
        assert!(!express.indirect);
        assert_eq!(express.license, vec!["MIT"]);
        assert_eq!(express.verification.as_deref(), Some("sha512:abc"));
        assert_eq!(out.depends_on(express).unwrap().and["accepts"], "~1.3.8");

        assert!(out.find("accepts").unwrap().indirect);
        assert!(out.find("debug").unwrap().indirect);
        assert!(out.find("jest").is_none());
    }

    #[test]
    fn parse_legacy_lockfile() {
        let out = NpmLockParser.parse(SAMPLE_PACKAGE_LOCK_V1, "package-lock.json").unwrap();
        let ids: Vec<_> = out.libraries.iter().map(|l| l.id()).collect();
        assert_eq!(
            ids,
            vec!["legacy-app@0.1.0", "safe-buffer@5.1.2", "send@0.16.2", "debug@2.6.9"]
        );
        let send = out.find("send").unwrap();
        assert_eq!(out.depends_on(send).unwrap().and["parseurl"], "~1.3.2");
        assert!(out.find("debug").unwrap().indirect);
    }

    #[test]
    fn parse_package_json() {
        let out = PackageJsonParser
            .parse(SAMPLE_PACKAGE_JSON, "/node_modules/body-parser/package.json")
            .unwrap();
        assert_eq!(out.libraries.len(), 1);
        let pkg = &out.libraries[0];
        assert_eq!(pkg.id(), "body-parser@1.18.3");
        assert_eq!(pkg.license, vec!["MIT"]);

        let deps = out.depends_on(pkg).unwrap();
        assert_eq!(deps.and["iconv-lite"], "0.4.23");
        assert!(!deps.and.contains_key("mocha"));
    }

    #[test]
    fn package_json_without_version_is_empty() {
        let out = PackageJsonParser.parse(r#"{ "private": true }"#, "package.json").unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn parse_empty_packages() {
        let json = r#"{ "packages": {} }"#;
        let out = NpmLockParser.parse(json, "package-lock.json").unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn parse_invalid_json_returns_error() {
        assert!(NpmLockParser.parse("not json!", "package-lock.json").is_err());
        assert!(PackageJsonParser.parse("not json!", "package.json").is_err());
    }

    #[test]
    fn license_object_form() {
        let value: serde_json::Value = serde_json::from_str(r#"{ "type": "ISC" }"#).unwrap();
        assert_eq!(license_of(Some(&value)), vec!["ISC"]);
    }

    #[test]
    fn extract_package_name_simple() {
        assert_eq!(extract_package_name("node_modules/lodash"), "lodash");
    }

    #[test]
    fn extract_package_name_scoped() {
        assert_eq!(
            extract_package_name("node_modules/@types/node"),
            "@types/node"
        );
    }

    #[test]
    fn extract_package_name_nested() {
        assert_eq!(
            extract_package_name("node_modules/express/node_modules/debug"),
            "debug"
        );
    }
}
