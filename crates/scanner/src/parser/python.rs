//! Python 파서 -- requirements.txt, Pipfile.lock, poetry.lock, 패키지 메타데이터
//!
//! Poetry는 같은 디렉토리의 pyproject.toml이 있으면 직접 의존성을 구분합니다.
//! 설치된 패키지는 `METADATA`(wheel), `PKG-INFO`(egg-info), `.egg` 아카이브에서 읽습니다.

use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Read};

use serde::Deserialize;

use crate::error::ScannerError;
use crate::package::DependsOn;
use crate::parser::{Library, ManifestParser, ParseOutput, header_blocks, header_value};

/// requirements.txt 파서
///
/// `==`로 고정된 항목만 라이브러리로 인식합니다. 주석, 옵션(`-r`, `--hash`),
/// extras(`pkg[extra]`), 환경 마커(`; python_version < "3.8"`)는 제거합니다.
pub struct RequirementsParser;

impl ManifestParser for RequirementsParser {
    fn parse(&self, content: &str, _source_path: &str) -> Result<ParseOutput, ScannerError> {
        let mut out = ParseOutput::default();
        for line in content.lines() {
            let line = line.split('#').next().unwrap_or_default();
            let line = line.split(';').next().unwrap_or_default().trim();
            if line.is_empty() || line.starts_with('-') {
                continue;
            }
            let line = line.split(" --").next().unwrap_or_default();
            let Some((name, version)) = line.split_once("==") else {
                continue;
            };
            let name = name.split('[').next().unwrap_or_default().trim();
            let version = version.trim().trim_start_matches('=').trim();
            if name.is_empty() || version.is_empty() {
                continue;
            }
            out.push(Library::new(name, version), DependsOn::default());
        }
        Ok(out)
    }
}

/// Pipfile.lock 파서 (`default` 섹션만 사용)
pub struct PipfileLockParser;

#[derive(Deserialize)]
struct PipfileLock {
    #[serde(default)]
    default: BTreeMap<String, PipfileEntry>,
}

#[derive(Deserialize)]
struct PipfileEntry {
    version: Option<String>,
}

impl ManifestParser for PipfileLockParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        if content.trim().is_empty() {
            return Err(ScannerError::parse(source_path, "empty Pipfile.lock"));
        }
        let lock: PipfileLock =
            serde_json::from_str(content).map_err(|e| ScannerError::parse(source_path, e))?;

        let mut out = ParseOutput::default();
        for (name, entry) in lock.default {
            // git/path 의존성은 version이 없음
            let Some(version) = entry.version else {
                continue;
            };
            let version = version.trim_start_matches('=').to_owned();
            out.push(Library::new(name, version), DependsOn::default());
        }
        Ok(out)
    }
}

/// poetry.lock 파서
pub struct PoetryLockParser;

#[derive(Deserialize)]
struct PoetryLock {
    #[serde(default)]
    package: Vec<PoetryPackage>,
}

#[derive(Deserialize)]
struct PoetryPackage {
    name: String,
    version: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, toml::Value>,
}

#[derive(Deserialize)]
struct PyProject {
    tool: Option<PyProjectTool>,
}

#[derive(Deserialize)]
struct PyProjectTool {
    poetry: Option<PoetrySection>,
}

#[derive(Deserialize)]
struct PoetrySection {
    #[serde(default)]
    dependencies: BTreeMap<String, toml::Value>,
}

impl ManifestParser for PoetryLockParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        parse_poetry_lock(content, None, source_path)
    }
}

/// pyproject.toml의 `[tool.poetry.dependencies]` 이름을 정규화해 반환합니다.
/// 깨졌거나 Poetry 섹션이 없으면 `None`입니다.
pub fn poetry_direct_dependencies(pyproject: &str) -> Option<HashSet<String>> {
    let project: PyProject = toml::from_str(pyproject).ok()?;
    let poetry = project.tool?.poetry?;
    Some(
        poetry
            .dependencies
            .into_keys()
            .filter(|name| name != "python")
            .map(|name| normalize_name(&name))
            .collect(),
    )
}

/// poetry.lock을 파싱합니다. `direct`가 주어지면 간접 의존성을 표시합니다.
pub fn parse_poetry_lock(
    content: &str,
    direct: Option<&HashSet<String>>,
    source_path: &str,
) -> Result<ParseOutput, ScannerError> {
    let lock: PoetryLock =
        toml::from_str(content).map_err(|e| ScannerError::parse(source_path, e))?;
    if lock.package.is_empty() {
        return Err(ScannerError::parse(source_path, "no [[package]] entries"));
    }

    let mut out = ParseOutput::default();
    for pkg in lock.package {
        if pkg.category.as_deref() == Some("dev") {
            continue;
        }
        let mut depends_on = DependsOn::default();
        for (dep, spec) in &pkg.dependencies {
            let constraint = match spec {
                toml::Value::String(s) => s.clone(),
                toml::Value::Table(t) => t
                    .get("version")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_owned(),
                // 마커별로 다른 제약을 가진 배열 형식
                _ => String::new(),
            };
            depends_on.require(normalize_name(dep), normalize_constraint(&constraint));
        }
        let mut library = Library::new(normalize_name(&pkg.name), pkg.version);
        library.indirect = direct.is_some_and(|d| !d.contains(&library.name));
        out.push(library, depends_on);
    }
    Ok(out)
}

fn normalize_constraint(constraint: &str) -> String {
    if constraint.trim() == "*" {
        String::new()
    } else {
        constraint.trim().to_owned()
    }
}

/// PEP 503 이름 정규화: 소문자, `_`/`.` -> `-`
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace(['_', '.'], "-")
}

/// 설치된 패키지 메타데이터(`METADATA`, `PKG-INFO`) 파서
pub struct PackageMetadataParser;

impl ManifestParser for PackageMetadataParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        let blocks = header_blocks(content);
        let header = blocks
            .first()
            .ok_or_else(|| ScannerError::parse(source_path, "empty metadata"))?;
        let name = header_value(header, "Name");
        let version = header_value(header, "Version");
        let (Some(name), Some(version)) = (name, version) else {
            return Err(ScannerError::parse(source_path, "metadata without Name/Version"));
        };

        let mut library = Library::new(name, version);
        library.license = metadata_license(header);

        let mut depends_on = DependsOn::default();
        for (key, value) in header {
            if !key.eq_ignore_ascii_case("Requires-Dist") || value.contains("extra ==") {
                continue;
            }
            if let Some((dep, constraint)) = parse_requirement(value) {
                depends_on.require(dep, constraint);
            }
        }

        let mut out = ParseOutput::default();
        out.push(library, depends_on);
        Ok(out)
    }
}

fn metadata_license(header: &[(String, String)]) -> Vec<String> {
    if let Some(license) = header_value(header, "License") {
        let license = license.lines().next().unwrap_or_default().trim();
        if !license.is_empty() && !license.eq_ignore_ascii_case("UNKNOWN") {
            return vec![license.to_owned()];
        }
    }
    if let Some(expr) = header_value(header, "License-Expression") {
        return vec![expr.to_owned()];
    }
    header
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("Classifier"))
        .filter_map(|(_, v)| v.strip_prefix("License ::"))
        .filter_map(|v| v.rsplit("::").next())
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .collect()
}

/// `requests (>=2.0) ; python_version > "3"` -> (`requests`, `>=2.0`)
fn parse_requirement(spec: &str) -> Option<(String, String)> {
    let spec = spec.split(';').next()?.trim();
    let end = spec
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(spec.len());
    let name = &spec[..end];
    if name.is_empty() {
        return None;
    }
    let mut rest = spec[end..].trim();
    if rest.starts_with('[') {
        rest = rest.split_once(']').map(|(_, r)| r.trim()).unwrap_or_default();
    }
    let constraint = rest.trim_start_matches('(').trim_end_matches(')').trim();
    Some((name.to_owned(), constraint.to_owned()))
}

/// `.egg` 아카이브(zip) 안의 `EGG-INFO/PKG-INFO`를 파싱합니다.
pub fn parse_egg(data: &[u8], source_path: &str) -> Result<ParseOutput, ScannerError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(data)).map_err(|e| ScannerError::parse(source_path, e))?;
    let mut entry = archive
        .by_name("EGG-INFO/PKG-INFO")
        .map_err(|e| ScannerError::parse(source_path, e))?;
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| ScannerError::parse(source_path, e))?;
    PackageMetadataParser.parse(&content, source_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_REQUIREMENTS: &str = "\
# web stack
click==8.0.0
Flask[async]==2.0.0 ; python_version >= \"3.7\"
itsdangerous == 2.0.0 --hash=sha256:abc
requests>=2.0
-r other.txt
";

    const SAMPLE_PIPFILE_LOCK: &str = r#"{
    "_meta": { "hash": { "sha256": "abc" }, "pipfile-spec": 6 },
    "default": {
        "pytz": { "hashes": ["sha256:1"], "index": "pypi", "version": "==2022.7.1" },
        "local": { "path": "." }
    },
    "develop": {
        "pytest": { "version": "==7.2.0" }
    }
}"#;

    const SAMPLE_POETRY_LOCK: &str = r#"
[[package]]
name = "click"
version = "8.1.3"
description = "Composable command line interface toolkit"
category = "main"
optional = false
python-versions = ">=3.7"

[package.dependencies]
colorama = {version = "*", markers = "platform_system == \"Windows\""}

[[package]]
name = "colorama"
version = "0.4.6"
description = "Cross-platform colored terminal text."
category = "main"
optional = false
python-versions = "!=3.0.*,!=3.1.*,>=2.7"

[[package]]
name = "pytest"
version = "7.2.0"
category = "dev"
optional = false
python-versions = ">=3.7"

[metadata]
lock-version = "1.1"
"#;

    const SAMPLE_PYPROJECT: &str = r#"
[tool.poetry]
name = "demo"
version = "0.1.0"

[tool.poetry.dependencies]
python = "^3.9"
Click = "^8.1"
"#;

    const SAMPLE_METADATA: &str = "\
Metadata-Version: 1.1
Name: kitchen
Version: 1.2.6
Summary: Kitchen contains a cornucopia of useful code
License: LGPLv2+
Classifier: License :: OSI Approved :: GNU Lesser General Public License v2 or later (LGPLv2+)
Requires-Dist: chardet (>=3.0)
Requires-Dist: pytest ; extra == \"test\"

Long description body.
";

    #[test]
    fn parse_requirements_pins_only() {
        let out = RequirementsParser.parse(SAMPLE_REQUIREMENTS, "requirements.txt").unwrap();
        let ids: Vec<_> = out.libraries.iter().map(|l| l.id()).collect();
        assert_eq!(ids, vec!["click@8.0.0", "Flask@2.0.0", "itsdangerous@2.0.0"]);
    }

    #[test]
    fn parse_pipfile_lock_default_only() {
        let out = PipfileLockParser.parse(SAMPLE_PIPFILE_LOCK, "Pipfile.lock").unwrap();
        assert_eq!(out.libraries, vec![Library::new("pytz", "2022.7.1")]);
    }

    #[test]
    fn empty_pipfile_lock_is_an_error() {
        assert!(PipfileLockParser.parse("", "Pipfile.lock").is_err());
        assert!(PipfileLockParser.parse("{ broken", "Pipfile.lock").is_err());
    }

    #[test]
    fn parse_poetry_lock_skips_dev() {
        let out = PoetryLockParser.parse(SAMPLE_POETRY_LOCK, "poetry.lock").unwrap();
        let ids: Vec<_> = out.libraries.iter().map(|l| l.id()).collect();
        assert_eq!(ids, vec!["click@8.1.3", "colorama@0.4.6"]);

        let deps = out.depends_on(out.find("click").unwrap()).unwrap();
        assert_eq!(deps.and["colorama"], "");
    }

    #[test]
    fn pyproject_marks_direct_dependencies() {
        let direct = poetry_direct_dependencies(SAMPLE_PYPROJECT).unwrap();
        assert!(direct.contains("click"));
        assert!(!direct.contains("python"));

        let out = parse_poetry_lock(SAMPLE_POETRY_LOCK, Some(&direct), "poetry.lock").unwrap();
        assert!(!out.find("click").unwrap().indirect);
        assert!(out.find("colorama").unwrap().indirect);
    }

    #[test]
    fn broken_pyproject_is_ignored() {
        assert!(poetry_direct_dependencies("[tool.poetry").is_none());
        assert!(poetry_direct_dependencies("[project]\nname = \"x\"\n").is_none());
    }

    #[test]
    fn invalid_poetry_lock_is_an_error() {
        assert!(PoetryLockParser.parse("[[package]]\nname = 1\n", "poetry.lock").is_err());
        assert!(PoetryLockParser.parse("", "poetry.lock").is_err());
    }

    #[test]
    fn parse_metadata_license_and_requires() {
        let out = PackageMetadataParser
            .parse(SAMPLE_METADATA, "/site-packages/kitchen-1.2.6.egg-info/PKG-INFO")
            .unwrap();
        let kitchen = out.find("kitchen").unwrap();
        assert_eq!(kitchen.version, "1.2.6");
        assert_eq!(kitchen.license, vec!["LGPLv2+"]);

        let deps = out.depends_on(kitchen).unwrap();
        assert_eq!(deps.and["chardet"], ">=3.0");
        assert!(!deps.and.contains_key("pytest"));
    }

    #[test]
    fn classifier_license_fallback() {
        let metadata = "Name: x\nVersion: 1\nLicense: UNKNOWN\nClassifier: License :: OSI Approved :: MIT License\n";
        let out = PackageMetadataParser.parse(metadata, "METADATA").unwrap();
        assert_eq!(out.libraries[0].license, vec!["MIT License"]);
    }

    #[test]
    fn parse_egg_archive() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            writer
                .start_file("EGG-INFO/PKG-INFO", zip::write::FileOptions::default())
                .unwrap();
            writer
                .write_all(b"Metadata-Version: 2.1\nName: distlib\nVersion: 0.3.1\nLicense: Python license\n")
                .unwrap();
            writer.finish().unwrap();
        }
        let out = parse_egg(buf.get_ref(), "/distlib-0.3.1-py2.7.egg").unwrap();
        assert_eq!(out.libraries[0].id(), "distlib@0.3.1");
        assert_eq!(out.libraries[0].license, vec!["Python license"]);
    }

    #[test]
    fn requirement_spec_parsing() {
        assert_eq!(
            parse_requirement("requests[socks] (>=2.0,<3) ; python_version > \"3\""),
            Some(("requests".to_owned(), ">=2.0,<3".to_owned()))
        );
        assert_eq!(
            parse_requirement("idna>=2.5"),
            Some(("idna".to_owned(), ">=2.5".to_owned()))
        );
    }
}
