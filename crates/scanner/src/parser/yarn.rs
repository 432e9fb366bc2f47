//! yarn.lock 파서
//!
//! - v1: yarn 고유의 들여쓰기 형식
//! - berry (v2+): YAML 형식, `__metadata` 키로 구분
//!
//! 한 항목은 여러 요청 패턴(`"lodash@^4.0.0", "lodash@^4.17.0":`)을 공유하며
//! 해석된 버전 하나를 가집니다. `workspace:`, `link:`, `portal:`, `file:`
//! 프로토콜로 해석된 항목은 레지스트리 패키지가 아니므로 건너뜁니다.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ScannerError;
use crate::package::DependsOn;
use crate::parser::{Library, ManifestParser, ParseOutput};

/// yarn.lock 파서
pub struct YarnLockParser;

const LOCAL_PROTOCOLS: [&str; 4] = ["workspace:", "link:", "portal:", "file:"];

impl ManifestParser for YarnLockParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        if content.contains("__metadata:") {
            parse_berry(content, source_path)
        } else {
            parse_v1(content, source_path)
        }
    }
}

#[derive(Default)]
struct V1Entry {
    pattern: String,
    version: Option<String>,
    integrity: Option<String>,
    dependencies: DependsOn,
}

fn parse_v1(content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
    let mut entries: Vec<V1Entry> = Vec::new();
    let mut in_dependencies = false;

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        let text = line.trim();

        match indent {
            0 => {
                let Some(header) = text.strip_suffix(':') else {
                    return Err(ScannerError::parse(
                        source_path,
                        format!("line {}: expected entry header", line_no + 1),
                    ));
                };
                let first = header.split(',').next().unwrap_or_default();
                entries.push(V1Entry {
                    pattern: unquote(first).to_owned(),
                    ..V1Entry::default()
                });
                in_dependencies = false;
            }
            2 => {
                let Some(entry) = entries.last_mut() else {
                    return Err(ScannerError::parse(
                        source_path,
                        format!("line {}: field outside of entry", line_no + 1),
                    ));
                };
                in_dependencies = false;
                if text == "dependencies:" || text == "optionalDependencies:" {
                    in_dependencies = text == "dependencies:";
                    continue;
                }
                if let Some((key, value)) = text.split_once(' ') {
                    match key {
                        "version" => entry.version = Some(unquote(value).to_owned()),
                        "integrity" => entry.integrity = Some(unquote(value).to_owned()),
                        _ => {}
                    }
                }
            }
            _ if in_dependencies => {
                if let (Some(entry), Some((name, constraint))) =
                    (entries.last_mut(), text.split_once(' '))
                {
                    entry
                        .dependencies
                        .require(unquote(name), unquote(constraint));
                }
            }
            _ => {}
        }
    }

    let mut out = ParseOutput::default();
    for entry in entries {
        let Some((name, protocol)) = split_pattern(&entry.pattern) else {
            continue;
        };
        if LOCAL_PROTOCOLS.iter().any(|p| protocol.starts_with(p)) {
            continue;
        }
        let Some(version) = entry.version else {
            continue;
        };
        let mut library = Library::new(name, version);
        library.verification = entry
            .integrity
            .as_deref()
            .and_then(|i| i.split_once('-'))
            .map(|(algo, digest)| format!("{algo}:{digest}"));
        out.push(library, entry.dependencies);
    }
    Ok(out)
}

#[derive(Deserialize)]
struct BerryEntry {
    version: Option<serde_yaml::Value>,
    resolution: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, serde_yaml::Value>,
}

fn parse_berry(content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
    let doc: BTreeMap<String, serde_yaml::Value> =
        serde_yaml::from_str(content).map_err(|e| ScannerError::parse(source_path, e))?;

    let mut out = ParseOutput::default();
    for (key, value) in doc {
        if key == "__metadata" {
            continue;
        }
        let entry: BerryEntry =
            serde_yaml::from_value(value).map_err(|e| ScannerError::parse(source_path, e))?;
        let resolution = entry.resolution.as_deref().unwrap_or(key.as_str());
        let Some((name, protocol)) = split_pattern(resolution) else {
            continue;
        };
        if LOCAL_PROTOCOLS.iter().any(|p| protocol.starts_with(p)) {
            continue;
        }
        let Some(version) = entry.version.as_ref().and_then(yaml_scalar) else {
            continue;
        };

        let mut depends_on = DependsOn::default();
        for (dep, constraint) in &entry.dependencies {
            let constraint = yaml_scalar(constraint).unwrap_or_default();
            depends_on.require(dep, constraint.strip_prefix("npm:").unwrap_or(&constraint));
        }
        out.push(Library::new(name, version), depends_on);
    }
    Ok(out)
}

/// YAML 스칼라를 문자열로 읽습니다 (`version: 2.0` 같은 숫자 포함).
pub(crate) fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `@babel/core@^7.0.0` -> (`@babel/core`, `^7.0.0`)
fn split_pattern(pattern: &str) -> Option<(&str, &str)> {
    let pattern = unquote(pattern.trim());
    let search_from = usize::from(pattern.starts_with('@'));
    let at = pattern[search_from..].find('@')? + search_from;
    let name = &pattern[..at];
    if name.is_empty() {
        return None;
    }
    Some((name, &pattern[at + 1..]))
}

fn unquote(s: &str) -> &str {
    s.trim().trim_matches('"')
}
