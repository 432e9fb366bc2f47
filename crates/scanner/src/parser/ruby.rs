//! Ruby 매니페스트 파서
//!
//! - `Gemfile.lock`: `GEM` 섹션의 `specs:` 목록과 `DEPENDENCIES` 섹션
//! - `*.gemspec`: 설치된 gem의 specification 파일

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ScannerError;
use crate::package::DependsOn;
use crate::parser::{Library, ManifestParser, ParseOutput};

/// Gemfile.lock 파서
pub struct GemfileLockParser;

impl ManifestParser for GemfileLockParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        let mut specs: Vec<(Library, DependsOn)> = Vec::new();
        let mut direct: HashSet<String> = HashSet::new();
        let mut section = "";
        let mut in_specs = false;

        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if !line.starts_with(' ') {
                section = line.trim();
                in_specs = false;
                continue;
            }

            let indent = line.len() - line.trim_start().len();
            let text = line.trim();
            match (section, indent) {
                ("GEM", 2) => in_specs = text == "specs:",
                ("GEM", 4) if in_specs => {
                    let Some((name, version)) = split_spec(text) else {
                        return Err(ScannerError::parse(
                            source_path,
                            format!("line {}: invalid spec '{text}'", line_no + 1),
                        ));
                    };
                    specs.push((Library::new(name, strip_platform(version)), DependsOn::default()));
                }
                ("GEM", 6) if in_specs => {
                    if let Some((_, deps)) = specs.last_mut() {
                        let (name, constraint) = split_spec(text).unwrap_or((text, ""));
                        deps.require(name, constraint);
                    }
                }
                ("DEPENDENCIES", 2) => {
                    let name = text.split([' ', '!']).next().unwrap_or(text);
                    direct.insert(name.to_owned());
                }
                _ => {}
            }
        }

        let mut out = ParseOutput::default();
        for (mut library, depends_on) in specs {
            library.indirect = !direct.is_empty() && !direct.contains(&library.name);
            out.push(library, depends_on);
        }
        Ok(out)
    }
}

/// `name (version)` -> (`name`, `version`)
fn split_spec(text: &str) -> Option<(&str, &str)> {
    let (name, rest) = text.split_once(' ')?;
    let version = rest.trim().strip_prefix('(')?.strip_suffix(')')?;
    Some((name, version.trim()))
}

/// `1.13.10-x86_64-linux` -> `1.13.10`
fn strip_platform(version: &str) -> &str {
    version.split('-').next().unwrap_or(version)
}

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*\w+\.name\s*=\s*["']([^"']+)["']"#).expect("static regex")
});
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*\w+\.version\s*=\s*["']([^"']+)["']"#).expect("static regex")
});
static LICENSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\w+\.licenses?\s*=\s*(.+)$").expect("static regex"));
static DEPENDENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\s*\w+\.add_(?:runtime_)?dependency\s*\(?\s*(?:%q<([^>]+)>|["']([^"']+)["'])(?:\.freeze)?\s*(.*)$"#,
    )
    .expect("static regex")
});
static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([^"']*)["']"#).expect("static regex"));

/// gemspec 파서
///
/// Ruby 코드를 실행하지 않고 `name`, `version`, `licenses`,
/// `add_runtime_dependency` / `add_dependency` 줄만 정규식으로 읽습니다.
/// `add_development_dependency`는 무시합니다.
pub struct GemspecParser;

impl ManifestParser for GemspecParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        let mut name = None;
        let mut version = None;
        let mut licenses = Vec::new();
        let mut depends_on = DependsOn::default();

        for line in content.lines() {
            if let Some(caps) = NAME_RE.captures(line) {
                name.get_or_insert_with(|| caps[1].to_owned());
            } else if let Some(caps) = VERSION_RE.captures(line) {
                version.get_or_insert_with(|| caps[1].to_owned());
            } else if let Some(caps) = LICENSE_RE.captures(line) {
                licenses.extend(QUOTED_RE.captures_iter(&caps[1]).map(|c| c[1].to_owned()));
            } else if let Some(caps) = DEPENDENCY_RE.captures(line) {
                let dep = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                let constraint = caps
                    .get(3)
                    .map(|rest| {
                        QUOTED_RE
                            .captures_iter(rest.as_str())
                            .map(|c| c[1].to_owned())
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default();
                depends_on.require(dep, constraint);
            }
        }

        let (Some(name), Some(version)) = (name, version) else {
            return Err(ScannerError::parse(
                source_path,
                "gemspec has no name or version",
            ));
        };
        let mut library = Library::new(name, version);
        library.license = licenses;

        let mut out = ParseOutput::default();
        out.push(library, depends_on);
        Ok(out)
    }
}
