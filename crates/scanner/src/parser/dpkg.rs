//! Debian dpkg status 파서
//!
//! `var/lib/dpkg/status`와 distroless 이미지의 `var/lib/dpkg/status.d/*`를 읽습니다.
//! 설치 상태(`Status: install ok installed`)가 아닌 블록은 건너뜁니다.
//!
//! # 의존성 문법
//!
//! ```text
//! Depends: libc6 (>= 2.34), debconf (>= 0.5) | debconf-2.0, passwd
//! ```
//!
//! - 쉼표로 구분된 각 항목은 AND 의존성입니다.
//! - `|`로 묶인 항목은 OR 그룹이 됩니다.
//! - 괄호 안의 `(>= 2.34)`는 `">= 2.34"` 제약 문자열이 됩니다.
//! - `:any`, `:amd64` 같은 아키텍처 한정자는 제거합니다.

use crate::error::ScannerError;
use crate::package::DependsOn;
use crate::parser::{Library, ManifestParser, ParseOutput, header_blocks, header_value};

/// dpkg status 파서
pub struct DpkgStatusParser;

impl ManifestParser for DpkgStatusParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        let blocks = header_blocks(content);
        let mut out = ParseOutput::default();

        for block in &blocks {
            let Some(name) = header_value(block, "Package") else {
                continue;
            };
            if let Some(status) = header_value(block, "Status") {
                if !status.ends_with("installed") || status.contains("not-installed") {
                    continue;
                }
            }
            let Some(version) = header_value(block, "Version") else {
                continue;
            };

            let mut depends_on = DependsOn::default();
            for field in ["Pre-Depends", "Depends"] {
                if let Some(value) = header_value(block, field) {
                    parse_depends(value, name, &mut depends_on);
                }
            }
            out.push(Library::new(name, version), depends_on);
        }

        let has_stanza = blocks.iter().any(|b| header_value(b, "Package").is_some());
        if !blocks.is_empty() && !has_stanza {
            return Err(ScannerError::parse(source_path, "no Package stanza found"));
        }
        Ok(out)
    }
}

/// `Depends` 필드 값을 AND/OR 선언으로 변환합니다.
fn parse_depends(value: &str, self_name: &str, depends_on: &mut DependsOn) {
    for item in value.split(',') {
        let alternatives: Vec<(String, String)> = item
            .split('|')
            .filter_map(parse_relation)
            .filter(|(name, _)| name != self_name)
            .collect();

        match alternatives.len() {
            0 => {}
            1 => {
                let (name, constraint) = alternatives.into_iter().next().unwrap_or_default();
                depends_on.require(name, constraint);
            }
            _ => depends_on.require_any(alternatives),
        }
    }
}

/// `libc6:any (>= 2.34)` 한 항목을 (이름, 제약)으로 나눕니다.
fn parse_relation(relation: &str) -> Option<(String, String)> {
    let relation = relation.trim().replace('\n', " ");
    if relation.is_empty() {
        return None;
    }
    let (name_part, constraint) = match relation.find('(') {
        Some(open) => {
            let close = relation[open..].find(')').map(|c| open + c)?;
            let constraint = relation[open + 1..close].split_whitespace().collect::<Vec<_>>();
            (relation[..open].trim().to_owned(), constraint.join(" "))
        }
        None => (relation.clone(), String::new()),
    };
    // 아키텍처 제한 `[amd64]`, 한정자 `:any`
    let name = name_part
        .split(['[', '<'])
        .next()
        .unwrap_or_default()
        .trim();
    let name = name.split(':').next().unwrap_or_default().trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_owned(), constraint))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_STATUS: &str = "\
Package: adduser
Status: install ok installed
Priority: important
Architecture: all
Version: 3.118ubuntu5
Depends: passwd, debconf (>= 0.5) | debconf-2.0
Description: add and remove users and groups
 This package includes the 'adduser' and 'deluser' commands.

Package: apt
Status: install ok installed
Version: 2.4.9
Pre-Depends: libc6:any (>= 2.34)
Depends: adduser, gpgv | gpgv2 | gpgv1, libapt-pkg6.0 (>= 2.4.9)

Package: removed-thing
Status: deinstall ok config-files
Version: 1.0
";

    #[test]
    fn parse_installed_packages_only() {
        let out = DpkgStatusParser.parse(SAMPLE_STATUS, "/var/lib/dpkg/status").unwrap();
        let names: Vec<_> = out.libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["adduser", "apt"]);
        assert_eq!(out.find("adduser").unwrap().version, "3.118ubuntu5");
    }

    #[test]
    fn or_group_keeps_constraint_positions() {
        let out = DpkgStatusParser.parse(SAMPLE_STATUS, "status").unwrap();
        let deps = out.depends_on(out.find("adduser").unwrap()).unwrap();
        assert_eq!(deps.and["passwd"], "");
        assert_eq!(
            deps.or,
            vec![vec![
                ("debconf".to_owned(), ">= 0.5".to_owned()),
                ("debconf-2.0".to_owned(), String::new()),
            ]]
        );
    }

    #[test]
    fn pre_depends_and_arch_qualifiers() {
        let out = DpkgStatusParser.parse(SAMPLE_STATUS, "status").unwrap();
        let deps = out.depends_on(out.find("apt").unwrap()).unwrap();
        assert_eq!(deps.and["libc6"], ">= 2.34");
        assert_eq!(deps.and["libapt-pkg6.0"], ">= 2.4.9");
        assert_eq!(deps.or[0].len(), 3);
    }

    #[test]
    fn distroless_status_without_status_field() {
        let content = "Package: tzdata\nVersion: 2021a-1+deb11u8\nArchitecture: all\n";
        let out = DpkgStatusParser.parse(content, "/var/lib/dpkg/status.d/tzdata").unwrap();
        assert_eq!(out.libraries.len(), 1);
    }

    #[test]
    fn relation_parsing() {
        assert_eq!(
            parse_relation(" libc6:amd64 (>=  2.34) "),
            Some(("libc6".to_owned(), ">= 2.34".to_owned()))
        );
        assert_eq!(parse_relation("  "), None);
    }

    #[test]
    fn unrelated_content_is_an_error() {
        assert!(DpkgStatusParser.parse("Foo: bar\n", "status").is_err());
    }
}
