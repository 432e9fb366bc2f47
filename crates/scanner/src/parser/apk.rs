//! Alpine APK 설치 DB 파서
//!
//! `lib/apk/db/installed`는 빈 줄로 구분된 블록이며, 각 줄은 `X:값` 형식입니다.
//!
//! ```text
//! P:zlib
//! V:1.2.13-r1
//! L:Zlib
//! C:Q1JlboSJkrN4qkDcokr4zenpcWEXQ=
//! D:so:libc.musl-x86_64.so.1
//! p:so:libz.so.1=1.2.13
//! ```
//!
//! `D:` 의존성 중 `so:`, `cmd:` 같은 가상 이름은 같은 DB의 `p:`(provides)로
//! 실제 패키지 이름을 찾아 치환합니다. 제공자가 없으면 그대로 남습니다.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::ScannerError;
use crate::package::DependsOn;
use crate::parser::{Library, ManifestParser, ParseOutput};

/// APK installed DB 파서
pub struct ApkDbParser;

#[derive(Default)]
struct Record {
    name: String,
    version: String,
    license: Option<String>,
    checksum: Option<String>,
    depends: Vec<String>,
    provides: Vec<String>,
}

impl ManifestParser for ApkDbParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        let records = read_records(content);
        if records.is_empty() && !content.trim().is_empty() {
            return Err(ScannerError::parse(source_path, "no package records found"));
        }

        // provides 이름 -> 제공 패키지 이름
        let mut providers: HashMap<&str, &str> = HashMap::new();
        for record in &records {
            for provide in &record.provides {
                let (virtual_name, _) = split_constraint(provide);
                providers.entry(virtual_name).or_insert(record.name.as_str());
            }
        }

        let mut out = ParseOutput::default();
        for record in &records {
            let mut library = Library::new(&record.name, &record.version);
            if let Some(license) = &record.license {
                library.license = license.split_whitespace().map(str::to_owned).collect();
            }
            library.verification = record.checksum.as_deref().and_then(decode_checksum);

            let mut depends_on = DependsOn::default();
            for dep in &record.depends {
                if dep.starts_with('!') {
                    continue;
                }
                let (dep_name, constraint) = split_constraint(dep);
                let resolved = providers.get(dep_name).copied().unwrap_or(dep_name);
                if resolved == record.name {
                    continue;
                }
                depends_on.require(resolved, constraint);
            }
            out.push(library, depends_on);
        }
        Ok(out)
    }
}

fn read_records(content: &str) -> Vec<Record> {
    let mut records = Vec::new();
    let mut current = Record::default();

    for line in content.lines().chain(std::iter::once("")) {
        let line = line.trim_end();
        if line.is_empty() {
            if !current.name.is_empty() && !current.version.is_empty() {
                records.push(std::mem::take(&mut current));
            } else {
                current = Record::default();
            }
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key {
            "P" => current.name = value.to_owned(),
            "V" => current.version = value.to_owned(),
            "L" => current.license = Some(value.to_owned()),
            "C" => current.checksum = Some(value.to_owned()),
            "D" => current
                .depends
                .extend(value.split_whitespace().map(str::to_owned)),
            "p" => current
                .provides
                .extend(value.split_whitespace().map(str::to_owned)),
            _ => {}
        }
    }
    records
}

/// `name>=1.0`, `name=1.0`, `name~1.0`을 (이름, 제약)으로 나눕니다.
fn split_constraint(token: &str) -> (&str, &str) {
    match token.find(['<', '>', '=', '~']) {
        Some(pos) => (&token[..pos], &token[pos..]),
        None => (token, ""),
    }
}

/// `Q1<base64 SHA-1>` 체크섬을 `sha1:<hex>`로 변환합니다.
fn decode_checksum(checksum: &str) -> Option<String> {
    let encoded = checksum.strip_prefix("Q1")?;
    let bytes = STANDARD.decode(encoded).ok()?;
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    Some(format!("sha1:{hex}"))
}
