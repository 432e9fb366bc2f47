//! RPM 컨테이너 매니페스트 파서
//!
//! RPM DB(BerkeleyDB/SQLite)를 직접 읽지 않고, 이미지 빌드 시 생성되는
//! 탭 구분 매니페스트(`var/lib/rpmmanifest/container-manifest-2`)를 읽습니다.
//!
//! ```text
//! name <TAB> version-release <TAB> installtime <TAB> buildtime <TAB> vendor <TAB> epoch <TAB> size <TAB> arch <TAB> ...
//! ```
//!
//! 버전은 `version-release`에서 마지막 `-` 앞부분만 사용합니다.

use crate::error::ScannerError;
use crate::package::DependsOn;
use crate::parser::{Library, ManifestParser, ParseOutput};

/// RPM 매니페스트 파서
pub struct RpmManifestParser;

impl ManifestParser for RpmManifestParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        let mut out = ParseOutput::default();

        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let columns: Vec<&str> = line.split('\t').collect();
            if columns.len() < 2 {
                return Err(ScannerError::parse(
                    source_path,
                    format!("line {}: expected tab-separated columns", line_no + 1),
                ));
            }
            let name = columns[0].trim();
            let version = split_release(columns[1].trim());
            if name.is_empty() || version.is_empty() {
                continue;
            }
            out.push(Library::new(name, version), DependsOn::default());
        }
        Ok(out)
    }
}

/// `2.0-12.cm2` -> `2.0`
fn split_release(version_release: &str) -> &str {
    match version_release.rsplit_once('-') {
        Some((version, _)) if !version.is_empty() => version,
        _ => version_release,
    }
}
