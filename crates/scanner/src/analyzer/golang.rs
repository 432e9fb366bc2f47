//! Go 분석기 (go.mod, Go 실행 파일)

use std::collections::HashMap;

use crate::error::ScannerError;
use crate::package::Package;
use crate::parser::golang::{GoSum, has_build_info, parse_build_info, parse_go_mod};
use crate::types::AnalyzerType;

use super::{
    Analyzer, FileInfo, MatchInfo, MatchStatus, NO_MATCH, PRIMARY, SIBLING, to_packages,
};

/// go.mod 분석기
///
/// `go.mod`는 주 파일(1), `go.sum`은 형제 파일(2)로 매칭됩니다.
/// 같은 디렉토리의 `go.sum`이 있으면 해시와 간접 모듈을 보강합니다.
pub struct GoModAnalyzer;

impl Analyzer for GoModAnalyzer {
    fn analyzer_type(&self) -> AnalyzerType {
        AnalyzerType::GoMod
    }

    fn matches(&self, info: &MatchInfo<'_>) -> MatchStatus {
        match info.file_name() {
            "go.mod" => PRIMARY,
            "go.sum" => SIBLING,
            _ => NO_MATCH,
        }
    }

    fn analyze(
        &self,
        file: &FileInfo,
        siblings: &HashMap<String, FileInfo>,
    ) -> Result<Vec<Package>, ScannerError> {
        if file.match_status != PRIMARY {
            return Ok(Vec::new());
        }

        let content = file.read_to_string()?;
        let sum = match file.sibling(siblings, "go.sum") {
            Some(sum_file) => match sum_file.read_to_string() {
                Ok(text) => Some(GoSum::parse(&text)),
                Err(e) => {
                    tracing::debug!(path = %sum_file.path, error = %e, "go.sum unreadable, ignoring");
                    None
                }
            },
            None => None,
        };

        let output = parse_go_mod(&content, sum.as_ref(), &file.path)?;
        Ok(to_packages(output, &file.path, AnalyzerType::GoMod))
    }

    fn strict_errors(&self) -> bool {
        true
    }
}

const ELF_MAGIC: &[u8] = b"\x7fELF";
const PE_MAGIC: &[u8] = b"MZ";
const MACHO_MAGICS: [[u8; 4]; 4] = [
    [0xfe, 0xed, 0xfa, 0xce],
    [0xfe, 0xed, 0xfa, 0xcf],
    [0xce, 0xfa, 0xed, 0xfe],
    [0xcf, 0xfa, 0xed, 0xfe],
];

/// Go 실행 파일 분석기
///
/// 실행 권한이 있고 ELF/PE/Mach-O 헤더를 가진 파일만 매칭합니다.
/// 빌드 정보가 없는 실행 파일은 빈 결과를 돌려줍니다.
pub struct GoBinaryAnalyzer;

impl Analyzer for GoBinaryAnalyzer {
    fn analyzer_type(&self) -> AnalyzerType {
        AnalyzerType::GoBinary
    }

    fn matches(&self, info: &MatchInfo<'_>) -> MatchStatus {
        if !info.meta.executable {
            return NO_MATCH;
        }
        if is_executable_header(info.header()) {
            PRIMARY
        } else {
            NO_MATCH
        }
    }

    fn analyze(
        &self,
        file: &FileInfo,
        _siblings: &HashMap<String, FileInfo>,
    ) -> Result<Vec<Package>, ScannerError> {
        let data = file.read()?;
        if !has_build_info(&data) {
            return Ok(Vec::new());
        }
        let output = parse_build_info(&data, &file.path)?;
        Ok(to_packages(output, &file.path, AnalyzerType::GoBinary))
    }
}

fn is_executable_header(header: &[u8]) -> bool {
    header.starts_with(ELF_MAGIC)
        || header.starts_with(PE_MAGIC)
        || MACHO_MAGICS.iter().any(|m| header.starts_with(m))
}
