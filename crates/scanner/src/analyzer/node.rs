//! Node.js 분석기 (npm, pnpm, yarn)

use std::collections::HashMap;

use crate::error::ScannerError;
use crate::package::Package;
use crate::parser::npm::{NpmLockParser, PackageJsonParser};
use crate::parser::pnpm::PnpmLockParser;
use crate::parser::yarn::YarnLockParser;
use crate::types::AnalyzerType;

use super::{
    Analyzer, FileInfo, MatchInfo, MatchStatus, NO_MATCH, PRIMARY, ParserAnalyzer, SIBLING,
    file_name, parse_file,
};

/// npm 분석기
///
/// `package.json`(1)은 설치된 패키지 하나, `package-lock.json`(2)은
/// 잠금 파일 전체를 패키지로 변환합니다. `node_modules` 아래의
/// `package.json`들과 잠금 파일 결과는 병합 단계에서 합쳐집니다.
pub struct NpmAnalyzer;

impl Analyzer for NpmAnalyzer {
    fn analyzer_type(&self) -> AnalyzerType {
        AnalyzerType::NodeNpm
    }

    fn matches(&self, info: &MatchInfo<'_>) -> MatchStatus {
        match info.file_name() {
            "package.json" => PRIMARY,
            "package-lock.json" => SIBLING,
            _ => NO_MATCH,
        }
    }

    fn analyze(
        &self,
        file: &FileInfo,
        _siblings: &HashMap<String, FileInfo>,
    ) -> Result<Vec<Package>, ScannerError> {
        match file.match_status {
            PRIMARY => parse_file(&PackageJsonParser, file, AnalyzerType::NodeNpm),
            SIBLING => parse_file(&NpmLockParser, file, AnalyzerType::NodeNpm),
            _ => Ok(Vec::new()),
        }
    }
}

/// pnpm-lock.yaml 분석기
pub fn pnpm_analyzer() -> ParserAnalyzer<PnpmLockParser> {
    ParserAnalyzer::new(
        AnalyzerType::NodePnpm,
        |path| file_name(path) == "pnpm-lock.yaml",
        PnpmLockParser,
    )
}

/// yarn.lock 분석기
pub fn yarn_analyzer() -> ParserAnalyzer<YarnLockParser> {
    ParserAnalyzer::new(
        AnalyzerType::NodeYarn,
        |path| file_name(path) == "yarn.lock",
        YarnLockParser,
    )
}
