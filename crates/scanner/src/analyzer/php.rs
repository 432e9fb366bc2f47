//! PHP Composer 분석기

use std::collections::HashMap;

use crate::error::ScannerError;
use crate::package::Package;
use crate::parser::composer::{direct_requirements, parse_composer_lock};
use crate::types::AnalyzerType;

use super::{
    Analyzer, FileInfo, MatchInfo, MatchStatus, NO_MATCH, PRIMARY, SIBLING, to_packages,
};

/// composer.lock 분석기
///
/// 같은 디렉토리의 `composer.json`(2)이 있으면 `require`/`require-dev`에
/// 없는 패키지를 간접 의존성으로 표시합니다. 깨진 `composer.json`은 무시합니다.
pub struct ComposerAnalyzer;

impl Analyzer for ComposerAnalyzer {
    fn analyzer_type(&self) -> AnalyzerType {
        AnalyzerType::PhpComposer
    }

    fn matches(&self, info: &MatchInfo<'_>) -> MatchStatus {
        match info.file_name() {
            "composer.lock" => PRIMARY,
            "composer.json" => SIBLING,
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
        let direct = file
            .sibling(siblings, "composer.json")
            .and_then(|f| f.read_to_string().ok())
            .and_then(|text| direct_requirements(&text));

        let output = parse_composer_lock(&content, direct.as_ref(), &file.path)?;
        Ok(to_packages(output, &file.path, AnalyzerType::PhpComposer))
    }
}
