//! Python 분석기 (pip, Pipenv, Poetry, 설치된 패키지 메타데이터)

use std::collections::HashMap;

use crate::error::ScannerError;
use crate::package::Package;
use crate::parser::python::{
    PackageMetadataParser, PipfileLockParser, RequirementsParser, parse_egg, parse_poetry_lock,
    poetry_direct_dependencies,
};
use crate::types::AnalyzerType;

use super::{
    Analyzer, FileInfo, MatchInfo, MatchStatus, NO_MATCH, PRIMARY, ParserAnalyzer, SIBLING,
    file_name, parent_name, parse_file, to_packages,
};

/// requirements*.txt 분석기
pub fn pip_analyzer() -> ParserAnalyzer<RequirementsParser> {
    ParserAnalyzer::new(AnalyzerType::PythonPip, is_requirements, RequirementsParser)
}

/// Pipfile.lock 분석기
pub fn pipenv_analyzer() -> ParserAnalyzer<PipfileLockParser> {
    ParserAnalyzer::new(
        AnalyzerType::PythonPipenv,
        |path| file_name(path) == "Pipfile.lock",
        PipfileLockParser,
    )
}

fn is_requirements(path: &str) -> bool {
    let name = file_name(path);
    name.starts_with("requirements") && name.ends_with(".txt")
}

/// poetry.lock 분석기
///
/// 같은 디렉토리의 `pyproject.toml`(2)에서 직접 의존성을 읽어
/// 나머지 패키지를 간접 의존성으로 표시합니다.
pub struct PoetryAnalyzer;

impl Analyzer for PoetryAnalyzer {
    fn analyzer_type(&self) -> AnalyzerType {
        AnalyzerType::PythonPoetry
    }

    fn matches(&self, info: &MatchInfo<'_>) -> MatchStatus {
        match info.file_name() {
            "poetry.lock" => PRIMARY,
            "pyproject.toml" => SIBLING,
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
            .sibling(siblings, "pyproject.toml")
            .and_then(|f| f.read_to_string().ok())
            .and_then(|text| poetry_direct_dependencies(&text));

        let output = parse_poetry_lock(&content, direct.as_ref(), &file.path)?;
        Ok(to_packages(output, &file.path, AnalyzerType::PythonPoetry))
    }
}

/// 설치된 Python 패키지 분석기
///
/// `*.dist-info/METADATA`, `*.egg-info/PKG-INFO`, `EGG-INFO/PKG-INFO`,
/// 단일 파일 `*.egg-info`는 주 파일(1), `*.egg` zip은 2로 매칭됩니다.
pub struct PackagingAnalyzer;

impl Analyzer for PackagingAnalyzer {
    fn analyzer_type(&self) -> AnalyzerType {
        AnalyzerType::PythonPackaging
    }

    fn matches(&self, info: &MatchInfo<'_>) -> MatchStatus {
        let name = info.file_name();
        let parent = parent_name(info.path);
        match name {
            "METADATA" if parent.ends_with(".dist-info") => PRIMARY,
            "PKG-INFO" if parent.ends_with(".egg-info") || parent == "EGG-INFO" => PRIMARY,
            _ if name.ends_with(".egg-info") => PRIMARY,
            _ if name.ends_with(".egg") => SIBLING,
            _ => NO_MATCH,
        }
    }

    fn analyze(
        &self,
        file: &FileInfo,
        _siblings: &HashMap<String, FileInfo>,
    ) -> Result<Vec<Package>, ScannerError> {
        match file.match_status {
            PRIMARY => parse_file(&PackageMetadataParser, file, AnalyzerType::PythonPackaging),
            SIBLING => {
                let output = parse_egg(&file.read()?, &file.path)?;
                Ok(to_packages(output, &file.path, AnalyzerType::PythonPackaging))
            }
            _ => Ok(Vec::new()),
        }
    }
}
