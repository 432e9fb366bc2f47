//! Java 분석기 (Gradle, Maven, 아카이브)

use std::collections::HashMap;

use crate::error::ScannerError;
use crate::package::Package;
use crate::parser::java::{GradleLockParser, PomParser, is_archive_name, parse_archive};
use crate::types::AnalyzerType;

use super::{
    Analyzer, FileInfo, MatchInfo, MatchStatus, NO_MATCH, PRIMARY, ParserAnalyzer, file_name,
    to_packages,
};

/// gradle.lockfile 분석기
pub fn gradle_analyzer() -> ParserAnalyzer<GradleLockParser> {
    ParserAnalyzer::new(
        AnalyzerType::JavaGradle,
        |path| file_name(path).ends_with("gradle.lockfile"),
        GradleLockParser,
    )
}

/// pom.xml 분석기
pub fn pom_analyzer() -> ParserAnalyzer<PomParser> {
    ParserAnalyzer::new(
        AnalyzerType::JavaPom,
        |path| file_name(path) == "pom.xml",
        PomParser,
    )
}

/// jar/war/ear/par 분석기
pub struct JarAnalyzer;

impl Analyzer for JarAnalyzer {
    fn analyzer_type(&self) -> AnalyzerType {
        AnalyzerType::JavaJar
    }

    fn matches(&self, info: &MatchInfo<'_>) -> MatchStatus {
        if is_archive_name(info.file_name()) {
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
        let output = parse_archive(&file.read()?, &file.path)?;
        Ok(to_packages(output, &file.path, AnalyzerType::JavaJar))
    }
}
