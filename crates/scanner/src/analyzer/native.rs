//! 네이티브 생태계 분석기 (Rust Cargo, C/C++ Conan)

use crate::parser::cargo::CargoLockParser;
use crate::parser::conan::ConanLockParser;
use crate::types::AnalyzerType;

use super::{ParserAnalyzer, file_name};

/// Cargo.lock 분석기
pub fn cargo_analyzer() -> ParserAnalyzer<CargoLockParser> {
    ParserAnalyzer::new(
        AnalyzerType::RustCargo,
        |path| file_name(path) == "Cargo.lock",
        CargoLockParser,
    )
}

/// conan.lock 분석기
pub fn conan_analyzer() -> ParserAnalyzer<ConanLockParser> {
    ParserAnalyzer::new(
        AnalyzerType::Conan,
        |path| file_name(path) == "conan.lock",
        ConanLockParser,
    )
}
