//! Ruby 분석기 (Bundler, gemspec)

use crate::parser::ruby::{GemfileLockParser, GemspecParser};
use crate::types::AnalyzerType;

use super::{ParserAnalyzer, file_name};

/// Gemfile.lock 분석기
pub fn bundler_analyzer() -> ParserAnalyzer<GemfileLockParser> {
    ParserAnalyzer::new(
        AnalyzerType::RubyBundler,
        |path| file_name(path) == "Gemfile.lock",
        GemfileLockParser,
    )
}

/// 설치된 gem의 `*.gemspec` 분석기
pub fn gemspec_analyzer() -> ParserAnalyzer<GemspecParser> {
    ParserAnalyzer::new(
        AnalyzerType::RubyGemspec,
        |path| file_name(path).ends_with(".gemspec"),
        GemspecParser,
    )
}
