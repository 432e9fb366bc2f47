//! 사용자 정의 분석기
//!
//! 호출자가 클로저로 매칭/분석 로직을 제공합니다.
//!
//! ```ignore
//! let analyzer = CustomAnalyzer::new(
//!     |info| if info.path.ends_with(".deps") { 1 } else { 0 },
//!     |file, _siblings| vec![CustomPackage::new("internal-lib", "1.0.0")],
//! );
//! register_analyzer(Arc::new(analyzer));
//! ```

use std::collections::HashMap;

use crate::error::ScannerError;
use crate::package::Package;
use crate::types::AnalyzerType;

use super::{Analyzer, FileInfo, MatchInfo, MatchStatus};

/// 사용자 정의 분석기가 돌려주는 최소 패키지 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomPackage {
    pub name: String,
    pub version: String,
}

impl CustomPackage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

type MatchFn = dyn Fn(&MatchInfo<'_>) -> MatchStatus + Send + Sync;
type AnalyzeFn = dyn Fn(&FileInfo, &HashMap<String, FileInfo>) -> Vec<CustomPackage> + Send + Sync;

/// 클로저 기반 분석기 (태그 `custom`, 모든 스캔 모드)
pub struct CustomAnalyzer {
    match_fn: Box<MatchFn>,
    analyze_fn: Box<AnalyzeFn>,
}

impl CustomAnalyzer {
    pub fn new<M, A>(match_fn: M, analyze_fn: A) -> Self
    where
        M: Fn(&MatchInfo<'_>) -> MatchStatus + Send + Sync + 'static,
        A: Fn(&FileInfo, &HashMap<String, FileInfo>) -> Vec<CustomPackage> + Send + Sync + 'static,
    {
        Self {
            match_fn: Box::new(match_fn),
            analyze_fn: Box::new(analyze_fn),
        }
    }
}

impl Analyzer for CustomAnalyzer {
    fn analyzer_type(&self) -> AnalyzerType {
        AnalyzerType::Custom
    }

    fn matches(&self, info: &MatchInfo<'_>) -> MatchStatus {
        (self.match_fn)(info)
    }

    fn analyze(
        &self,
        file: &FileInfo,
        siblings: &HashMap<String, FileInfo>,
    ) -> Result<Vec<Package>, ScannerError> {
        Ok((self.analyze_fn)(file, siblings)
            .into_iter()
            .map(|p| Package::new(p.name, p.version).with_source(&file.path, AnalyzerType::Custom))
            .collect())
    }
}
