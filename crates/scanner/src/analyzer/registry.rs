//! 분석기 레지스트리
//!
//! 프로세스 전역 레지스트리는 처음 접근할 때 내장 분석기 20종으로 채워지고,
//! 이후에는 [`register_analyzer`]로 추가만 가능합니다.
//!
//! # 필터 규칙
//!
//! - `mode`에 `PKG`가 있으면 OS 패키지 분석기, `LANGUAGE`가 있으면 언어 분석기를 포함
//! - `used`에 있는 분석기는 항상 포함
//! - `mode`에 `PKG`/`LANGUAGE`가 없고 `used`가 비어 있으면 전부 포함
//! - 마지막으로 `disabled`에 있는 분석기를 제외

use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use tracing::warn;

use crate::types::{AnalyzerType, ScanMode};

use super::golang::{GoBinaryAnalyzer, GoModAnalyzer};
use super::java::{JarAnalyzer, gradle_analyzer, pom_analyzer};
use super::native::{cargo_analyzer, conan_analyzer};
use super::node::{NpmAnalyzer, pnpm_analyzer, yarn_analyzer};
use super::os::{apk_analyzer, dpkg_analyzer, rpm_analyzer};
use super::php::ComposerAnalyzer;
use super::python::{PackagingAnalyzer, PoetryAnalyzer, pip_analyzer, pipenv_analyzer};
use super::ruby::{bundler_analyzer, gemspec_analyzer};
use super::Analyzer;

/// 등록 순서를 유지하는 분석기 목록
#[derive(Clone, Default)]
pub struct AnalyzerRegistry {
    analyzers: Vec<Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 내장 분석기가 모두 등록된 레지스트리를 생성합니다.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in AnalyzerType::BUILTIN {
            if let Some(analyzer) = builtin_analyzer(kind) {
                registry.register(analyzer);
            }
        }
        registry
    }

    /// 분석기를 추가합니다.
    ///
    /// `custom`이 아닌 태그가 이미 있으면 무시하고 `false`를 반환합니다.
    pub fn register(&mut self, analyzer: Arc<dyn Analyzer>) -> bool {
        let kind = analyzer.analyzer_type();
        if kind != AnalyzerType::Custom && self.get(kind).is_some() {
            warn!(analyzer = %kind, "analyzer already registered, ignoring");
            return false;
        }
        self.analyzers.push(analyzer);
        true
    }

    /// 태그로 (첫 번째) 분석기를 찾습니다.
    pub fn get(&self, kind: AnalyzerType) -> Option<Arc<dyn Analyzer>> {
        self.analyzers
            .iter()
            .find(|a| a.analyzer_type() == kind)
            .cloned()
    }

    /// 등록된 분석기 태그 목록 (등록 순서)
    pub fn types(&self) -> Vec<AnalyzerType> {
        self.analyzers.iter().map(|a| a.analyzer_type()).collect()
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }

    /// 스캔 모드와 허용/제외 목록으로 분석기를 고릅니다.
    pub fn filter(
        &self,
        mode: ScanMode,
        used: &[AnalyzerType],
        disabled: &[AnalyzerType],
    ) -> Vec<Arc<dyn Analyzer>> {
        let want_pkg = mode.contains(ScanMode::PKG);
        let want_language = mode.contains(ScanMode::LANGUAGE);
        let include_all = !want_pkg && !want_language && used.is_empty();

        self.analyzers
            .iter()
            .filter(|a| {
                let kind = a.analyzer_type();
                let analyzer_mode = a.scan_mode();
                include_all
                    || used.contains(&kind)
                    || (want_pkg && analyzer_mode.contains(ScanMode::PKG))
                    || (want_language && analyzer_mode.contains(ScanMode::LANGUAGE))
            })
            .filter(|a| !disabled.contains(&a.analyzer_type()))
            .cloned()
            .collect()
    }
}

/// 내장 분석기 인스턴스를 생성합니다. `custom`은 `None`입니다.
pub fn builtin_analyzer(kind: AnalyzerType) -> Option<Arc<dyn Analyzer>> {
    let analyzer: Arc<dyn Analyzer> = match kind {
        AnalyzerType::Rpm => Arc::new(rpm_analyzer()),
        AnalyzerType::Dpkg => Arc::new(dpkg_analyzer()),
        AnalyzerType::Apk => Arc::new(apk_analyzer()),
        AnalyzerType::Conan => Arc::new(conan_analyzer()),
        AnalyzerType::GoBinary => Arc::new(GoBinaryAnalyzer),
        AnalyzerType::GoMod => Arc::new(GoModAnalyzer),
        AnalyzerType::PhpComposer => Arc::new(ComposerAnalyzer),
        AnalyzerType::JavaGradle => Arc::new(gradle_analyzer()),
        AnalyzerType::JavaPom => Arc::new(pom_analyzer()),
        AnalyzerType::JavaJar => Arc::new(JarAnalyzer),
        AnalyzerType::PythonPip => Arc::new(pip_analyzer()),
        AnalyzerType::PythonPackaging => Arc::new(PackagingAnalyzer),
        AnalyzerType::PythonPipenv => Arc::new(pipenv_analyzer()),
        AnalyzerType::PythonPoetry => Arc::new(PoetryAnalyzer),
        AnalyzerType::NodeNpm => Arc::new(NpmAnalyzer),
        AnalyzerType::NodePnpm => Arc::new(pnpm_analyzer()),
        AnalyzerType::NodeYarn => Arc::new(yarn_analyzer()),
        AnalyzerType::RubyBundler => Arc::new(bundler_analyzer()),
        AnalyzerType::RubyGemspec => Arc::new(gemspec_analyzer()),
        AnalyzerType::RustCargo => Arc::new(cargo_analyzer()),
        AnalyzerType::Custom => return None,
    };
    Some(analyzer)
}

static GLOBAL_REGISTRY: LazyLock<RwLock<AnalyzerRegistry>> =
    LazyLock::new(|| RwLock::new(AnalyzerRegistry::builtin()));

/// 전역 레지스트리에 분석기를 추가합니다.
pub fn register_analyzer(analyzer: Arc<dyn Analyzer>) -> bool {
    GLOBAL_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(analyzer)
}

/// 전역 레지스트리에서 분석기를 고릅니다.
pub fn filter_analyzers(
    mode: ScanMode,
    used: &[AnalyzerType],
    disabled: &[AnalyzerType],
) -> Vec<Arc<dyn Analyzer>> {
    GLOBAL_REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .filter(mode, used, disabled)
}

/// 전역 레지스트리의 스냅샷을 반환합니다.
pub fn global_registry() -> AnalyzerRegistry {
    GLOBAL_REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}
