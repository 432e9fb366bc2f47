//! SBOM 문서 생성
//!
//! 연결과 병합이 끝난 [`PackageGraph`]를 CycloneDX 또는 SPDX JSON으로 직렬화합니다.
//! 두 형식 모두 최상위 패키지부터 upstream 방향으로 그래프를 순회하며,
//! `(name, version)`이 같은 패키지는 한 번만 내보냅니다.

pub mod cyclonedx;
pub mod spdx;
pub mod util;

use tracing::debug;

use crate::error::ScannerError;
use crate::graph::PackageGraph;
use crate::types::{SbomDocument, SbomFormat};

/// SBOM 생성기
#[derive(Debug, Clone, Copy)]
pub struct SbomGenerator {
    format: SbomFormat,
}

impl SbomGenerator {
    /// 출력 형식으로 생성기를 만듭니다.
    pub fn new(format: SbomFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> SbomFormat {
        self.format
    }

    /// 그래프에서 SBOM 문서를 생성합니다.
    pub fn generate(&self, graph: &PackageGraph) -> Result<SbomDocument, ScannerError> {
        let doc = match self.format {
            SbomFormat::CycloneDx => cyclonedx::generate(graph)?,
            SbomFormat::Spdx => spdx::generate(graph)?,
        };
        debug!(format = %doc.format, components = doc.component_count, "sbom generated");
        Ok(doc)
    }
}

impl Default for SbomGenerator {
    fn default() -> Self {
        Self::new(SbomFormat::CycloneDx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Package;
    use crate::types::AnalyzerType;

    #[test]
    fn generator_dispatches_by_format() {
        let mut graph = PackageGraph::new();
        graph.add(Package::new("musl", "1.2.4-r2").with_source("/lib/apk/db/installed", AnalyzerType::Apk));

        let cdx = SbomGenerator::default().generate(&graph).unwrap();
        assert_eq!(cdx.format, SbomFormat::CycloneDx);
        assert!(cdx.content.contains("pkg:apk/musl@1.2.4-r2"));

        let spdx = SbomGenerator::new(SbomFormat::Spdx).generate(&graph).unwrap();
        assert_eq!(spdx.format, SbomFormat::Spdx);
        assert_eq!(spdx.component_count, 1);
    }
}
