#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use depscan_scanner::{AnalyzerType, Package, PackageGraph, SbomFormat, SbomGenerator};

/// 퍼저용 구조적 그래프 입력
#[derive(Arbitrary, Debug)]
struct FuzzGraph {
    packages: Vec<FuzzPackage>,
    /// (의존하는 쪽, 의존 대상) 인덱스 쌍
    edges: Vec<(u8, u8)>,
}

#[derive(Arbitrary, Debug)]
struct FuzzPackage {
    name: String,
    version: String,
    verification: Option<String>,
    license: Option<String>,
    os_package: bool,
}

fuzz_target!(|input: FuzzGraph| {
    let mut graph = PackageGraph::new();
    let ids: Vec<_> = input
        .packages
        .iter()
        .take(100)
        .map(|p| {
            let kind = if p.os_package {
                AnalyzerType::Dpkg
            } else {
                AnalyzerType::RustCargo
            };
            let mut pkg = Package::new(p.name.clone(), p.version.clone())
                .with_source("/fuzz", kind);
            pkg.verification = p.verification.clone();
            pkg.license.extend(p.license.clone());
            graph.add(pkg)
        })
        .collect();

    if !ids.is_empty() {
        for (from, to) in input.edges.iter().take(400) {
            let from = ids[*from as usize % ids.len()];
            let to = ids[*to as usize % ids.len()];
            graph.link(from, to);
        }
    }

    for format in [SbomFormat::CycloneDx, SbomFormat::Spdx] {
        if let Ok(doc) = SbomGenerator::new(format).generate(&graph) {
            let _: serde_json::Value =
                serde_json::from_str(&doc.content).expect("SBOM output must be valid JSON");
        }
    }
});
