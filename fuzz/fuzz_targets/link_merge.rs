//! dpkg 상태 파일 두 개를 같은 그래프에 넣고 연결, 병합 후 간선 대칭성을 확인합니다.

#![no_main]

use depscan_scanner::analyzer::to_packages;
use depscan_scanner::parser::ManifestParser;
use depscan_scanner::parser::dpkg::DpkgStatusParser;
use depscan_scanner::{AnalyzerType, PackageGraph, link_packages, merge_packages};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(content) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(output) = DpkgStatusParser.parse(content, "/var/lib/dpkg/status") else {
        return;
    };

    let mut packages = to_packages(output.clone(), "/var/lib/dpkg/status", AnalyzerType::Dpkg);
    packages.extend(to_packages(output, "/layer/var/lib/dpkg/status", AnalyzerType::Dpkg));

    let mut graph = PackageGraph::from_packages(packages);
    link_packages(&mut graph);
    merge_packages(&mut graph);
    assert!(graph.is_mirrored());
});
