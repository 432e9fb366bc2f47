//! 그래프 구성 벤치마크
//!
//! dpkg status 파싱, 간선 연결, 병합, SBOM 생성 성능을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use depscan_scanner::analyzer::to_packages;
use depscan_scanner::parser::ManifestParser;
use depscan_scanner::parser::dpkg::DpkgStatusParser;
use depscan_scanner::sbom::cyclonedx;
use depscan_scanner::{AnalyzerType, PackageGraph, link_packages, merge_packages};

/// `n`개 패키지의 합성 dpkg status (각 패키지는 앞의 두 패키지에 의존)
fn synthetic_status(n: usize) -> String {
    let mut out = String::new();
    for i in 0..n {
        out.push_str(&format!(
            "Package: pkg{i}\nStatus: install ok installed\nVersion: 1.{i}.0\n"
        ));
        if i >= 2 {
            out.push_str(&format!(
                "Depends: pkg{} (>= 1.0), pkg{} | alt{i}\n",
                i - 1,
                i - 2
            ));
        }
        out.push('\n');
    }
    out
}

fn build_graph(status: &str, copies: usize) -> PackageGraph {
    let mut packages = Vec::new();
    for layer in 0..copies {
        let out = DpkgStatusParser
            .parse(status, "/var/lib/dpkg/status")
            .expect("synthetic status parses");
        packages.extend(to_packages(
            out,
            &format!("/layer{layer}/var/lib/dpkg/status"),
            AnalyzerType::Dpkg,
        ));
    }
    PackageGraph::from_packages(packages)
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("dpkg_parse");
    for n in [100, 1000] {
        let status = synthetic_status(n);
        group.throughput(Throughput::Bytes(status.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &status, |b, status| {
            b.iter(|| DpkgStatusParser.parse(black_box(status), "/var/lib/dpkg/status"))
        });
    }
    group.finish();
}

fn bench_link_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("link_merge");
    for n in [100, 1000] {
        let status = synthetic_status(n);
        // 같은 DB가 세 레이어에서 발견된 경우
        let graph = build_graph(&status, 3);
        group.throughput(Throughput::Elements(graph.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &graph, |b, graph| {
            b.iter(|| {
                let mut graph = graph.clone();
                link_packages(&mut graph);
                merge_packages(&mut graph);
                black_box(graph.len())
            })
        });
    }
    group.finish();
}

fn bench_sbom(c: &mut Criterion) {
    let mut graph = build_graph(&synthetic_status(1000), 1);
    link_packages(&mut graph);
    merge_packages(&mut graph);

    c.bench_function("cyclonedx_1000", |b| {
        b.iter(|| cyclonedx::generate(black_box(&graph)))
    });
}

criterion_group!(benches, bench_parse, bench_link_merge, bench_sbom);
criterion_main!(benches);
