//! Integration tests for the scanner
//!
//! Builds small project trees and image archives on disk and runs them through
//! the full pipeline: walk -> analyze -> link -> merge -> SBOM.

use std::io::Write;
use std::path::Path;

use depscan_scanner::{
    AnalyzerType, SbomFormat, ScanMode, ScannerBuilder, ScannerConfig, ScannerError, SourceKind,
};

const DPKG_STATUS: &str = "\
Package: libc6
Status: install ok installed
Version: 2.36-9+deb12u4
Depends: libgcc-s1

Package: libgcc-s1
Status: install ok installed
Version: 12.2.0-14

Package: apt
Status: install ok installed
Version: 2.6.1
Depends: libc6 (>= 2.34), gpgv | gpgv2
";

const PACKAGE_JSON: &str = r#"{
  "name": "web",
  "version": "1.0.0",
  "dependencies": { "express": "^4.18.2" }
}"#;

const PACKAGE_LOCK: &str = r#"{
  "name": "web",
  "version": "1.0.0",
  "lockfileVersion": 3,
  "packages": {
    "": {
      "name": "web",
      "version": "1.0.0",
      "dependencies": { "express": "^4.18.2" }
    },
    "node_modules/express": {
      "version": "4.18.2",
      "integrity": "sha512-abc"
    }
  }
}"#;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

fn image_archive(layers: &[(&str, Vec<u8>)]) -> tempfile::NamedTempFile {
    let names: Vec<&str> = layers.iter().map(|(n, _)| *n).collect();
    let manifest = serde_json::json!([{ "Config": "config.json", "RepoTags": ["test:latest"], "Layers": names }]);
    let manifest = manifest.to_string();

    let mut files: Vec<(&str, &[u8])> = vec![("manifest.json", manifest.as_bytes())];
    for (name, data) in layers {
        files.push((name, data.as_slice()));
    }
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&tar_bytes(&files)).unwrap();
    file
}

fn scanner(config: ScannerConfig) -> depscan_scanner::Scanner {
    ScannerBuilder::new().config(config).build().unwrap()
}

#[tokio::test]
async fn test_filesystem_scan_links_os_packages() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "var/lib/dpkg/status", DPKG_STATUS);

    let report = scanner(ScannerConfig::default())
        .scan_filesystem(dir.path())
        .await
        .unwrap();

    assert_eq!(report.source, SourceKind::Filesystem);
    assert!(report.errors.is_empty());
    assert!(report.graph.is_mirrored());

    let graph = &report.graph;
    let apt = graph.find_by_name("apt")[0];
    let libc = graph.find_by_name("libc6")[0];
    let libgcc = graph.find_by_name("libgcc-s1")[0];
    assert!(graph.upstream(apt).any(|id| id == libc));
    assert!(graph.upstream(libc).any(|id| id == libgcc));

    // gpgv | gpgv2 is installed as neither, so one compound placeholder remains
    let placeholder = graph
        .packages()
        .find(|p| p.is_or_placeholder())
        .expect("or placeholder");
    assert_eq!(placeholder.name, "gpgv|gpgv2");
    assert!(placeholder.potential);
}

#[tokio::test]
async fn test_npm_manifest_and_lock_merge() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "app/package.json", PACKAGE_JSON);
    write(dir.path(), "app/package-lock.json", PACKAGE_LOCK);

    let report = scanner(ScannerConfig::default())
        .scan_filesystem(dir.path())
        .await
        .unwrap();

    let graph = &report.graph;
    assert_eq!(graph.find_by_name("web").len(), 1);
    assert_eq!(graph.find_by_name("express").len(), 1);

    let web = graph.get(graph.find_by_name("web")[0]).unwrap();
    assert!(web.from_file.contains(&"/app/package.json".to_owned()));
    assert!(web.from_file.contains(&"/app/package-lock.json".to_owned()));

    let express = graph.get(graph.find_by_name("express")[0]).unwrap();
    assert_eq!(express.version, "4.18.2");
    assert!(!express.potential);
    assert!(graph.is_mirrored());
}

#[tokio::test]
async fn test_scan_mode_limits_analyzers() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "var/lib/dpkg/status", DPKG_STATUS);
    write(dir.path(), "app/package.json", PACKAGE_JSON);

    let pkg_only = ScannerConfig {
        scan_mode: ScanMode::PKG,
        ..Default::default()
    };
    let report = scanner(pkg_only).scan_filesystem(dir.path()).await.unwrap();
    assert!(report.graph.find_by_name("web").is_empty());
    assert!(
        report
            .packages()
            .filter(|p| !p.potential)
            .all(|p| p.from_analyzer == vec![AnalyzerType::Dpkg])
    );

    let npm_only = ScannerConfig {
        scan_mode: ScanMode::LANGUAGE,
        disabled_analyzers: vec![AnalyzerType::NodeYarn],
        ..Default::default()
    };
    let report = scanner(npm_only).scan_filesystem(dir.path()).await.unwrap();
    assert!(report.graph.find_by_name("libc6").is_empty());
    assert_eq!(report.graph.find_by_name("web").len(), 1);
}

#[tokio::test]
async fn test_parse_failure_is_recorded_or_fatal_in_strict_mode() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "svc/go.mod", "go 1.21\n");
    write(dir.path(), "var/lib/dpkg/status", DPKG_STATUS);

    let report = scanner(ScannerConfig::default())
        .scan_filesystem(dir.path())
        .await
        .unwrap();
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].path, "/svc/go.mod");
    assert_eq!(report.errors[0].analyzer, AnalyzerType::GoMod);
    assert!(!report.graph.find_by_name("libc6").is_empty());

    let strict = ScannerConfig {
        strict: true,
        ..Default::default()
    };
    let err = scanner(strict).scan_filesystem(dir.path()).await.unwrap_err();
    assert!(matches!(err, ScannerError::Parse { .. }));
}

#[tokio::test]
async fn test_oversized_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "var/lib/dpkg/status", DPKG_STATUS);

    let config = ScannerConfig {
        max_file_size: 16,
        ..Default::default()
    };
    let report = scanner(config).scan_filesystem(dir.path()).await.unwrap();
    assert_eq!(report.package_count(), 0);
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn test_image_layers_merge_duplicate_packages() {
    let layer1 = tar_bytes(&[("var/lib/dpkg/status", DPKG_STATUS.as_bytes())]);
    let layer2 = tar_bytes(&[
        ("var/lib/dpkg/status", DPKG_STATUS.as_bytes()),
        ("srv/.wh.package.json", PACKAGE_JSON.as_bytes()),
    ]);
    let archive = image_archive(&[("l1/layer.tar", layer1), ("l2/layer.tar", layer2)]);

    let report = scanner(ScannerConfig::default())
        .scan_image_file(archive.path())
        .await
        .unwrap();

    assert_eq!(report.source, SourceKind::Image);
    assert_eq!(report.graph.find_by_name("libc6").len(), 1);
    assert_eq!(report.graph.find_by_name("apt").len(), 1);
    assert!(report.graph.find_by_name("web").is_empty());
    assert!(report.merge.merged >= 3);
    assert!(report.graph.is_mirrored());
}

#[tokio::test]
async fn test_sbom_documents_from_scan() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "var/lib/dpkg/status", DPKG_STATUS);

    let cdx = scanner(ScannerConfig::default());
    let report = cdx.scan_filesystem(dir.path()).await.unwrap();
    let doc = cdx.generate_sbom(&report).unwrap();
    let v: serde_json::Value = serde_json::from_str(&doc.content).unwrap();
    assert_eq!(v["bomFormat"], "CycloneDX");
    assert_eq!(doc.component_count, report.package_count());
    assert!(
        v["dependencies"]
            .as_array()
            .unwrap()
            .iter()
            .any(|d| d["ref"] == "pkg:deb/apt@2.6.1")
    );

    let spdx = scanner(ScannerConfig {
        sbom_format: SbomFormat::Spdx,
        ..Default::default()
    });
    let doc = spdx.generate_sbom(&report).unwrap();
    let v: serde_json::Value = serde_json::from_str(&doc.content).unwrap();
    assert_eq!(v["spdxVersion"], "SPDX-2.3");
    assert!(
        v["relationships"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r["relationshipType"] == "DEPENDS_ON")
    );
}
