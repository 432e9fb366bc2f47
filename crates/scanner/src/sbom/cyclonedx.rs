//! CycloneDX 1.5 JSON SBOM 생성
//!
//! [CycloneDX](https://cyclonedx.org/) 1.5 사양에 따른 JSON SBOM 문서를 생성합니다.
//! 컴포넌트 목록과 함께 `dependencies` 섹션에 upstream 간선을 기록합니다.

use serde::Serialize;

use super::util;
use crate::error::ScannerError;
use crate::graph::PackageGraph;
use crate::types::{SbomDocument, SbomFormat};

/// CycloneDX 1.5 BOM 루트 구조
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CycloneDxBom {
    bom_format: String,
    spec_version: String,
    version: u32,
    metadata: CycloneDxMetadata,
    components: Vec<CycloneDxComponent>,
    dependencies: Vec<CycloneDxDependency>,
}

#[derive(Serialize)]
struct CycloneDxMetadata {
    timestamp: String,
    tools: Vec<CycloneDxTool>,
}

#[derive(Serialize)]
struct CycloneDxTool {
    name: String,
    version: String,
}

/// CycloneDX 컴포넌트
#[derive(Serialize)]
struct CycloneDxComponent {
    #[serde(rename = "type")]
    component_type: String,
    #[serde(rename = "bom-ref")]
    bom_ref: String,
    name: String,
    version: String,
    purl: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    hashes: Vec<CycloneDxHash>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    licenses: Vec<CycloneDxLicenseChoice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<CycloneDxProperty>,
}

#[derive(Serialize)]
struct CycloneDxHash {
    alg: String,
    content: String,
}

#[derive(Serialize)]
struct CycloneDxLicenseChoice {
    license: CycloneDxLicense,
}

#[derive(Serialize)]
struct CycloneDxLicense {
    name: String,
}

#[derive(Serialize)]
struct CycloneDxProperty {
    name: String,
    value: String,
}

/// CycloneDX 의존성 관계
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CycloneDxDependency {
    #[serde(rename = "ref")]
    reference: String,
    depends_on: Vec<String>,
}

/// 패키지 그래프에서 CycloneDX 1.5 JSON SBOM을 생성합니다.
pub fn generate(graph: &PackageGraph) -> Result<SbomDocument, ScannerError> {
    let entries = util::walk(graph);

    let mut components = Vec::with_capacity(entries.len());
    let mut dependencies = Vec::with_capacity(entries.len());
    for entry in entries {
        let pkg = entry.package;
        let hashes = pkg
            .verification
            .as_deref()
            .and_then(util::parse_verification)
            .map(|(alg, content)| {
                vec![CycloneDxHash {
                    alg: alg.to_owned(),
                    content: content.to_owned(),
                }]
            })
            .unwrap_or_default();

        let licenses = pkg
            .license
            .iter()
            .map(|name| CycloneDxLicenseChoice {
                license: CycloneDxLicense { name: name.clone() },
            })
            .collect();

        let mut properties: Vec<CycloneDxProperty> = pkg
            .from_file
            .iter()
            .map(|f| CycloneDxProperty {
                name: "depscan:source-file".to_owned(),
                value: f.clone(),
            })
            .collect();
        if pkg.indirect {
            properties.push(CycloneDxProperty {
                name: "depscan:indirect".to_owned(),
                value: "true".to_owned(),
            });
        }
        if pkg.potential {
            properties.push(CycloneDxProperty {
                name: "depscan:potential".to_owned(),
                value: "true".to_owned(),
            });
        }

        components.push(CycloneDxComponent {
            component_type: "library".to_owned(),
            bom_ref: entry.reference.clone(),
            name: pkg.name.clone(),
            version: pkg.version.clone(),
            purl: pkg.purl(),
            hashes,
            licenses,
            properties,
        });
        dependencies.push(CycloneDxDependency {
            reference: entry.reference,
            depends_on: entry.depends_on,
        });
    }

    let component_count = components.len();
    let bom = CycloneDxBom {
        bom_format: "CycloneDX".to_owned(),
        spec_version: "1.5".to_owned(),
        version: 1,
        metadata: CycloneDxMetadata {
            timestamp: util::current_timestamp(),
            tools: vec![CycloneDxTool {
                name: "depscan".to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
            }],
        },
        components,
        dependencies,
    };

    let content = serde_json::to_string_pretty(&bom)
        .map_err(|e| ScannerError::SbomGeneration(format!("CycloneDX serialization failed: {e}")))?;

    Ok(SbomDocument {
        format: SbomFormat::CycloneDx,
        content,
        component_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Package;
    use crate::types::AnalyzerType;

    fn sample_graph() -> PackageGraph {
        let lock = "/Cargo.lock";
        let mut serde_pkg = Package::new("serde", "1.0.204").with_source(lock, AnalyzerType::RustCargo);
        serde_pkg.verification = Some("sha256:abc123".to_owned());
        serde_pkg.license = vec!["MIT".to_owned()];
        let mut tokio_pkg = Package::new("tokio", "1.38.0").with_source(lock, AnalyzerType::RustCargo);
        tokio_pkg.indirect = true;

        let mut graph = PackageGraph::new();
        let app = graph.add(Package::new("app", "0.1.0").with_source(lock, AnalyzerType::RustCargo));
        let serde_id = graph.add(serde_pkg);
        let tokio_id = graph.add(tokio_pkg);
        graph.link(app, serde_id);
        graph.link(app, tokio_id);
        graph
    }

    fn parsed(graph: &PackageGraph) -> serde_json::Value {
        let doc = generate(graph).unwrap();
        serde_json::from_str(&doc.content).unwrap()
    }

    #[test]
    fn required_fields() {
        let doc = generate(&sample_graph()).unwrap();
        assert_eq!(doc.format, SbomFormat::CycloneDx);
        assert_eq!(doc.component_count, 3);
        let v: serde_json::Value = serde_json::from_str(&doc.content).unwrap();
        assert_eq!(v["bomFormat"], "CycloneDX");
        assert_eq!(v["specVersion"], "1.5");
        assert_eq!(v["metadata"]["tools"][0]["name"], "depscan");
    }

    #[test]
    fn components_carry_purl_hash_and_license() {
        let v = parsed(&sample_graph());
        let serde = v["components"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["name"] == "serde")
            .unwrap()
            .clone();
        assert_eq!(serde["purl"], "pkg:cargo/serde@1.0.204");
        assert_eq!(serde["bom-ref"], "pkg:cargo/serde@1.0.204");
        assert_eq!(serde["hashes"][0]["alg"], "SHA-256");
        assert_eq!(serde["hashes"][0]["content"], "abc123");
        assert_eq!(serde["licenses"][0]["license"]["name"], "MIT");
    }

    #[test]
    fn dependencies_section_lists_edges() {
        let v = parsed(&sample_graph());
        let app = v["dependencies"]
            .as_array()
            .unwrap()
            .iter()
            .find(|d| d["ref"] == "pkg:cargo/app@0.1.0")
            .unwrap()
            .clone();
        let deps = app["dependsOn"].as_array().unwrap();
        assert_eq!(deps.len(), 2);
        assert!(deps.contains(&serde_json::json!("pkg:cargo/tokio@1.38.0")));
    }

    #[test]
    fn indirect_flag_is_a_property() {
        let v = parsed(&sample_graph());
        let tokio = v["components"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["name"] == "tokio")
            .unwrap()
            .clone();
        let props = tokio["properties"].as_array().unwrap();
        assert!(props.iter().any(|p| p["name"] == "depscan:indirect"));
    }

    #[test]
    fn empty_graph() {
        let doc = generate(&PackageGraph::new()).unwrap();
        assert_eq!(doc.component_count, 0);
        assert!(doc.content.contains("CycloneDX"));
    }
}
