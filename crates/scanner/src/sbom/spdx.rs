//! SPDX 2.3 JSON SBOM 생성
//!
//! [SPDX](https://spdx.dev/) 2.3 사양에 따른 JSON SBOM 문서를 생성합니다.
//! 의존성 간선은 `DEPENDS_ON` 관계로 기록됩니다.

use std::collections::HashMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::util;
use crate::error::ScannerError;
use crate::graph::PackageGraph;
use crate::types::{SbomDocument, SbomFormat};

const DOCUMENT_ID: &str = "SPDXRef-DOCUMENT";
const NOASSERTION: &str = "NOASSERTION";

/// SPDX 2.3 문서 루트 구조
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxDocument {
    spdx_version: String,
    #[serde(rename = "SPDXID")]
    spdx_id: String,
    name: String,
    data_license: String,
    document_namespace: String,
    creation_info: SpdxCreationInfo,
    packages: Vec<SpdxPackage>,
    relationships: Vec<SpdxRelationship>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxCreationInfo {
    created: String,
    creators: Vec<String>,
}

/// SPDX 패키지
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxPackage {
    #[serde(rename = "SPDXID")]
    spdx_id: String,
    name: String,
    version_info: String,
    download_location: String,
    license_declared: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    external_refs: Vec<SpdxExternalRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    checksums: Vec<SpdxChecksum>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxExternalRef {
    reference_category: String,
    reference_type: String,
    reference_locator: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxChecksum {
    algorithm: String,
    checksum_value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxRelationship {
    spdx_element_id: String,
    relationship_type: String,
    related_spdx_element: String,
}

/// 패키지 그래프에서 SPDX 2.3 JSON SBOM을 생성합니다.
pub fn generate(graph: &PackageGraph) -> Result<SbomDocument, ScannerError> {
    let entries = util::walk(graph);

    let ids: HashMap<&str, String> = entries
        .iter()
        .map(|e| {
            (
                e.reference.as_str(),
                spdx_id(&e.package.name, &e.package.version),
            )
        })
        .collect();

    let mut packages = Vec::with_capacity(entries.len());
    let mut relationships = Vec::new();
    for entry in &entries {
        let pkg = entry.package;
        let id = ids
            .get(entry.reference.as_str())
            .cloned()
            .unwrap_or_else(|| spdx_id(&pkg.name, &pkg.version));

        let checksums = pkg
            .verification
            .as_deref()
            .and_then(util::parse_verification)
            .map(|(alg, value)| {
                vec![SpdxChecksum {
                    // SPDX는 하이픈 없는 알고리즘명 (SHA256)
                    algorithm: alg.replace('-', ""),
                    checksum_value: value.to_owned(),
                }]
            })
            .unwrap_or_default();

        let license_declared = if pkg.license.is_empty() {
            NOASSERTION.to_owned()
        } else {
            pkg.license.join(" AND ")
        };

        relationships.push(SpdxRelationship {
            spdx_element_id: DOCUMENT_ID.to_owned(),
            relationship_type: "DESCRIBES".to_owned(),
            related_spdx_element: id.clone(),
        });
        for dep in &entry.depends_on {
            if let Some(dep_id) = ids.get(dep.as_str()) {
                relationships.push(SpdxRelationship {
                    spdx_element_id: id.clone(),
                    relationship_type: "DEPENDS_ON".to_owned(),
                    related_spdx_element: dep_id.clone(),
                });
            }
        }

        packages.push(SpdxPackage {
            spdx_id: id,
            name: pkg.name.clone(),
            version_info: pkg.version.clone(),
            download_location: NOASSERTION.to_owned(),
            license_declared,
            external_refs: vec![SpdxExternalRef {
                reference_category: "PACKAGE-MANAGER".to_owned(),
                reference_type: "purl".to_owned(),
                reference_locator: pkg.purl(),
            }],
            checksums,
        });
    }

    let created = util::current_timestamp();
    let component_count = packages.len();
    let doc = SpdxDocument {
        spdx_version: "SPDX-2.3".to_owned(),
        spdx_id: DOCUMENT_ID.to_owned(),
        name: "depscan-scan".to_owned(),
        data_license: "CC0-1.0".to_owned(),
        document_namespace: namespace(&entries, &created),
        creation_info: SpdxCreationInfo {
            created,
            creators: vec![format!("Tool: depscan-{}", env!("CARGO_PKG_VERSION"))],
        },
        packages,
        relationships,
    };

    let content = serde_json::to_string_pretty(&doc)
        .map_err(|e| ScannerError::SbomGeneration(format!("SPDX serialization failed: {e}")))?;

    Ok(SbomDocument {
        format: SbomFormat::Spdx,
        content,
        component_count,
    })
}

/// 이름과 버전으로 결정론적 SPDX ID를 만듭니다.
fn spdx_id(name: &str, version: &str) -> String {
    let sanitize = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '-' })
            .collect()
    };
    format!("SPDXRef-Package-{}-{}", sanitize(name), sanitize(version))
}

/// 패키지 참조와 생성 시각으로 문서 네임스페이스를 만듭니다.
fn namespace(entries: &[util::Entry<'_>], created: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(created.as_bytes());
    for entry in entries {
        hasher.update(entry.reference.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("https://depscan.dev/spdx/{}", &digest[..32])
}
