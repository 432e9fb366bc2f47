//! conan.lock 파서
//!
//! 두 가지 형식을 지원합니다.
//!
//! - v1 (Conan 1.x): `graph_lock.nodes`의 노드 그래프. 노드 `"0"`은 프로젝트 자신입니다.
//! - v2 (Conan 2.x): `requires` 배열의 참조 문자열 목록 (의존성 관계 없음).
//!
//! 참조 문자열은 `name/version@user/channel#revision%timestamp` 형식입니다.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ScannerError;
use crate::package::DependsOn;
use crate::parser::{Library, ManifestParser, ParseOutput};

/// conan.lock 파서
pub struct ConanLockParser;

#[derive(Deserialize)]
struct ConanLock {
    #[serde(default)]
    graph_lock: Option<GraphLock>,
    #[serde(default)]
    requires: Vec<String>,
    #[serde(default)]
    build_requires: Vec<String>,
}

#[derive(Deserialize)]
struct GraphLock {
    #[serde(default)]
    nodes: HashMap<String, Node>,
}

#[derive(Deserialize)]
struct Node {
    #[serde(default, rename = "ref")]
    reference: Option<String>,
    #[serde(default)]
    requires: Vec<String>,
}

impl ManifestParser for ConanLockParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        let lock: ConanLock =
            serde_json::from_str(content).map_err(|e| ScannerError::parse(source_path, e))?;

        let mut out = ParseOutput::default();
        match lock.graph_lock {
            Some(graph) => parse_graph(graph, &mut out),
            None => {
                for reference in lock.requires.iter().chain(&lock.build_requires) {
                    if let Some((name, version)) = split_reference(reference) {
                        out.push(Library::new(name, version), DependsOn::default());
                    }
                }
            }
        }
        Ok(out)
    }
}

fn parse_graph(graph: GraphLock, out: &mut ParseOutput) {
    let resolved: HashMap<&str, (&str, &str)> = graph
        .nodes
        .iter()
        .filter_map(|(key, node)| {
            let reference = node.reference.as_deref()?;
            split_reference(reference).map(|nv| (key.as_str(), nv))
        })
        .collect();

    // 노드 번호 순서로 출력해 결과를 결정적으로 유지
    let mut keys: Vec<&String> = graph.nodes.keys().collect();
    keys.sort_by_key(|k| (k.parse::<u64>().unwrap_or(u64::MAX), (*k).clone()));

    for key in keys {
        let Some(&(name, version)) = resolved.get(key.as_str()) else {
            continue;
        };
        let mut depends_on = DependsOn::default();
        if let Some(node) = graph.nodes.get(key) {
            for required in &node.requires {
                if let Some(&(dep_name, dep_version)) = resolved.get(required.as_str()) {
                    depends_on.require(dep_name, dep_version);
                }
            }
        }
        let mut library = Library::new(name, version);
        library.indirect = graph.nodes.contains_key("0") && !is_direct(&graph, key);
        out.push(library, depends_on);
    }
}

/// 루트 노드(`"0"`)가 직접 요구하는 노드인지 확인합니다.
fn is_direct(graph: &GraphLock, key: &str) -> bool {
    graph
        .nodes
        .get("0")
        .is_some_and(|root| root.requires.iter().any(|r| r == key))
}

/// `zlib/1.2.13@user/channel#rev%ts` -> (`zlib`, `1.2.13`)
fn split_reference(reference: &str) -> Option<(&str, &str)> {
    let head = reference.split(['@', '#']).next()?;
    let (name, version) = head.split_once('/')?;
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some((name, version))
}
