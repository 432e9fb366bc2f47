//! 그래프 구성 -- 의존성 선언을 간선으로 변환
//!
//! 각 패키지의 [`DependsOn`](crate::package::DependsOn) 선언을 읽어
//! 이름으로 대상을 찾고 간선을 만듭니다. 찾지 못한 대상은
//! `potential` 자리표시자 패키지로 합성합니다.
//!
//! - AND: 모든 대상에 간선. 없는 대상은 `이름@제약` 자리표시자.
//! - OR: 선언 순서상 첫 번째로 존재하는 대안 하나에만 간선.
//!   모두 없으면 `a|b` 이름과 `v1|v2` 버전을 가진 복합 자리표시자 하나.
//!
//! OR 그룹은 버전 호환성을 보지 않고 첫 번째 존재하는 대안을 고릅니다.
//! 여러 대안이 모두 설치되어 있어도 하나만 연결되므로 SBOM이 대안
//! 의존성을 적게 셀 수 있습니다.

use std::collections::HashMap;

use tracing::debug;

use crate::graph::{PackageGraph, PackageId};
use crate::package::{ANY_VERSION, OR_SEPARATOR, OrGroup, Package};

/// 그래프의 모든 패키지에 대해 의존성 간선을 생성합니다.
///
/// 합성된 potential 패키지는 그래프에 추가되며, 같은 이름을 다시 참조하는
/// 선언은 새로 만들지 않고 기존 자리표시자를 재사용합니다.
/// 새로 생성된 간선 수를 반환합니다.
pub fn link_packages(graph: &mut PackageGraph) -> usize {
    let mut index = NameIndex::build(graph);
    let declared = graph.ids();
    let mut synthesized = 0;
    let mut edges = 0;

    for id in declared {
        let Some(pkg) = graph.get(id) else {
            continue;
        };
        if pkg.depends_on.is_empty() {
            continue;
        }
        let depends_on = pkg.depends_on.clone();
        let template = provenance_of(pkg);

        for (dep_name, constraint) in &depends_on.and {
            let target = match index.get(dep_name) {
                Some(target) => target,
                None => {
                    let placeholder = template.adopt(Package::potential(dep_name, constraint));
                    synthesized += 1;
                    index.insert(graph, placeholder)
                }
            };
            if graph.link(id, target) {
                edges += 1;
            }
        }

        for group in depends_on.or.iter().filter(|g| !g.is_empty()) {
            let target = match group.iter().find_map(|(name, _)| index.get(name)) {
                Some(target) => target,
                None => {
                    let (name, version) = join_or_group(group);
                    match index.get(&name) {
                        Some(existing) => existing,
                        None => {
                            let placeholder = template.adopt(Package::potential(name, &version));
                            synthesized += 1;
                            index.insert(graph, placeholder)
                        }
                    }
                }
            };
            if graph.link(id, target) {
                edges += 1;
            }
        }
    }

    debug!(
        packages = graph.len(),
        edges, synthesized, "linked package dependencies"
    );
    edges
}

/// OR 그룹을 `"a|b"`, `"v1|v2"` 형태로 합칩니다. 빈 제약은 `*`입니다.
pub(crate) fn join_or_group(group: &OrGroup) -> (String, String) {
    let sep = OR_SEPARATOR.to_string();
    let name = group
        .iter()
        .map(|(n, _)| n.as_str())
        .collect::<Vec<_>>()
        .join(&sep);
    let version = group
        .iter()
        .map(|(_, c)| {
            let c = c.trim();
            if c.is_empty() { ANY_VERSION } else { c }
        })
        .collect::<Vec<_>>()
        .join(&sep);
    (name, version)
}

/// 이름 -> 핸들 색인 (같은 이름은 마지막 항목이 이김)
struct NameIndex(HashMap<String, PackageId>);

impl NameIndex {
    fn build(graph: &PackageGraph) -> Self {
        let mut map = HashMap::with_capacity(graph.len());
        for (id, pkg) in graph.iter() {
            map.insert(pkg.name.clone(), id);
        }
        Self(map)
    }

    fn get(&self, name: &str) -> Option<PackageId> {
        self.0.get(name).copied()
    }

    fn insert(&mut self, graph: &mut PackageGraph, package: Package) -> PackageId {
        let name = package.name.clone();
        let id = graph.add(package);
        self.0.insert(name, id);
        id
    }
}

/// 선언한 패키지의 출처를 자리표시자에 복사하기 위한 템플릿
struct Provenance {
    from_file: Vec<String>,
    from_analyzer: Vec<crate::types::AnalyzerType>,
}

fn provenance_of(pkg: &Package) -> Provenance {
    Provenance {
        from_file: pkg.from_file.clone(),
        from_analyzer: pkg.from_analyzer.clone(),
    }
}

impl Provenance {
    fn adopt(&self, mut pkg: Package) -> Package {
        pkg.from_file = self.from_file.clone();
        pkg.from_analyzer = self.from_analyzer.clone();
        pkg
    }
}
