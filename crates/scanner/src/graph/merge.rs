//! 패키지 병합 -- 중복 발견 제거와 OR 자리표시자 분해
//!
//! 같은 패키지가 여러 파일, 분석기, 레이어에서 반복 발견되면 하나의
//! 대표 노드로 합칩니다. 흡수되는 노드의 간선은 복사가 아니라
//! 대표 노드로 다시 연결되고, 출처(`from_file`, `from_analyzer`)는 합집합이 됩니다.
//!
//! 버전이 호환되지 않는 같은 이름의 패키지는 합치지 않고 둘 다 남깁니다.
//!
//! # 버전 호환 규칙 ([`can_merge`])
//!
//! - 버전 문자열이 같음 (`=`/`==` 접두사는 무시)
//! - 한쪽만 `*`
//! - 한쪽만 범위([`is_range_expr`])이고 다른 쪽은 확정 버전
//!
//! 범위 여부는 `is_version_range` 플래그가 아니라 버전 문자열로만 판단합니다.
//! 자리표시자라도 고정 버전이면 확정 버전으로 취급합니다.
//!
//! 범위가 실제로 만족되는지는 평가하지 않습니다. 정확한 범위 판정이 필요한
//! 호출자는 이 결과를 확정적인 것으로 취급하면 안 됩니다.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::graph::{PackageGraph, PackageId};
use crate::package::{ANY_VERSION, OR_SEPARATOR, Package, is_range_expr, push_unique};

/// 병합 결과 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// 대표 노드로 흡수된 패키지 수
    pub merged: usize,
    /// 분해된 OR 자리표시자 수
    pub split: usize,
}

/// 그래프를 이름당 가능한 한 하나의 노드로 정리합니다.
///
/// 같은 그래프에 다시 실행해도 변화가 없습니다.
pub fn merge_packages(graph: &mut PackageGraph) -> MergeSummary {
    let mut summary = MergeSummary {
        split: split_or_placeholders(graph),
        ..MergeSummary::default()
    };

    for members in group_by_name(graph) {
        if members.len() > 1 {
            summary.merged += fold_group(graph, members);
        }
    }

    debug!(
        packages = graph.len(),
        merged = summary.merged,
        split = summary.split,
        "merged duplicate packages"
    );
    summary
}

/// 같은 이름의 두 레코드가 같은 논리 패키지를 가리키는지 판정합니다.
pub fn can_merge(a: &Package, b: &Package) -> bool {
    if a.name != b.name {
        return false;
    }

    let va = exact_version(&a.version);
    let vb = exact_version(&b.version);
    if va == vb {
        return true;
    }

    let a_any = va == ANY_VERSION;
    let b_any = vb == ANY_VERSION;
    if a_any || b_any {
        return a_any != b_any;
    }

    let a_range = is_range_expr(va);
    let b_range = is_range_expr(vb);
    a_range != b_range
}

/// `=1.0`, `== 1.0` 같은 정확 일치 제약에서 버전 값만 꺼냅니다.
fn exact_version(version: &str) -> &str {
    let trimmed = version.trim();
    let stripped = trimmed.trim_start_matches('=').trim_start();
    if stripped.len() != trimmed.len() && !stripped.is_empty() {
        stripped
    } else {
        trimmed
    }
}

/// OR 자리표시자를 구성 이름별 potential 노드로 분해합니다.
///
/// 구성 이름 중 하나라도 그래프에 일반 패키지로 존재할 때만 분해하며,
/// 그렇지 않은 자리표시자는 그대로 남습니다.
fn split_or_placeholders(graph: &mut PackageGraph) -> usize {
    let plain_names: HashSet<String> = graph
        .packages()
        .filter(|p| !p.is_or_placeholder())
        .map(|p| p.name.clone())
        .collect();

    let placeholders: Vec<PackageId> = graph
        .iter()
        .filter(|(_, p)| p.is_or_placeholder())
        .map(|(id, _)| id)
        .collect();

    let mut split = 0;
    for id in placeholders {
        let Some(placeholder) = graph.get(id).cloned() else {
            continue;
        };
        let consumers: Vec<PackageId> = graph.downstream(id).collect();
        let versions: Vec<&str> = placeholder.version.split(OR_SEPARATOR).collect();

        let mut replaced = false;
        for (i, name) in placeholder.name.split(OR_SEPARATOR).enumerate() {
            if !plain_names.contains(name) {
                continue;
            }
            let version = versions.get(i).copied().unwrap_or(ANY_VERSION);
            let mut concrete = Package::potential(name, version);
            concrete.is_version_range = version.contains(['<', '>', '*']);
            concrete.indirect = placeholder.indirect;
            concrete.from_file = placeholder.from_file.clone();
            concrete.from_analyzer = placeholder.from_analyzer.clone();

            let concrete_id = graph.add(concrete);
            for consumer in &consumers {
                graph.link(*consumer, concrete_id);
            }
            replaced = true;
        }

        if replaced {
            graph.remove(id);
            split += 1;
        }
    }
    split
}

/// 일반 패키지를 이름별로 묶습니다 (첫 등장 순서 유지).
fn group_by_name(graph: &PackageGraph) -> Vec<Vec<PackageId>> {
    let mut groups: Vec<Vec<PackageId>> = Vec::new();
    let mut slot: HashMap<&str, usize> = HashMap::new();
    for (id, pkg) in graph.iter() {
        if pkg.is_or_placeholder() {
            continue;
        }
        match slot.get(pkg.name.as_str()) {
            Some(&i) => groups[i].push(id),
            None => {
                slot.insert(pkg.name.as_str(), groups.len());
                groups.push(vec![id]);
            }
        }
    }
    groups
}

/// 그룹 내에서 병합 가능한 쌍이 없을 때까지 앞쪽 레코드로 흡수합니다.
fn fold_group(graph: &mut PackageGraph, mut survivors: Vec<PackageId>) -> usize {
    let mut merged = 0;
    while let Some((i, j)) = find_mergeable_pair(graph, &survivors) {
        absorb(graph, survivors[i], survivors[j]);
        survivors.remove(j);
        merged += 1;
    }
    merged
}

fn find_mergeable_pair(graph: &PackageGraph, ids: &[PackageId]) -> Option<(usize, usize)> {
    for i in 0..ids.len() {
        let Some(a) = graph.get(ids[i]) else { continue };
        for j in (i + 1)..ids.len() {
            if graph.get(ids[j]).is_some_and(|b| can_merge(a, b)) {
                return Some((i, j));
            }
        }
    }
    None
}

/// `donor`를 `survivor`로 흡수합니다. 간선은 대표 노드로 다시 연결됩니다.
fn absorb(graph: &mut PackageGraph, survivor: PackageId, donor: PackageId) {
    let upstream: Vec<PackageId> = graph.upstream(donor).collect();
    let downstream: Vec<PackageId> = graph.downstream(donor).collect();
    let Some(donor_pkg) = graph.remove(donor) else {
        return;
    };
    if let Some(target) = graph.get_mut(survivor) {
        fold_fields(target, donor_pkg);
    }
    for up in upstream {
        graph.link(survivor, up);
    }
    for down in downstream {
        graph.link(down, survivor);
    }
}

fn fold_fields(target: &mut Package, donor: Package) {
    let donor_definite = !donor.has_loose_version();
    if target.has_loose_version() && donor_definite {
        target.set_version(donor.version.clone());
        target.is_version_range = false;
    } else if target.version == ANY_VERSION && donor.version != ANY_VERSION {
        target.set_version(donor.version.clone());
        target.is_version_range = donor.is_version_range || is_range_expr(&donor.version);
    }

    target.potential = target.potential && donor.potential;
    target.indirect = target.indirect && donor.indirect;
    if target.verification.is_none() {
        target.verification = donor.verification;
    }

    for file in donor.from_file {
        push_unique(&mut target.from_file, file);
    }
    for analyzer in donor.from_analyzer {
        push_unique(&mut target.from_analyzer, analyzer);
    }
    for license in donor.license {
        push_unique(&mut target.license, license);
    }
    for cpe in donor.amended_cpe {
        push_unique(&mut target.amended_cpe, cpe);
    }
    for cve in donor.associated_cve {
        push_unique(&mut target.associated_cve, cve);
    }
    target.depends_on.extend(&donor.depends_on);
}
