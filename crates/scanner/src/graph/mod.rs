//! 패키지 의존성 그래프 -- 아레나 기반
//!
//! 패키지는 [`PackageGraph`] 아레나에 저장되고 [`PackageId`]로 참조됩니다.
//! upstream/downstream 관계는 아레나 인덱스 집합으로 표현되므로
//! 순환 참조나 소유권 문제가 없습니다.
//!
//! 모든 간선은 [`PackageGraph::link`] 하나로만 생성되며,
//! 항상 양방향으로 기록됩니다:
//! `B ∈ A.upstream` 이면 반드시 `A ∈ B.downstream` 입니다.
//!
//! # 처리 단계
//!
//! ```text
//! AnalyzerGroup::packages() --> PackageGraph::from_packages
//!                                   |
//!                             link_packages   (AND/OR 선언 -> 간선, potential 노드 합성)
//!                                   |
//!                             merge_packages  (중복 병합, OR 자리표시자 분해)
//!                                   |
//!                             읽기 전용 그래프 --> SbomGenerator
//! ```

pub mod link;
pub mod merge;

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::package::Package;

pub use link::link_packages;
pub use merge::{MergeSummary, can_merge, merge_packages};

/// 아레나 내 패키지 핸들
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PackageId(usize);

impl PackageId {
    /// 아레나 인덱스를 반환합니다.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Node {
    package: Package,
    /// 이 패키지가 의존하는 패키지
    upstream: BTreeSet<PackageId>,
    /// 이 패키지에 의존하는 패키지
    downstream: BTreeSet<PackageId>,
}

/// 패키지 아레나
///
/// 제거된 패키지의 슬롯은 비워지며 인덱스는 재사용되지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct PackageGraph {
    nodes: Vec<Option<Node>>,
    live: usize,
}

impl PackageGraph {
    /// 빈 그래프를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 연결되지 않은 패키지 목록으로 그래프를 생성합니다.
    pub fn from_packages(packages: impl IntoIterator<Item = Package>) -> Self {
        let mut graph = Self::new();
        for pkg in packages {
            graph.add(pkg);
        }
        graph
    }

    /// 패키지를 추가하고 핸들을 반환합니다.
    pub fn add(&mut self, package: Package) -> PackageId {
        let id = PackageId(self.nodes.len());
        self.nodes.push(Some(Node {
            package,
            upstream: BTreeSet::new(),
            downstream: BTreeSet::new(),
        }));
        self.live += 1;
        id
    }

    /// 살아있는 패키지 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.live
    }

    /// 그래프가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// 핸들이 살아있는 패키지를 가리키는지 확인합니다.
    pub fn contains(&self, id: PackageId) -> bool {
        self.node(id).is_some()
    }

    /// 패키지를 조회합니다.
    pub fn get(&self, id: PackageId) -> Option<&Package> {
        self.node(id).map(|n| &n.package)
    }

    /// 패키지를 가변 조회합니다.
    pub fn get_mut(&mut self, id: PackageId) -> Option<&mut Package> {
        self.node_mut(id).map(|n| &mut n.package)
    }

    /// 살아있는 패키지 핸들을 삽입 순서대로 반환합니다.
    pub fn ids(&self) -> Vec<PackageId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| PackageId(i))
            .collect()
    }

    /// (핸들, 패키지) 쌍을 삽입 순서대로 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = (PackageId, &Package)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (PackageId(i), &n.package)))
    }

    /// 패키지를 삽입 순서대로 순회합니다.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.iter().map(|(_, p)| p)
    }

    /// 이름이 같은 패키지 핸들을 모두 반환합니다.
    pub fn find_by_name(&self, name: &str) -> Vec<PackageId> {
        self.iter()
            .filter(|(_, p)| p.name == name)
            .map(|(id, _)| id)
            .collect()
    }

    /// `id`가 의존하는 패키지 핸들
    pub fn upstream(&self, id: PackageId) -> impl Iterator<Item = PackageId> + '_ {
        self.node(id).into_iter().flat_map(|n| n.upstream.iter().copied())
    }

    /// `id`에 의존하는 패키지 핸들
    pub fn downstream(&self, id: PackageId) -> impl Iterator<Item = PackageId> + '_ {
        self.node(id)
            .into_iter()
            .flat_map(|n| n.downstream.iter().copied())
    }

    /// `dependent`가 `dependency`에 의존한다는 간선을 양방향으로 기록합니다.
    ///
    /// 자기 자신으로의 간선과 죽은 핸들은 무시하며, 간선이 새로 생겼으면 `true`를 반환합니다.
    pub fn link(&mut self, dependent: PackageId, dependency: PackageId) -> bool {
        if dependent == dependency || !self.contains(dependent) || !self.contains(dependency) {
            return false;
        }
        let added = match self.node_mut(dependent) {
            Some(n) => n.upstream.insert(dependency),
            None => false,
        };
        if let Some(n) = self.node_mut(dependency) {
            n.downstream.insert(dependent);
        }
        added
    }

    /// 패키지의 모든 간선을 양쪽에서 끊습니다.
    pub fn unlink_all(&mut self, id: PackageId) {
        let (upstream, downstream) = match self.node_mut(id) {
            Some(n) => (
                std::mem::take(&mut n.upstream),
                std::mem::take(&mut n.downstream),
            ),
            None => return,
        };
        for up in upstream {
            if let Some(n) = self.node_mut(up) {
                n.downstream.remove(&id);
            }
        }
        for down in downstream {
            if let Some(n) = self.node_mut(down) {
                n.upstream.remove(&id);
            }
        }
    }

    /// 간선을 끊고 패키지를 아레나에서 제거합니다.
    pub fn remove(&mut self, id: PackageId) -> Option<Package> {
        self.unlink_all(id);
        let node = self.nodes.get_mut(id.0)?.take()?;
        self.live -= 1;
        Some(node.package)
    }

    /// 모든 간선이 양방향으로 기록되어 있는지 검사합니다.
    pub fn is_mirrored(&self) -> bool {
        self.iter().all(|(id, _)| {
            self.upstream(id)
                .all(|up| self.node(up).is_some_and(|n| n.downstream.contains(&id)))
                && self
                    .downstream(id)
                    .all(|down| self.node(down).is_some_and(|n| n.upstream.contains(&id)))
        })
    }

    /// 간선이 없는 패키지 목록으로 분해합니다.
    pub fn into_packages(self) -> Vec<Package> {
        self.nodes
            .into_iter()
            .flatten()
            .map(|n| n.package)
            .collect()
    }

    /// 다른 패키지가 의존하지 않는 최상위 패키지 핸들
    pub fn roots(&self) -> Vec<PackageId> {
        self.iter()
            .filter(|(id, _)| self.downstream(*id).next().is_none())
            .map(|(id, _)| id)
            .collect()
    }

    fn node(&self, id: PackageId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, id: PackageId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(|n| n.as_mut())
    }
}

impl fmt::Display for PackageGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let edges: usize = self.iter().map(|(id, _)| self.upstream(id).count()).sum();
        write!(f, "PackageGraph({} packages, {} edges)", self.live, edges)
    }
}
