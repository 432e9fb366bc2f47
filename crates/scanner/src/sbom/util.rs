//! SBOM 생성 유틸리티 -- 공유 헬퍼 함수

use std::collections::{HashMap, HashSet};

use crate::graph::{PackageGraph, PackageId};
use crate::package::Package;

/// 그래프 순회로 얻은 SBOM 항목
pub(crate) struct Entry<'a> {
    /// 문서 내 참조 키
    pub reference: String,
    pub package: &'a Package,
    /// 의존하는 항목의 참조 키 (중복 없음)
    pub depends_on: Vec<String>,
}

/// 그래프를 최상위 패키지부터 upstream 방향으로 순회합니다.
///
/// `(name, version)`이 같은 패키지는 처음 방문한 것 하나만 내보냅니다.
/// 최상위에서 도달할 수 없는 패키지(순환 안의 패키지 등)는 뒤이어 삽입 순서대로 방문합니다.
pub(crate) fn walk(graph: &PackageGraph) -> Vec<Entry<'_>> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut order: Vec<PackageId> = Vec::new();

    let starts = graph.roots().into_iter().chain(graph.ids());
    for start in starts {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let Some(pkg) = graph.get(id) else {
                continue;
            };
            if !seen.insert((pkg.name.as_str(), pkg.version.as_str())) {
                continue;
            }
            order.push(id);
            let mut ups: Vec<PackageId> = graph.upstream(id).collect();
            ups.reverse();
            stack.extend(ups);
        }
    }

    let mut refs: HashMap<(&str, &str), String> = HashMap::new();
    for id in &order {
        if let Some(pkg) = graph.get(*id) {
            refs.insert((pkg.name.as_str(), pkg.version.as_str()), pkg.purl());
        }
    }

    order
        .into_iter()
        .filter_map(|id| {
            let package = graph.get(id)?;
            let reference = refs
                .get(&(package.name.as_str(), package.version.as_str()))?
                .clone();
            let mut depends_on: Vec<String> = Vec::new();
            for up in graph.upstream(id) {
                let Some(dep) = graph.get(up) else {
                    continue;
                };
                if let Some(r) = refs.get(&(dep.name.as_str(), dep.version.as_str())) {
                    if *r != reference && !depends_on.contains(r) {
                        depends_on.push(r.clone());
                    }
                }
            }
            Some(Entry {
                reference,
                package,
                depends_on,
            })
        })
        .collect()
}

/// `scheme:digest` 형식의 검증 값에서 알고리즘명과 다이제스트를 추출합니다.
///
/// 알 수 없는 스킴(Go의 `h1:` 등)은 `None`입니다.
pub fn parse_verification(verification: &str) -> Option<(&'static str, &str)> {
    let (scheme, digest) = verification.split_once(':')?;
    let algorithm = match scheme.to_lowercase().as_str() {
        "md5" => "MD5",
        "sha1" => "SHA-1",
        "sha256" => "SHA-256",
        "sha384" => "SHA-384",
        "sha512" => "SHA-512",
        _ => return None,
    };
    if digest.is_empty() {
        return None;
    }
    Some((algorithm, digest))
}

/// 현재 Unix 타임스탬프를 RFC3339 형식으로 반환합니다.
///
/// 시스템 시간을 가져올 수 없는 경우 epoch(1970-01-01T00:00:00Z)를 반환합니다.
pub fn current_timestamp() -> String {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(duration) => unix_to_rfc3339(duration.as_secs()),
        Err(_) => "1970-01-01T00:00:00Z".to_owned(),
    }
}

/// Unix timestamp를 RFC3339 형식 (YYYY-MM-DDTHH:MM:SSZ)으로 변환합니다.
pub fn unix_to_rfc3339(secs: u64) -> String {
    const SECONDS_PER_DAY: u64 = 86400;

    let mut days = secs / SECONDS_PER_DAY;
    let rem = secs % SECONDS_PER_DAY;
    let (hours, minutes, seconds) = (rem / 3600, (rem % 3600) / 60, rem % 60);

    let mut year = 1970;
    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if days < days_in_year {
            break;
        }
        days -= days_in_year;
        year += 1;
    }

    let feb = if is_leap_year(year) { 29 } else { 28 };
    let months: [u64; 12] = [31, feb, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut month = 1;
    let mut day = days + 1;
    for len in months {
        if day <= len {
            break;
        }
        day -= len;
        month += 1;
    }

    format!("{year:04}-{month:02}-{day:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
}

fn is_leap_year(year: u64) -> bool {
    (year.is_multiple_of(4) && !year.is_multiple_of(100)) || year.is_multiple_of(400)
}
