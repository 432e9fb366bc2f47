//! pnpm-lock.yaml 파서
//!
//! `packages` 키 형식은 lockfile 버전에 따라 다릅니다.
//!
//! | 버전 | 키 예시 |
//! |------|---------|
//! | v5 | `/@babel/core/7.20.0_peer@1.0.0` |
//! | v6 | `/@babel/core@7.20.0(peer@1.0.0)` |
//! | v9 | `@babel/core@7.20.0` (의존성은 `snapshots`에 있음) |
//!
//! peer 의존성 접미사(`_...`, `(...)`)는 버전에서 제거합니다.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::error::ScannerError;
use crate::package::DependsOn;
use crate::parser::yarn::yaml_scalar;
use crate::parser::{Library, ManifestParser, ParseOutput};

/// pnpm-lock.yaml 파서
pub struct PnpmLockParser;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PnpmLock {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    importers: BTreeMap<String, Importer>,
    #[serde(default)]
    packages: BTreeMap<String, PnpmPackage>,
    #[serde(default)]
    snapshots: BTreeMap<String, PnpmPackage>,
}

#[derive(Deserialize)]
struct Importer {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Default, Deserialize)]
struct PnpmPackage {
    #[serde(default)]
    resolution: Option<Resolution>,
    #[serde(default)]
    dependencies: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    dev: Option<bool>,
}

#[derive(Default, Deserialize)]
struct Resolution {
    integrity: Option<String>,
}

impl ManifestParser for PnpmLockParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        let lock: PnpmLock =
            serde_yaml::from_str(content).map_err(|e| ScannerError::parse(source_path, e))?;

        let direct: HashSet<&str> = lock
            .dependencies
            .keys()
            .chain(lock.importers.get(".").into_iter().flat_map(|i| i.dependencies.keys()))
            .map(String::as_str)
            .collect();

        let mut out = ParseOutput::default();
        for (key, pkg) in &lock.packages {
            if pkg.dev == Some(true) {
                continue;
            }
            let Some((name, version)) = parse_package_key(key) else {
                continue;
            };

            // v9은 의존성을 snapshots에 기록
            let deps = if pkg.dependencies.is_empty() {
                lock.snapshots
                    .iter()
                    .find(|(snap_key, _)| parse_package_key(snap_key) == Some((name, version)))
                    .map(|(_, snap)| &snap.dependencies)
                    .unwrap_or(&pkg.dependencies)
            } else {
                &pkg.dependencies
            };

            let mut depends_on = DependsOn::default();
            for (dep, value) in deps {
                let version = yaml_scalar(value).unwrap_or_default();
                depends_on.require(dep, strip_peer_suffix(&version));
            }

            let mut library = Library::new(name, version);
            library.verification = pkg
                .resolution
                .as_ref()
                .and_then(|r| r.integrity.as_deref())
                .and_then(|i| i.split_once('-'))
                .map(|(algo, digest)| format!("{algo}:{digest}"));
            library.indirect = !direct.is_empty() && !direct.contains(name);
            out.push(library, depends_on);
        }
        Ok(out)
    }
}

/// 패키지 키에서 (이름, 버전)을 꺼냅니다.
fn parse_package_key(key: &str) -> Option<(&str, &str)> {
    let key = key.strip_prefix('/').unwrap_or(key);
    let key = key.split('(').next()?;

    // v6+: name@version
    let search_from = usize::from(key.starts_with('@'));
    if let Some(at) = key[search_from..].find('@').map(|i| i + search_from) {
        let (name, version) = (&key[..at], &key[at + 1..]);
        let slashes = name.matches('/').count();
        let valid_name = if name.starts_with('@') { slashes == 1 } else { slashes == 0 };
        if valid_name && !version.is_empty() && !version.contains('/') {
            return Some((name, strip_peer_suffix(version)));
        }
    }

    // v5: name/version
    let (name, version) = key.rsplit_once('/')?;
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some((name, strip_peer_suffix(version)))
}

fn strip_peer_suffix(version: &str) -> &str {
    version
        .split(['(', '_'])
        .next()
        .unwrap_or(version)
        .trim()
}
