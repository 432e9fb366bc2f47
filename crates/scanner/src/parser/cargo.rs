//! Cargo.lock 파서
//!
//! Cargo.lock은 TOML 형식으로 `[[package]]` 배열에 패키지 정보를 저장합니다.
//!
//! ```toml
//! [[package]]
//! name = "serde"
//! version = "1.0.204"
//! source = "registry+https://github.com/rust-lang/crates.io-index"
//! checksum = "bc76f558..."
//! dependencies = [
//!  "serde_derive",
//!  "syn 2.0.72",
//! ]
//! ```
//!
//! `dependencies` 항목은 `name`, `name version`, `name version (source)` 중
//! 하나의 형태입니다. 같은 이름의 패키지가 여러 버전 있을 때만 버전이 붙습니다.

use serde::Deserialize;

use crate::error::ScannerError;
use crate::package::DependsOn;
use crate::parser::{Library, ManifestParser, ParseOutput};

/// Cargo.lock 파서
pub struct CargoLockParser;

#[derive(Deserialize)]
struct CargoLock {
    #[serde(default)]
    package: Vec<CargoPackage>,
}

#[derive(Deserialize)]
struct CargoPackage {
    name: String,
    version: String,
    #[serde(default)]
    checksum: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

impl ManifestParser for CargoLockParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        let lock: CargoLock =
            toml::from_str(content).map_err(|e| ScannerError::parse(source_path, e))?;

        let mut out = ParseOutput::default();
        for pkg in lock.package {
            let mut depends_on = DependsOn::default();
            for dep in &pkg.dependencies {
                let mut parts = dep.split_whitespace();
                let Some(name) = parts.next() else {
                    continue;
                };
                depends_on.require(name, parts.next().unwrap_or_default());
            }

            let mut library = Library::new(pkg.name, pkg.version);
            library.verification = pkg.checksum.map(|c| format!("sha256:{c}"));
            out.push(library, depends_on);
        }
        Ok(out)
    }
}
