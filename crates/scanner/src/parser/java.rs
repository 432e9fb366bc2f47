//! Java 파서 -- gradle.lockfile, pom.xml, jar/war/ear/par 아카이브
//!
//! 모든 Java 패키지 이름은 `groupId:artifactId` 형식입니다.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use serde::Deserialize;

use crate::error::ScannerError;
use crate::package::DependsOn;
use crate::parser::{Library, ManifestParser, ParseOutput};

/// 아카이브 중첩 최대 깊이 (war 안의 jar 안의 jar ...)
const MAX_ARCHIVE_DEPTH: usize = 3;

/// 중첩 아카이브로 취급하는 확장자
pub const ARCHIVE_EXTENSIONS: [&str; 4] = [".jar", ".war", ".ear", ".par"];

/// gradle.lockfile 파서
///
/// ```text
/// com.example:example:0.0.1=compileClasspath,runtimeClasspath
/// empty=annotationProcessor
/// ```
pub struct GradleLockParser;

impl ManifestParser for GradleLockParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        let mut out = ParseOutput::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("empty=") {
                continue;
            }
            let coordinate = line.split('=').next().unwrap_or_default();
            let parts: Vec<&str> = coordinate.split(':').collect();
            let [group, artifact, version] = parts.as_slice() else {
                return Err(ScannerError::parse(
                    source_path,
                    format!("invalid dependency coordinate: {coordinate}"),
                ));
            };
            out.push(
                Library::new(format!("{group}:{artifact}"), *version),
                DependsOn::default(),
            );
        }
        Ok(out)
    }
}

/// pom.xml 파서
///
/// 프로젝트 자신을 라이브러리로 만들고, `test`/`provided` 범위를 제외한
/// `<dependency>` 항목을 AND 의존성으로 선언합니다. `${...}` 속성은
/// `<properties>`와 `project.version`, `project.groupId`로 치환합니다.
pub struct PomParser;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pom {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    parent: Option<PomParent>,
    #[serde(default)]
    properties: HashMap<String, String>,
    licenses: Option<PomLicenses>,
    dependencies: Option<PomDependencies>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PomParent {
    group_id: Option<String>,
    version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PomLicenses {
    #[serde(default)]
    license: Vec<PomLicense>,
}

#[derive(Debug, Default, Deserialize)]
struct PomLicense {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PomDependencies {
    #[serde(default)]
    dependency: Vec<PomDependency>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PomDependency {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    scope: Option<String>,
    optional: Option<String>,
}

impl ManifestParser for PomParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        let pom: Pom =
            quick_xml::de::from_str(content).map_err(|e| ScannerError::parse(source_path, e))?;

        let mut props = pom.properties.clone();
        let group = pom
            .group_id
            .clone()
            .or_else(|| pom.parent.as_ref().and_then(|p| p.group_id.clone()));
        let version = pom
            .version
            .clone()
            .or_else(|| pom.parent.as_ref().and_then(|p| p.version.clone()));
        if let Some(v) = &version {
            props.insert("project.version".to_owned(), v.clone());
        }
        if let Some(g) = &group {
            props.insert("project.groupId".to_owned(), g.clone());
        }

        let (Some(group), Some(artifact), Some(version)) = (group, pom.artifact_id.clone(), version)
        else {
            return Err(ScannerError::parse(
                source_path,
                "pom.xml is missing groupId, artifactId or version",
            ));
        };

        let mut depends_on = DependsOn::default();
        for dep in pom.dependencies.iter().flat_map(|d| &d.dependency) {
            if matches!(dep.scope.as_deref(), Some("test" | "provided" | "system"))
                || dep.optional.as_deref() == Some("true")
            {
                continue;
            }
            let (Some(dep_group), Some(dep_artifact)) = (&dep.group_id, &dep.artifact_id) else {
                continue;
            };
            let constraint = dep
                .version
                .as_deref()
                .map(|v| interpolate(v, &props))
                .unwrap_or_default();
            depends_on.require(
                format!("{}:{}", interpolate(dep_group, &props), dep_artifact),
                constraint,
            );
        }

        let mut library = Library::new(
            format!("{}:{}", interpolate(&group, &props), artifact),
            interpolate(&version, &props),
        );
        library.license = pom
            .licenses
            .iter()
            .flat_map(|l| &l.license)
            .filter_map(|l| l.name.as_deref())
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .collect();

        let mut out = ParseOutput::default();
        out.push(library, depends_on);
        Ok(out)
    }
}

/// `${name}` 속성을 치환합니다. 알 수 없는 속성은 그대로 둡니다.
fn interpolate(value: &str, props: &HashMap<String, String>) -> String {
    let mut result = String::with_capacity(value.len());
    let mut rest = value.trim();
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        match rest[start..].find('}') {
            Some(end) => {
                let key = &rest[start + 2..start + end];
                match props.get(key) {
                    Some(v) => result.push_str(v),
                    None => result.push_str(&rest[start..start + end + 1]),
                }
                rest = &rest[start + end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}

/// jar/war/ear/par 아카이브에서 Maven 좌표를 추출합니다.
///
/// `META-INF/maven/**/pom.properties`를 우선 사용하고, 없으면
/// `META-INF/MANIFEST.MF`, 마지막으로 파일 이름(`name-1.0.jar`)을 사용합니다.
/// 중첩 아카이브는 재귀적으로 탐색합니다.
pub fn parse_archive(data: &[u8], source_path: &str) -> Result<ParseOutput, ScannerError> {
    let mut out = ParseOutput::default();
    walk_archive(Cursor::new(data), source_path, 0, &mut out)?;
    Ok(out)
}

fn walk_archive<R: Read + Seek>(
    reader: R,
    archive_name: &str,
    depth: usize,
    out: &mut ParseOutput,
) -> Result<(), ScannerError> {
    let mut archive =
        zip::ZipArchive::new(reader).map_err(|e| ScannerError::parse(archive_name, e))?;

    let mut found = Vec::new();
    let mut manifest: Option<String> = None;
    let mut nested: Vec<(String, Vec<u8>)> = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ScannerError::parse(archive_name, e))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_owned();

        if name.starts_with("META-INF/maven/") && name.ends_with("/pom.properties") {
            let mut text = String::new();
            if entry.read_to_string(&mut text).is_ok() {
                if let Some(library) = parse_pom_properties(&text) {
                    found.push(library);
                }
            }
        } else if name.eq_ignore_ascii_case("META-INF/MANIFEST.MF") {
            let mut text = String::new();
            if entry.read_to_string(&mut text).is_ok() {
                manifest = Some(text);
            }
        } else if depth < MAX_ARCHIVE_DEPTH && is_archive_name(&name) {
            let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
            if entry.read_to_end(&mut bytes).is_ok() {
                nested.push((name, bytes));
            }
        }
    }

    if found.is_empty() {
        let from_manifest = manifest.as_deref().and_then(parse_manifest);
        if let Some(library) = from_manifest.or_else(|| library_from_file_name(archive_name)) {
            found.push(library);
        }
    }
    for library in found {
        if out.find(&library.name).is_none_or(|l| l.version != library.version) {
            out.push(library, DependsOn::default());
        }
    }

    for (name, bytes) in nested {
        // 중첩 아카이브 하나가 깨져도 바깥 결과는 유지
        if let Err(e) = walk_archive(Cursor::new(bytes), &name, depth + 1, out) {
            tracing::debug!(archive = %name, error = %e, "skipping nested archive");
        }
    }
    Ok(())
}

fn parse_pom_properties(text: &str) -> Option<Library> {
    let mut props: HashMap<&str, &str> = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            props.insert(key.trim(), value.trim());
        }
    }
    let group = props.get("groupId")?;
    let artifact = props.get("artifactId")?;
    let version = props.get("version")?;
    Some(Library::new(format!("{group}:{artifact}"), *version))
}

fn parse_manifest(text: &str) -> Option<Library> {
    let mut attrs: HashMap<&str, &str> = HashMap::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once(':') {
            attrs.insert(key.trim(), value.trim());
        }
    }
    let version = attrs
        .get("Implementation-Version")
        .or_else(|| attrs.get("Bundle-Version"))?;
    let artifact = attrs
        .get("Implementation-Title")
        .or_else(|| attrs.get("Bundle-SymbolicName"))?;
    let group = attrs
        .get("Implementation-Vendor-Id")
        .or_else(|| attrs.get("Bundle-SymbolicName"))
        .copied()
        .unwrap_or(*artifact);
    Some(Library::new(format!("{group}:{artifact}"), *version))
}

/// `commons-lang3-3.11.jar` -> `commons-lang3:commons-lang3@3.11`
fn library_from_file_name(path: &str) -> Option<Library> {
    let file_name = path.rsplit('/').next()?;
    let stem = ARCHIVE_EXTENSIONS
        .iter()
        .find_map(|ext| file_name.strip_suffix(ext))?;
    let split = stem
        .char_indices()
        .filter(|(i, c)| *c == '-' && stem[i + 1..].starts_with(|n: char| n.is_ascii_digit()))
        .map(|(i, _)| i)
        .next()?;
    let (artifact, version) = (&stem[..split], &stem[split + 1..]);
    Some(Library::new(format!("{artifact}:{artifact}"), version))
}

/// 파일 이름이 Java 아카이브 확장자로 끝나는지 확인합니다.
pub fn is_archive_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ARCHIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_GRADLE_LOCK: &str = "\
# This is a Gradle generated file for dependency locking.
# Manual edits can break the build and are not advised.
# This file is expected to be part of source control.
com.example:example:0.0.1=compileClasspath,runtimeClasspath
empty=annotationProcessor
";

    const SAMPLE_POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>com.example</groupId>
  <artifactId>example</artifactId>
  <version>1.0.0</version>
  <properties>
    <jackson.version>2.9.10</jackson.version>
  </properties>
  <licenses>
    <license>
      <name>Apache-2.0</name>
    </license>
  </licenses>
  <dependencies>
    <dependency>
      <groupId>com.fasterxml.jackson.core</groupId>
      <artifactId>jackson-core</artifactId>
      <version>${jackson.version}</version>
    </dependency>
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
      <version>4.13</version>
      <scope>test</scope>
    </dependency>
  </dependencies>
</project>
"#;

    fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options = zip::write::FileOptions::default();
            for (name, data) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn parse_gradle_lockfile() {
        let out = GradleLockParser.parse(SAMPLE_GRADLE_LOCK, "/gradle.lockfile").unwrap();
        assert_eq!(out.libraries, vec![Library::new("com.example:example", "0.0.1")]);
    }

    #[test]
    fn gradle_invalid_coordinate_is_an_error() {
        assert!(GradleLockParser.parse("not-a-coordinate=x\n", "gradle.lockfile").is_err());
    }

    #[test]
    fn parse_pom_with_properties_and_license() {
        let out = PomParser.parse(SAMPLE_POM, "/pom.xml").unwrap();
        let project = out.find("com.example:example").unwrap();
        assert_eq!(project.version, "1.0.0");
        assert_eq!(project.license, vec!["Apache-2.0"]);

        let deps = out.depends_on(project).unwrap();
        assert_eq!(deps.and["com.fasterxml.jackson.core:jackson-core"], "2.9.10");
        assert!(!deps.and.contains_key("junit:junit"));
    }

    #[test]
    fn pom_inherits_parent_version() {
        let pom = r#"<project>
  <parent><groupId>com.example</groupId><version>2.0.0</version></parent>
  <artifactId>example</artifactId>
</project>"#;
        let out = PomParser.parse(pom, "pom.xml").unwrap();
        assert_eq!(out.libraries[0].id(), "com.example:example@2.0.0");
    }

    #[test]
    fn pom_without_coordinates_is_an_error() {
        assert!(PomParser.parse("<project></project>", "pom.xml").is_err());
        assert!(PomParser.parse("not xml <<<", "pom.xml").is_err());
    }

    #[test]
    fn interpolate_properties() {
        let mut props = HashMap::new();
        props.insert("a".to_owned(), "1".to_owned());
        assert_eq!(interpolate("v${a}-${b}", &props), "v1-${b}");
    }

    #[test]
    fn archive_with_nested_jar() {
        let inner = zip_of(&[(
            "META-INF/maven/com.fasterxml.jackson.core/jackson-core/pom.properties",
            &b"groupId=com.fasterxml.jackson.core\nartifactId=jackson-core\nversion=2.9.10\n"[..],
        )]);
        let outer = zip_of(&[
            (
                "META-INF/maven/com.example/web-app/pom.properties",
                &b"#Generated by Maven\ngroupId=com.example\nartifactId=web-app\nversion=1.0-SNAPSHOT\n"[..],
            ),
            ("WEB-INF/lib/jackson-core-2.9.10.jar", inner.as_slice()),
        ]);

        let out = parse_archive(&outer, "/app/test.war").unwrap();
        let ids: Vec<_> = out.libraries.iter().map(|l| l.id()).collect();
        assert_eq!(
            ids,
            vec![
                "com.example:web-app@1.0-SNAPSHOT",
                "com.fasterxml.jackson.core:jackson-core@2.9.10",
            ]
        );
    }

    #[test]
    fn archive_falls_back_to_file_name() {
        let jar = zip_of(&[("org/example/Foo.class", &b"\xca\xfe\xba\xbe"[..])]);
        let out = parse_archive(&jar, "/libs/commons-lang3-3.11.jar").unwrap();
        assert_eq!(out.libraries[0].id(), "commons-lang3:commons-lang3@3.11");
    }

    #[test]
    fn broken_archive_is_an_error() {
        assert!(parse_archive(b"this is a text file", "/test.txt").is_err());
    }
}
