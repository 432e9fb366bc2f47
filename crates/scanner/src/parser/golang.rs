//! Go 모듈 파서 -- go.mod, go.sum, 실행 파일 빌드 정보
//!
//! # go.mod
//!
//! 모듈 자신은 `(devel)` 버전의 라이브러리가 되고, 모든 `require` 항목에 대한
//! AND 의존성을 가집니다. 버전의 `v` 접두사는 제거합니다.
//! `// indirect` 주석이 붙은 항목은 간접 의존성입니다.
//!
//! 형식이 잘못된 go.mod는 에러로 처리합니다 (엄격 모드 분석기).
//!
//! # go.sum
//!
//! 같은 디렉토리의 go.sum이 있으면 `h1:` 해시를 검증 값으로 붙입니다.
//! `go` 지시어가 1.17 미만이면 go.mod에 전이 의존성이 없으므로
//! go.sum에만 있는 모듈을 간접 의존성으로 추가합니다.
//!
//! # 빌드 정보
//!
//! Go 1.18 이상으로 빌드된 실행 파일의 `\xff Go buildinf:` 블록에서
//! `dep` 항목을 읽습니다. 이 경우 버전의 `v` 접두사는 유지합니다.

use std::collections::{BTreeMap, HashMap};

use crate::error::ScannerError;
use crate::package::DependsOn;
use crate::parser::{Library, ManifestParser, ParseOutput};

/// 메인 모듈에 부여하는 버전
pub const DEVEL_VERSION: &str = "(devel)";

/// go.mod 파서 (go.sum 없이)
pub struct GoModParser;

impl ManifestParser for GoModParser {
    fn parse(&self, content: &str, source_path: &str) -> Result<ParseOutput, ScannerError> {
        parse_go_mod(content, None, source_path)
    }
}

#[derive(Debug, Clone)]
struct Requirement {
    path: String,
    version: String,
    indirect: bool,
}

#[derive(Debug, Default)]
struct GoMod {
    module: Option<String>,
    go_version: Option<String>,
    requires: Vec<Requirement>,
    replaces: Vec<Replace>,
}

/// `replace old [version] => new version`
#[derive(Debug, Clone)]
struct Replace {
    path: String,
    version: Option<String>,
    new_path: String,
    new_version: String,
}

/// go.sum 내용: (모듈, `v` 접두사 없는 버전) -> `h1:` 해시
#[derive(Debug, Default)]
pub struct GoSum {
    hashes: BTreeMap<(String, String), String>,
}

impl GoSum {
    /// go.sum 내용을 읽습니다. 알 수 없는 줄은 무시합니다.
    pub fn parse(content: &str) -> Self {
        let mut hashes = BTreeMap::new();
        for line in content.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [module, version, hash] = fields.as_slice() else {
                continue;
            };
            if version.ends_with("/go.mod") {
                continue;
            }
            hashes.insert(
                ((*module).to_owned(), trim_v(version).to_owned()),
                (*hash).to_owned(),
            );
        }
        Self { hashes }
    }

    fn hash(&self, module: &str, version: &str) -> Option<&String> {
        self.hashes.get(&(module.to_owned(), version.to_owned()))
    }
}

/// go.mod(과 선택적인 go.sum)을 파싱합니다.
pub fn parse_go_mod(
    content: &str,
    sum: Option<&GoSum>,
    source_path: &str,
) -> Result<ParseOutput, ScannerError> {
    let go_mod = read_go_mod(content, source_path)?;
    let Some(module) = go_mod.module.clone() else {
        return Err(ScannerError::parse(source_path, "missing module directive"));
    };

    let mut requirements: Vec<Requirement> = go_mod
        .requires
        .iter()
        .map(|req| apply_replace(req, &go_mod.replaces))
        .collect();

    if let Some(sum) = sum {
        if go_mod.go_version.as_deref().is_none_or(before_go_117) {
            let known: Vec<String> = requirements.iter().map(|r| r.path.clone()).collect();
            let mut extra: HashMap<&str, &str> = HashMap::new();
            for (module_path, version) in sum.hashes.keys() {
                if module_path != &module && !known.contains(module_path) {
                    extra.insert(module_path, version);
                }
            }
            let mut extra: Vec<_> = extra.into_iter().collect();
            extra.sort();
            for (path, version) in extra {
                requirements.push(Requirement {
                    path: path.to_owned(),
                    version: version.to_owned(),
                    indirect: true,
                });
            }
        }
    }

    let mut out = ParseOutput::default();
    let mut module_deps = DependsOn::default();
    for req in &requirements {
        module_deps.require(&req.path, &req.version);
    }
    out.push(Library::new(&module, DEVEL_VERSION), module_deps);

    for req in requirements {
        let mut library = Library::new(&req.path, &req.version);
        library.indirect = req.indirect;
        library.verification = sum.and_then(|s| s.hash(&req.path, &req.version)).cloned();
        out.push(library, DependsOn::default());
    }
    Ok(out)
}

fn read_go_mod(content: &str, source_path: &str) -> Result<GoMod, ScannerError> {
    let mut go_mod = GoMod::default();
    let mut block: Option<String> = None;

    for (line_no, raw) in content.lines().enumerate() {
        let (code, comment) = match raw.split_once("//") {
            Some((code, comment)) => (code.trim(), comment.trim()),
            None => (raw.trim(), ""),
        };
        if code.is_empty() {
            continue;
        }
        let err = |reason: &str| {
            ScannerError::parse(source_path, format!("line {}: {reason}", line_no + 1))
        };

        if let Some(directive) = &block {
            if code == ")" {
                block = None;
                continue;
            }
            handle_directive(&mut go_mod, directive, code, comment).map_err(|r| err(&r))?;
            continue;
        }

        let (directive, rest) = code.split_once(char::is_whitespace).unwrap_or((code, ""));
        let rest = rest.trim();
        if rest == "(" {
            block = Some(directive.to_owned());
            continue;
        }
        handle_directive(&mut go_mod, directive, rest, comment).map_err(|r| err(&r))?;
    }

    if block.is_some() {
        return Err(ScannerError::parse(source_path, "unterminated block"));
    }
    Ok(go_mod)
}

fn handle_directive(
    go_mod: &mut GoMod,
    directive: &str,
    args: &str,
    comment: &str,
) -> Result<(), String> {
    let fields: Vec<&str> = args.split_whitespace().collect();
    match directive {
        "module" => {
            let path = fields.first().ok_or("module directive without path")?;
            go_mod.module = Some(path.trim_matches('"').to_owned());
        }
        "go" => {
            let version = fields.first().ok_or("go directive without version")?;
            go_mod.go_version = Some((*version).to_owned());
        }
        "require" => {
            let [path, version] = fields.as_slice() else {
                return Err(format!("invalid require: {args}"));
            };
            go_mod.requires.push(Requirement {
                path: path.trim_matches('"').to_owned(),
                version: trim_v(version).to_owned(),
                indirect: comment.contains("indirect"),
            });
        }
        "replace" => {
            let (old, new) = args
                .split_once("=>")
                .ok_or_else(|| format!("invalid replace: {args}"))?;
            let old: Vec<&str> = old.split_whitespace().collect();
            let new: Vec<&str> = new.split_whitespace().collect();
            match (old.as_slice(), new.as_slice()) {
                ([path, rest @ ..], [new_path, new_version]) if rest.len() <= 1 => {
                    go_mod.replaces.push(Replace {
                        path: (*path).to_owned(),
                        version: rest.first().map(|v| trim_v(v).to_owned()),
                        new_path: (*new_path).to_owned(),
                        new_version: trim_v(new_version).to_owned(),
                    });
                }
                // 로컬 경로 대체는 버전 정보가 없으므로 원래 항목을 유지
                ([_, ..], [_]) => {}
                _ => return Err(format!("invalid replace: {args}")),
            }
        }
        "exclude" | "retract" | "toolchain" | "godebug" => {}
        other => return Err(format!("unknown directive: {other}")),
    }
    Ok(())
}

fn apply_replace(req: &Requirement, replaces: &[Replace]) -> Requirement {
    let replacement = replaces.iter().find(|r| {
        r.path == req.path && r.version.as_ref().is_none_or(|v| v == &req.version)
    });
    match replacement {
        Some(r) => Requirement {
            path: r.new_path.clone(),
            version: r.new_version.clone(),
            indirect: req.indirect,
        },
        None => req.clone(),
    }
}

fn trim_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

/// `go` 지시어 버전이 1.17 미만인지 확인합니다.
fn before_go_117(version: &str) -> bool {
    let mut parts = version.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    (major, minor) < (1, 17)
}

const BUILDINFO_MAGIC: &[u8] = b"\xff Go buildinf:";
const BUILDINFO_HEADER_LEN: usize = 32;
const FLAG_INLINE_STRINGS: u8 = 0x2;

/// 실행 파일에 빌드 정보 블록이 있는지 확인합니다.
pub fn has_build_info(data: &[u8]) -> bool {
    find_magic(data).is_some()
}

/// Go 실행 파일의 빌드 정보에서 의존 모듈을 읽습니다.
pub fn parse_build_info(data: &[u8], source_path: &str) -> Result<ParseOutput, ScannerError> {
    let start = find_magic(data)
        .ok_or_else(|| ScannerError::parse(source_path, "not a go binary: no build info"))?;
    let header = data
        .get(start..start + BUILDINFO_HEADER_LEN)
        .ok_or_else(|| ScannerError::parse(source_path, "truncated build info header"))?;
    if header[15] & FLAG_INLINE_STRINGS == 0 {
        return Err(ScannerError::parse(
            source_path,
            "unsupported build info format (built before go 1.18)",
        ));
    }

    let mut cursor = start + BUILDINFO_HEADER_LEN;
    let _go_version = read_varint_string(data, &mut cursor)
        .ok_or_else(|| ScannerError::parse(source_path, "invalid go version string"))?;
    let mod_info = read_varint_string(data, &mut cursor)
        .ok_or_else(|| ScannerError::parse(source_path, "invalid module info string"))?;

    // 앞뒤 16바이트 센티널 제거
    let mod_info = if mod_info.len() >= 33 && mod_info[mod_info.len() - 17] == b'\n' {
        &mod_info[16..mod_info.len() - 16]
    } else {
        mod_info
    };
    let mod_info = String::from_utf8_lossy(mod_info);

    let mut out = ParseOutput::default();
    for line in mod_info.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        match fields.as_slice() {
            ["dep", path, version, rest @ ..] => {
                let mut library = Library::new(*path, *version);
                library.verification = module_hash(rest);
                out.libraries.push(library);
            }
            ["=>", path, version, rest @ ..] => {
                if let Some(last) = out.libraries.last_mut() {
                    *last = Library::new(*path, *version);
                    last.verification = module_hash(rest);
                }
            }
            _ => {}
        }
    }
    Ok(out)
}

fn module_hash(rest: &[&str]) -> Option<String> {
    rest.first()
        .filter(|h| !h.is_empty())
        .map(|h| (*h).to_owned())
}

fn find_magic(data: &[u8]) -> Option<usize> {
    data.windows(BUILDINFO_MAGIC.len())
        .position(|w| w == BUILDINFO_MAGIC)
}

fn read_varint_string<'a>(data: &'a [u8], cursor: &mut usize) -> Option<&'a [u8]> {
    let mut len: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = *data.get(*cursor)?;
        *cursor += 1;
        len |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 63 {
            return None;
        }
    }
    let len = usize::try_from(len).ok()?;
    let end = cursor.checked_add(len)?;
    let bytes = data.get(*cursor..end)?;
    *cursor = end;
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_GO_MOD: &str = r#"module github.com/org/repo

go 1.20

require (
	github.com/aquasecurity/go-dep-parser v0.0.0-20220406074731-71021a481237
	golang.org/x/xerrors v0.0.0-20200804184101-5ec99f83aff1 // indirect
)

exclude github.com/bad/module v1.0.0
"#;

    const SAMPLE_GO_MOD_116: &str = "module example.com/old\n\ngo 1.16\n\nrequire github.com/BurntSushi/toml v0.3.1\n";

    const SAMPLE_GO_SUM: &str = "\
github.com/BurntSushi/toml v0.3.1 h1:WXkYYl6Yr3qBf1K79EBnL4mak0OimBfB0XUf9Vl28OQ=
github.com/BurntSushi/toml v0.3.1/go.mod h1:xHWCNGjB5oqiDr8zfno3MHue2Ht5sIBksp03qcyfWMU=
github.com/davecgh/go-spew v1.1.1 h1:vj9j/u1bqnvCEfJOwUhtlOARqs3+rkHYY13jYWTU97c=
";

    fn build_info_blob(mod_info: &str) -> Vec<u8> {
        let mut data = b"\x7fELF padding".to_vec();
        data.extend_from_slice(BUILDINFO_MAGIC);
        data.push(8);
        data.push(FLAG_INLINE_STRINGS);
        data.resize(data.len() + 16, 0);
        let version = b"go1.20.5";
        data.push(version.len() as u8);
        data.extend_from_slice(version);
        let mut framed = vec![0u8; 16];
        framed.extend_from_slice(mod_info.as_bytes());
        framed.extend_from_slice(&[0u8; 16]);
        // 길이 < 128 가정하지 않고 varint로 인코딩
        let mut len = framed.len();
        while len >= 0x80 {
            data.push((len as u8 & 0x7f) | 0x80);
            len >>= 7;
        }
        data.push(len as u8);
        data.extend_from_slice(&framed);
        data
    }

    #[test]
    fn parse_go_mod_module_and_requirements() {
        let out = GoModParser.parse(SAMPLE_GO_MOD, "/go.mod").unwrap();
        assert_eq!(out.libraries.len(), 3);

        let module = &out.libraries[0];
        assert_eq!(module.name, "github.com/org/repo");
        assert_eq!(module.version, DEVEL_VERSION);
        let deps = out.depends_on(module).unwrap();
        assert_eq!(deps.and["golang.org/x/xerrors"], "0.0.0-20200804184101-5ec99f83aff1");

        let parser_dep = out.find("github.com/aquasecurity/go-dep-parser").unwrap();
        assert_eq!(parser_dep.version, "0.0.0-20220406074731-71021a481237");
        assert!(!parser_dep.indirect);
        assert!(out.find("golang.org/x/xerrors").unwrap().indirect);
    }

    #[test]
    fn go_sum_adds_hashes_and_missing_modules_before_117() {
        let sum = GoSum::parse(SAMPLE_GO_SUM);
        let out = parse_go_mod(SAMPLE_GO_MOD_116, Some(&sum), "/go.mod").unwrap();

        let toml = out.find("github.com/BurntSushi/toml").unwrap();
        assert_eq!(toml.version, "0.3.1");
        assert_eq!(
            toml.verification.as_deref(),
            Some("h1:WXkYYl6Yr3qBf1K79EBnL4mak0OimBfB0XUf9Vl28OQ=")
        );
        let spew = out.find("github.com/davecgh/go-spew").unwrap();
        assert!(spew.indirect);
    }

    #[test]
    fn go_sum_ignored_for_new_modules() {
        let sum = GoSum::parse(SAMPLE_GO_SUM);
        let out = parse_go_mod(SAMPLE_GO_MOD, Some(&sum), "/go.mod").unwrap();
        assert!(out.find("github.com/davecgh/go-spew").is_none());
    }

    #[test]
    fn replace_directive_substitutes_module() {
        let content = "module m\n\ngo 1.21\n\nrequire github.com/a/b v1.0.0\n\nreplace github.com/a/b => github.com/fork/b v1.0.1\n";
        let out = GoModParser.parse(content, "go.mod").unwrap();
        assert!(out.find("github.com/a/b").is_none());
        assert_eq!(out.find("github.com/fork/b").unwrap().version, "1.0.1");
    }

    #[test]
    fn malformed_go_mod_is_an_error() {
        assert!(GoModParser.parse("this is not a go.mod", "go.mod").is_err());
        assert!(GoModParser.parse("module m\nrequire (\n a\n)\n", "go.mod").is_err());
        assert!(GoModParser.parse("go 1.20\n", "go.mod").is_err());
        assert!(GoModParser.parse("module m\nrequire (\n", "go.mod").is_err());
    }

    #[test]
    fn parse_build_info_keeps_v_prefix() {
        let mod_info = "path\tgithub.com/org/tool\nmod\tgithub.com/org/tool\t(devel)\t\n\
dep\tgithub.com/aquasecurity/go-version\tv0.0.0-20210121072130-637058cfe492\th1:abc=\n\
dep\tgolang.org/x/xerrors\tv0.0.0-20200804184101-5ec99f83aff1\th1:def=\n\
dep\tgithub.com/old/mod\tv1.0.0\n\
=>\tgithub.com/new/mod\tv1.1.0\th1:ghi=\n";
        let data = build_info_blob(mod_info);
        assert!(has_build_info(&data));

        let out = parse_build_info(&data, "/usr/bin/tool").unwrap();
        let ids: Vec<_> = out.libraries.iter().map(|l| l.id()).collect();
        assert_eq!(
            ids,
            vec![
                "github.com/aquasecurity/go-version@v0.0.0-20210121072130-637058cfe492",
                "golang.org/x/xerrors@v0.0.0-20200804184101-5ec99f83aff1",
                "github.com/new/mod@v1.1.0",
            ]
        );
        assert_eq!(out.libraries[2].verification.as_deref(), Some("h1:ghi="));
    }

    #[test]
    fn binary_without_build_info_is_an_error() {
        assert!(!has_build_info(b"\x7fELF plain"));
        assert!(parse_build_info(b"\x7fELF plain", "/bin/true").is_err());
    }
}
