#![no_main]

use depscan_scanner::parser::ManifestParser;
use depscan_scanner::parser::golang::GoModParser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        let _ = GoModParser.parse(content, "fuzz/go.mod");
    }
});
