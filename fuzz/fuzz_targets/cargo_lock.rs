#![no_main]

use depscan_scanner::parser::ManifestParser;
use depscan_scanner::parser::cargo::CargoLockParser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        let _ = CargoLockParser.parse(content, "fuzz/Cargo.lock");
    }
});
