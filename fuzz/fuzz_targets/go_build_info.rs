#![no_main]

use depscan_scanner::parser::golang::{has_build_info, parse_build_info};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if has_build_info(data) {
        let _ = parse_build_info(data, "fuzz/bin/app");
    }
});
