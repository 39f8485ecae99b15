#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let symbols = symdex::utils::extract_symbols(data);
    assert!(symbols.declarations.is_disjoint(&symbols.references));
});
