#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary file images must be rejected with an error, never a panic
    let _ = symdex::index::disk::read_header(data);
});
