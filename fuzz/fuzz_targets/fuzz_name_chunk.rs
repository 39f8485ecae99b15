#![no_main]

use libfuzzer_sys::fuzz_target;
use symdex::index::disk::names::read_chunk;
use symdex::utils::ByteReader;

fuzz_target!(|data: &[u8]| {
    let Some((&count, rest)) = data.split_first() else {
        return;
    };
    let mut reader = ByteReader::new(rest);
    let _ = read_chunk(&mut reader, count as usize);
});
