#![no_main]
use libfuzzer_sys::fuzz_target;
use tamp_compression::Decompressor;

// Arbitrary bytes must decode to a value (output or error), never a panic
// or an out-of-window read.
fuzz_target!(|data: &[u8]| {
    let mut decompressor = Decompressor::new();
    let mut pending = data;
    let mut buffer = [0u8; 4096];
    loop {
        match decompressor.decompress(pending, &mut buffer) {
            Ok(fed) => {
                pending = &pending[fed.consumed..];
                if fed.status == tamp_compression::Status::InputExhausted && pending.is_empty() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
});
