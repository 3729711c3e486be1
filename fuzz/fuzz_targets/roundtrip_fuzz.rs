#![no_main]
use libfuzzer_sys::fuzz_target;
use tamp_compression::{compress_to_vec, decompress_to_vec, Conf};

fuzz_target!(|data: &[u8]| {
    let compressed = compress_to_vec(Conf::new(), data).expect("8-bit literals cannot overflow");
    let restored = decompress_to_vec(&compressed).expect("own output must decode");
    assert_eq!(restored, data, "round trip diverged");
});
