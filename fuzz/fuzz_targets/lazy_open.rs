#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use stcodec_io::{LazySafeTensors, ReadConfig};

fuzz_target!(|data: &[u8]| {
    let config = ReadConfig::default().with_header_size_limit(1 << 20);
    let Ok(lazy) = LazySafeTensors::open_with_config(Cursor::new(data), &config) else {
        return;
    };

    // Every handle read may fail on a short buffer, but never panic.
    for tensor in lazy.tensors() {
        let _ = tensor.read_bytes();
        let _ = tensor.read_tensor();
        let _ = tensor.copy_to(&mut std::io::sink());
    }
});
