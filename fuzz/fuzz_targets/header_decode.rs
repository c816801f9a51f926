#![no_main]

use libfuzzer_sys::fuzz_target;
use stcodec_format::{ReadConfig, decode_header, encode_header};

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes may fail but must never panic. A small limit
    // keeps hostile length prefixes cheap.
    let config = ReadConfig::default().with_header_size_limit(1 << 20);
    let Ok(header) = decode_header(&mut &data[..], &config) else {
        return;
    };

    // Anything that validates must re-encode, and the encoding must decode to
    // the same tensors and metadata.
    if header.validate().is_ok() {
        let bytes = match encode_header(&header) {
            Ok(b) => b,
            Err(e) => panic!("valid header failed to encode: {e}"),
        };
        assert_eq!(bytes.len() % 8, 0, "encoded header must keep the buffer aligned");
        let again = decode_header(&mut bytes.as_slice(), &ReadConfig::unlimited())
            .unwrap_or_else(|e| panic!("re-encoded header failed to decode: {e}"));
        assert_eq!(again.tensors, header.tensors);
        assert_eq!(again.metadata, header.metadata);
    }
});
