#![no_main]

use libfuzzer_sys::fuzz_target;
use stcodec_io::{ReadConfig, SafeTensors, read_all_raw_with_config};

fuzz_target!(|data: &[u8]| {
    let config = ReadConfig::default().with_header_size_limit(1 << 20);

    // In-memory and streaming paths must agree on every tensor they accept.
    let Ok(st) = SafeTensors::deserialize_with_config(data, &config) else {
        return;
    };
    let loaded = read_all_raw_with_config(data, &config)
        .unwrap_or_else(|e| panic!("stream read rejected an accepted buffer: {e}"));
    assert_eq!(loaded.len(), st.len());
    for raw in &loaded.tensors {
        let view = st.tensor(raw.name()).expect("tensor listed by both readers");
        assert_eq!(view.data(), raw.data());
        let _ = view.to_data();
    }
});
