#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use stcodec_io::{DType, Metadata, RawTensor, SafeTensors, serialize};

/// Structured tensor description; sizes are reduced to stay small.
#[derive(Arbitrary, Debug)]
struct Input {
    tensors: Vec<(String, u8, Vec<u8>)>,
    metadata: Vec<(String, String)>,
}

fuzz_target!(|input: Input| {
    let mut tensors = Vec::new();
    for (name, tag, dims) in input.tensors.into_iter().take(8) {
        let dtype = DType::ALL[usize::from(tag) % DType::ALL.len()];
        let shape: Vec<u64> = dims.iter().take(3).map(|d| u64::from(d % 5)).collect();
        let len = shape.iter().product::<u64>() as usize * dtype.size();
        let Ok(raw) = RawTensor::new(name, dtype, shape, vec![0xA5; len]) else {
            continue;
        };
        tensors.push(raw);
    }
    let metadata: Metadata = input.metadata.into_iter().take(4).collect();

    // Duplicate or reserved names are rejected; anything else must round-trip.
    let Ok(bytes) = serialize(tensors.iter().map(|t| (t.name(), t)), Some(metadata.clone())) else {
        return;
    };
    let st = SafeTensors::deserialize(&bytes)
        .unwrap_or_else(|e| panic!("serialized output failed to deserialize: {e}"));
    assert_eq!(st.metadata(), &metadata);
    for t in &tensors {
        let view = st.tensor(t.name()).expect("serialized tensor is present");
        assert_eq!(view.dtype(), t.dtype());
        assert_eq!(view.shape(), t.shape());
        assert_eq!(view.data(), t.data());
    }
});
