//! Snapshot tests pinning the user-facing text of read and write errors.

use stcodec_io::{DType, SafeTensors, Tensor, TensorData, read_all};

const JSON: &str = r#"{"test":{"dtype":"I32","shape":[2,2],"data_offsets":[0,16]}}"#;

fn file(buffer: &[u8]) -> Vec<u8> {
    let mut v = (JSON.len() as u64).to_le_bytes().to_vec();
    v.extend_from_slice(JSON.as_bytes());
    v.extend_from_slice(buffer);
    v
}

#[test]
fn snapshot_truncated_tensor_names_the_tensor() {
    let err = read_all(file(&[0; 10]).as_slice()).unwrap_err();
    insta::assert_snapshot!(
        err.to_string(),
        @r#"tensor "test": truncated while reading tensor data: expected 16 bytes, got 10"#
    );
}

#[test]
fn snapshot_trailing_bytes_in_memory() {
    let bytes = file(&[0; 17]);
    let err = SafeTensors::deserialize(&bytes).unwrap_err();
    insta::assert_snapshot!(
        err.to_string(),
        @"invalid header: byte buffer holds 17 bytes, header describes 16"
    );
}

#[test]
fn snapshot_tensor_construction_errors() {
    let shape = Tensor::new("t", vec![2, 2], vec![1f32, 2.0, 3.0]).unwrap_err();
    insta::assert_snapshot!(shape.to_string(), @"shape [2, 2] describes 4 elements, data holds 3");

    let dtype = Tensor::with_dtype("t", DType::F32, vec![1], vec![1i32]).unwrap_err();
    insta::assert_snapshot!(dtype.to_string(), @"data type mismatch: declared F32, data holds I32");

    let partial = TensorData::decode(DType::F32, &[0; 6]).unwrap_err();
    insta::assert_snapshot!(partial.to_string(), @"expected 4 data bytes, got 6");
}
