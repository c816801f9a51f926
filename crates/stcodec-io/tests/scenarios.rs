//! End-to-end behaviour on small, fully specified files.

use std::io::Cursor;

use stcodec_io::{
    DType, Error, ErrorKind, LazySafeTensors, Metadata, SafeTensors, Tensor, TensorData,
    read_all, read_all_raw, serialize, serialize_to_writer,
};

const I32_WITH_METADATA: &str =
    r#"{"test":{"dtype":"I32","shape":[2,2],"data_offsets":[0,16]},"__metadata__":{"foo":"bar"}}"#;

fn file(json: &str, buffer: &[u8]) -> Vec<u8> {
    let mut v = (json.len() as u64).to_le_bytes().to_vec();
    v.extend_from_slice(json.as_bytes());
    v.extend_from_slice(buffer);
    v
}

// ---------------------------------------------------------------------------
// Decoding a hand-written file
// ---------------------------------------------------------------------------

#[test]
fn i32_tensor_with_metadata_eager() {
    let bytes = file(I32_WITH_METADATA, &[0; 16]);
    let loaded = read_all(bytes.as_slice()).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.metadata, Metadata::from([("foo".to_string(), "bar".to_string())]));

    let t = loaded.get("test").unwrap();
    assert_eq!(t.dtype(), DType::I32);
    assert_eq!(t.shape(), [2, 2]);
    assert_eq!(t.data(), &TensorData::I32(vec![0; 4]));

    let raw = read_all_raw(bytes.as_slice()).unwrap();
    assert_eq!(raw.get("test").unwrap().data(), [0; 16]);
}

#[test]
fn i32_tensor_with_metadata_lazy_and_borrowed() {
    let bytes = file(I32_WITH_METADATA, &[0; 16]);

    let lazy = LazySafeTensors::open(Cursor::new(bytes.as_slice())).unwrap();
    assert_eq!(lazy.metadata()["foo"], "bar");
    assert_eq!(lazy.data_start(), 8 + 0x59);
    assert_eq!(lazy.tensor("test").unwrap().read_bytes().unwrap(), [0; 16]);

    let st = SafeTensors::deserialize(&bytes).unwrap();
    assert_eq!(st.tensor("test").unwrap().data(), [0; 16]);
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

#[test]
fn single_f32_tensor_exact_bytes() {
    let attn = Tensor::new("attn.0", vec![1, 2, 3], vec![0f32, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    let bytes = serialize([("attn.0", &attn)], None).unwrap();

    let json = br#"{"attn.0":{"dtype":"F32","shape":[1,2,3],"data_offsets":[0,24]}}"#;
    let mut expected = 64u64.to_le_bytes().to_vec();
    expected.extend_from_slice(json);
    expected.extend_from_slice(&[
        0x00, 0x00, 0x00, 0x00, //
        0x00, 0x00, 0x80, 0x3F, //
        0x00, 0x00, 0x00, 0x40, //
        0x00, 0x00, 0x40, 0x40, //
        0x00, 0x00, 0x80, 0x40, //
        0x00, 0x00, 0xA0, 0x40,
    ]);
    assert_eq!(json.len(), 64);
    assert_eq!(bytes, expected);

    let mut streamed = Vec::new();
    serialize_to_writer([("attn.0", &attn)], None, &mut streamed).unwrap();
    assert_eq!(streamed, expected);
}

#[test]
fn metadata_is_emitted_only_when_present() {
    let t = Tensor::new("t", vec![], vec![1u8]).unwrap();
    let without = serialize([("t", &t)], Some(Metadata::new())).unwrap();
    assert!(!String::from_utf8_lossy(&without).contains("__metadata__"));

    let meta = Metadata::from([("format".to_string(), "pt".to_string())]);
    let with = serialize([("t", &t)], Some(meta.clone())).unwrap();
    assert_eq!(read_all(with.as_slice()).unwrap().metadata, meta);
}

// ---------------------------------------------------------------------------
// Rejected input
// ---------------------------------------------------------------------------

#[test]
fn offset_not_at_zero_is_an_offset_mismatch() {
    let bytes = file(r#"{"t":{"dtype":"I32","shape":[1],"data_offsets":[1,5]}}"#, &[0; 5]);
    let err = read_all(bytes.as_slice()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidHeader);
    assert!(err.to_string().contains("expected data offsets to begin at 0, found 1"), "{err}");
}

#[test]
fn huge_shape_is_an_element_count_overflow() {
    let json = r#"{"t":{"dtype":"I32","shape":[2,18446744073709551614],"data_offsets":[0,16]}}"#;
    let bytes = file(json, &[0; 16]);
    for err in [
        read_all(bytes.as_slice()).unwrap_err(),
        LazySafeTensors::open(Cursor::new(&bytes)).unwrap_err(),
        SafeTensors::deserialize(&bytes).unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::Overflow);
        assert!(err.to_string().contains("element count"), "{err}");
    }
}

#[test]
fn truncated_tensor_data_names_the_tensor() {
    let bytes = file(I32_WITH_METADATA, &[0; 10]);
    let err = read_all(bytes.as_slice()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Truncated);
    match &err {
        Error::Tensor { name, source } => {
            assert_eq!(name, "test");
            assert!(matches!(**source, Error::Truncated { expected: 16, actual: 10, .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn scalar_and_zero_element_shapes_stay_distinct() {
    let scalar = Tensor::new("scalar", vec![], vec![42i64]).unwrap();
    let empty = Tensor::new("empty", vec![3, 0], Vec::<i64>::new()).unwrap();
    let bytes = serialize([("scalar", &scalar), ("empty", &empty)], None).unwrap();

    let loaded = read_all(bytes.as_slice()).unwrap();
    let s = loaded.get("scalar").unwrap();
    assert_eq!(s.shape(), [] as [u64; 0]);
    assert_eq!(s.values::<i64>(), Some(&[42][..]));
    let e = loaded.get("empty").unwrap();
    assert_eq!(e.shape(), [3, 0]);
    assert!(e.data().is_empty());

    let st = SafeTensors::deserialize(&bytes).unwrap();
    assert_eq!(st.tensor("scalar").unwrap().data().len(), 8);
    assert!(st.tensor("empty").unwrap().data().is_empty());
}

#[test]
fn trailing_bytes_after_the_buffer() {
    let bytes = file(I32_WITH_METADATA, &[0; 20]);
    // Streams stop after the declared buffer; an in-memory file must be exact.
    assert!(read_all(bytes.as_slice()).is_ok());
    assert_eq!(SafeTensors::deserialize(&bytes).unwrap_err().kind(), ErrorKind::InvalidHeader);
}
