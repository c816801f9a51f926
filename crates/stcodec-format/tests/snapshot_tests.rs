//! Snapshot tests pinning encoded header bytes and error messages.

use stcodec_format::{
    DType, DataOffsets, Header, HeaderViolation, ReadConfig, TensorInfo, decode_header,
    encode_header,
};

fn frame(json: &str) -> Vec<u8> {
    let mut v = (json.len() as u64).to_le_bytes().to_vec();
    v.extend_from_slice(json.as_bytes());
    v
}

fn decode_err(json: &str) -> String {
    decode_header(&mut frame(json).as_slice(), &ReadConfig::default()).unwrap_err().to_string()
}

fn validate_err(json: &str) -> String {
    let header = decode_header(&mut frame(json).as_slice(), &ReadConfig::default()).unwrap();
    header.validate().unwrap_err().to_string()
}

#[test]
fn single_f32_tensor_header_bytes() {
    let mut header = Header::new();
    header
        .insert(TensorInfo::new("attn.0", DType::F32, vec![1, 2, 3], DataOffsets::new(0, 24)))
        .unwrap();
    let bytes = encode_header(&header).unwrap();

    assert_eq!(&bytes[..8], &64u64.to_le_bytes());
    let json = std::str::from_utf8(&bytes[8..]).unwrap();
    insta::assert_snapshot!(json, @r#"{"attn.0":{"dtype":"F32","shape":[1,2,3],"data_offsets":[0,24]}}"#);
}

#[test]
fn empty_header_bytes() {
    let bytes = encode_header(&Header::new()).unwrap();
    insta::assert_snapshot!(format!("{bytes:?}"), @"[8, 0, 0, 0, 0, 0, 0, 0, 123, 125, 32, 32, 32, 32, 32, 32]");
}

#[test]
fn offset_mismatch_message() {
    let msg = validate_err(r#"{"t":{"dtype":"I32","shape":[1],"data_offsets":[1,5]}}"#);
    insta::assert_snapshot!(msg, @r#"invalid header: tensor "t": expected data offsets to begin at 0, found 1"#);
}

#[test]
fn size_mismatch_message() {
    let msg = validate_err(r#"{"w":{"dtype":"F32","shape":[2,2],"data_offsets":[0,12]}}"#);
    insta::assert_snapshot!(msg, @r#"invalid header: tensor "w": F32 shape [2, 2] needs 16 bytes, data offsets span 12"#);
}

#[test]
fn element_count_overflow_message() {
    let msg = validate_err(
        r#"{"big":{"dtype":"I32","shape":[2,18446744073709551614],"data_offsets":[0,8]}}"#,
    );
    insta::assert_snapshot!(msg, @r#"tensor "big": overflow computing element count: 2 * 18446744073709551614 exceeds u64"#);
}

#[test]
fn unknown_dtype_message() {
    let msg = decode_err(r#"{"a":{"dtype":"F8","shape":[1],"data_offsets":[0,1]}}"#);
    insta::assert_snapshot!(msg, @r#"malformed header: tensor "a": invalid data type tag "F8""#);
}

#[test]
fn unknown_field_message() {
    let msg = decode_err(r#"{"a":{"dtype":"U8","shape":[1],"data_offsets":[0,1],"order":"C"}}"#);
    insta::assert_snapshot!(msg, @r#"malformed header: tensor "a": unknown field "order""#);
}

#[test]
fn repeated_tensor_field_message() {
    let msg = decode_err(r#"{"a":{"dtype":"F32","dtype":"U8","shape":[1],"data_offsets":[0,1]}}"#);
    insta::assert_snapshot!(msg, @r#"malformed header: tensor "a": duplicate field "dtype""#);
}

#[test]
fn repeated_metadata_key_message() {
    let msg = decode_err(r#"{"__metadata__":{"k":"first","k":"second"}}"#);
    insta::assert_snapshot!(msg, @r#"malformed header: "__metadata__": duplicate key "k""#);
}

#[test]
fn non_string_metadata_message() {
    let msg = decode_err(r#"{"__metadata__":{"epoch":3}}"#);
    insta::assert_snapshot!(msg, @r#"malformed header: "__metadata__" entry "epoch": expected a string, found a number"#);
}

#[test]
fn negative_dimension_message() {
    let msg = HeaderViolation::NegativeDimension { tensor: "a".into(), index: 0, value: -1 };
    insta::assert_snapshot!(msg.to_string(), @r#"tensor "a": negative dimension -1 at shape index 0"#);
}

#[test]
fn header_limit_message() {
    let mut bytes = 200u64.to_le_bytes().to_vec();
    bytes.extend_from_slice(&[b' '; 200]);
    let cfg = ReadConfig::default().with_header_size_limit(100);
    let msg = decode_header(&mut bytes.as_slice(), &cfg).unwrap_err().to_string();
    insta::assert_snapshot!(msg, @"malformed header: header length 200 exceeds the limit of 100 bytes");
}

#[test]
fn truncated_length_message() {
    let msg = decode_header(&mut &[0u8, 1, 2][..], &ReadConfig::default()).unwrap_err().to_string();
    insta::assert_snapshot!(msg, @"truncated while reading header length: expected 8 bytes, got 3");
}
