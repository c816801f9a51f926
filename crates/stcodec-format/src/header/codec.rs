//! JSON header framing: `[u64 LE length][padded JSON][byte buffer]`.

use std::fmt;
use std::io::{Read, Write};
use std::marker::PhantomData;

use serde::de::{Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{DataOffsets, Header, Metadata, TensorInfo};
use crate::config::ReadConfig;
use crate::dtype::DType;
use crate::error::{Error, HeaderViolation, Result, Stage};
use crate::math::{Computation, checked_add};
use crate::{HEADER_ALIGNMENT, METADATA_KEY, MIN_HEADER_SIZE};

const LENGTH_PREFIX: u64 = 8;

/// Read the length prefix and JSON header from `reader`.
///
/// Leaves the reader positioned at the first byte of the byte buffer. The
/// returned header is not validated and its `buffer_offset` is relative to
/// where reading began.
pub fn decode_header<R: Read>(reader: &mut R, config: &ReadConfig) -> Result<Header> {
    let mut prefix = Vec::with_capacity(LENGTH_PREFIX as usize);
    reader
        .by_ref()
        .take(LENGTH_PREFIX)
        .read_to_end(&mut prefix)
        .map_err(Error::io(Stage::HeaderLength))?;
    let prefix: [u8; 8] = prefix.as_slice().try_into().map_err(|_| Error::Truncated {
        stage: Stage::HeaderLength,
        expected: LENGTH_PREFIX,
        actual: prefix.len() as u64,
    })?;

    let n = u64::from_le_bytes(prefix);
    if n < MIN_HEADER_SIZE {
        return Err(Error::malformed(format!(
            "header length {n} is below the minimum of {MIN_HEADER_SIZE} bytes"
        )));
    }
    if n > config.header_size_limit {
        return Err(Error::malformed(format!(
            "header length {n} exceeds the limit of {} bytes",
            config.header_size_limit
        )));
    }
    let buffer_offset = checked_add(LENGTH_PREFIX, n, Computation::HeaderLength)?;

    // Grows with the bytes actually present, not with the declared length.
    let mut json = Vec::new();
    reader.by_ref().take(n).read_to_end(&mut json).map_err(Error::io(Stage::HeaderJson))?;
    if (json.len() as u64) < n {
        return Err(Error::Truncated {
            stage: Stage::HeaderJson,
            expected: n,
            actual: json.len() as u64,
        });
    }

    let mut header = parse_json(&json)?;
    header.buffer_offset = buffer_offset;
    debug!(header_len = n, tensors = header.len(), "decoded header");
    Ok(header)
}

/// Validate `header` and encode it as length prefix plus space-padded JSON.
pub fn encode_header(header: &Header) -> Result<Vec<u8>> {
    let buffer_len = header.validate()?;

    let mut json = serde_json::to_vec(&HeaderJson(header))
        .map_err(|e| Error::malformed(format!("cannot encode header: {e}")))?;
    let padded = json.len().next_multiple_of(HEADER_ALIGNMENT);
    json.resize(padded, b' ');

    let mut out = Vec::with_capacity(json.len() + LENGTH_PREFIX as usize);
    out.extend_from_slice(&(json.len() as u64).to_le_bytes());
    out.extend_from_slice(&json);
    debug!(header_len = json.len(), tensors = header.len(), buffer_len, "encoded header");
    Ok(out)
}

/// Encode `header` and write it to `writer`; returns the bytes written,
/// which is also the offset of the byte buffer.
pub fn write_header<W: Write>(writer: &mut W, header: &Header) -> Result<u64> {
    let bytes = encode_header(header)?;
    writer.write_all(&bytes).map_err(Error::io(Stage::HeaderWrite))?;
    Ok(bytes.len() as u64)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// `__metadata__` first when present, then tensors in offset order.
struct HeaderJson<'a>(&'a Header);

impl Serialize for HeaderJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let header = self.0;
        let has_metadata = !header.metadata.is_empty();
        let mut map = serializer.serialize_map(Some(header.len() + usize::from(has_metadata)))?;
        if has_metadata {
            map.serialize_entry(METADATA_KEY, &header.metadata)?;
        }
        for info in header.sorted_by_offsets() {
            map.serialize_entry(&info.name, info)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Object entries in document order, duplicates included.
struct EntriesVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
    type Value = Vec<(String, V)>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::new();
        while let Some(entry) = map.next_entry::<String, V>()? {
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// A top-level value. Objects keep their raw entries so repeated keys
/// one level down stay visible.
enum Node {
    Object(Vec<(String, Value)>),
    Other(Value),
}

impl Node {
    fn describe(&self) -> &'static str {
        match self {
            Node::Object(_) => "an object",
            Node::Other(value) => describe(value),
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct NodeVisitor;

        impl<'de> Visitor<'de> for NodeVisitor {
            type Value = Node;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("any JSON value")
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> std::result::Result<Node, A::Error> {
                EntriesVisitor(PhantomData).visit_map(map).map(Node::Object)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Node, A::Error> {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<Value>()? {
                    items.push(item);
                }
                Ok(Node::Other(Value::Array(items)))
            }

            fn visit_bool<E>(self, v: bool) -> std::result::Result<Node, E> {
                Ok(Node::Other(Value::Bool(v)))
            }

            fn visit_i64<E>(self, v: i64) -> std::result::Result<Node, E> {
                Ok(Node::Other(Value::from(v)))
            }

            fn visit_u64<E>(self, v: u64) -> std::result::Result<Node, E> {
                Ok(Node::Other(Value::from(v)))
            }

            fn visit_f64<E>(self, v: f64) -> std::result::Result<Node, E> {
                Ok(Node::Other(Value::from(v)))
            }

            fn visit_str<E>(self, v: &str) -> std::result::Result<Node, E> {
                Ok(Node::Other(Value::String(v.to_owned())))
            }

            fn visit_string<E>(self, v: String) -> std::result::Result<Node, E> {
                Ok(Node::Other(Value::String(v)))
            }

            fn visit_unit<E>(self) -> std::result::Result<Node, E> {
                Ok(Node::Other(Value::Null))
            }
        }

        deserializer.deserialize_any(NodeVisitor)
    }
}

fn parse_json(json: &[u8]) -> Result<Header> {
    let mut de = serde_json::Deserializer::from_slice(json);
    let entries = (&mut de)
        .deserialize_map(EntriesVisitor::<Node>(PhantomData))
        .map_err(|e| Error::malformed(format!("invalid header JSON: {e}")))?;
    de.end().map_err(|e| Error::malformed(format!("trailing data after header JSON: {e}")))?;

    let mut header = Header::new();
    let mut seen_metadata = false;
    for (key, node) in entries {
        if key == METADATA_KEY {
            if seen_metadata {
                return Err(Error::malformed(format!("duplicate {METADATA_KEY:?} entry")));
            }
            seen_metadata = true;
            header.metadata = parse_metadata(node)?;
            continue;
        }
        if header.tensors.contains_key(&key) {
            return Err(Error::malformed(format!("duplicate tensor name {key:?}")));
        }
        let info = parse_tensor(key, node)?;
        header.tensors.insert(info.name.clone(), info);
    }
    Ok(header)
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_metadata(node: Node) -> Result<Metadata> {
    let found = node.describe();
    let Node::Object(fields) = node else {
        return Err(Error::malformed(format!(
            "{METADATA_KEY:?}: expected an object of strings, found {found}"
        )));
    };
    let mut metadata = Metadata::new();
    for (k, v) in fields {
        let s = match v {
            Value::String(s) => s,
            other => {
                return Err(Error::malformed(format!(
                    "{METADATA_KEY:?} entry {k:?}: expected a string, found {}",
                    describe(&other)
                )));
            }
        };
        if metadata.contains_key(&k) {
            return Err(Error::malformed(format!("{METADATA_KEY:?}: duplicate key {k:?}")));
        }
        metadata.insert(k, s);
    }
    Ok(metadata)
}

fn parse_tensor(name: String, node: Node) -> Result<TensorInfo> {
    let found = node.describe();
    let Node::Object(fields) = node else {
        return Err(Error::malformed(format!("tensor {name:?}: expected an object, found {found}")));
    };

    let mut dtype = None;
    let mut shape = None;
    let mut offsets = None;
    for (field, value) in fields {
        let repeated = match field.as_str() {
            "dtype" => dtype.replace(parse_dtype(&name, value)?).is_some(),
            "shape" => shape.replace(parse_shape(&name, value)?).is_some(),
            "data_offsets" => offsets.replace(parse_offsets(&name, value)?).is_some(),
            other => {
                return Err(Error::malformed(format!("tensor {name:?}: unknown field {other:?}")));
            }
        };
        if repeated {
            return Err(Error::malformed(format!("tensor {name:?}: duplicate field {field:?}")));
        }
    }

    let missing = |field: &str| Error::malformed(format!("tensor {name:?}: missing field {field:?}"));
    let dtype = dtype.ok_or_else(|| missing("dtype"))?;
    let shape = shape.ok_or_else(|| missing("shape"))?;
    let data_offsets = offsets.ok_or_else(|| missing("data_offsets"))?;
    Ok(TensorInfo { name, dtype, shape, data_offsets })
}

fn parse_dtype(name: &str, value: Value) -> Result<DType> {
    match value {
        Value::String(tag) => {
            tag.parse().map_err(|e| Error::malformed(format!("tensor {name:?}: {e}")))
        }
        other => Err(Error::malformed(format!(
            "tensor {name:?}: \"dtype\" must be a string, found {}",
            describe(&other)
        ))),
    }
}

fn parse_shape(name: &str, value: Value) -> Result<Vec<u64>> {
    let found = describe(&value);
    let Value::Array(dims) = value else {
        return Err(Error::malformed(format!(
            "tensor {name:?}: \"shape\" must be an array, found {}",
            found
        )));
    };
    dims.into_iter()
        .enumerate()
        .map(|(index, dim)| {
            if let Value::Number(n) = &dim {
                if let Some(v) = n.as_u64() {
                    return Ok(v);
                }
                if let Some(v) = n.as_i64() {
                    return Err(Error::from(HeaderViolation::NegativeDimension {
                        tensor: name.to_string(),
                        index,
                        value: v,
                    }));
                }
            }
            Err(Error::malformed(format!(
                "tensor {name:?}: shape[{index}] = {dim} is not an unsigned 64-bit integer"
            )))
        })
        .collect()
}

fn parse_offsets(name: &str, value: Value) -> Result<DataOffsets> {
    let bad = |value: &Value| {
        Error::malformed(format!(
            "tensor {name:?}: \"data_offsets\" must be two unsigned 64-bit integers, found {value}"
        ))
    };
    match &value {
        Value::Array(pair) if pair.len() == 2 => match (pair[0].as_u64(), pair[1].as_u64()) {
            (Some(begin), Some(end)) => Ok(DataOffsets { begin, end }),
            _ => Err(bad(&value)),
        },
        _ => Err(bad(&value)),
    }
}
