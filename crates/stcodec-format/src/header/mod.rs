//! In-memory model of a safetensors header.

mod codec;
mod validate;

use std::collections::BTreeMap;

use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};

use crate::METADATA_KEY;
use crate::dtype::DType;
use crate::error::{Error, HeaderViolation, Result};
use crate::math::{self, Overflow};

pub use codec::{decode_header, encode_header, write_header};
pub use validate::validate;

/// Free-form string metadata stored under the reserved `__metadata__` key.
pub type Metadata = BTreeMap<String, String>;

/// Half-open byte range `[begin, end)` inside the byte buffer.
///
/// Ordering is by `begin`, then `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DataOffsets {
    pub begin: u64,
    pub end: u64,
}

impl DataOffsets {
    pub const fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    /// Number of bytes covered. Zero for a reversed range.
    pub const fn len(&self) -> u64 {
        self.end.saturating_sub(self.begin)
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for DataOffsets {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut t = serializer.serialize_tuple(2)?;
        t.serialize_element(&self.begin)?;
        t.serialize_element(&self.end)?;
        t.end()
    }
}

/// Description of one tensor: element type, shape and byte range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TensorInfo {
    #[serde(skip)]
    pub name: String,
    pub dtype: DType,
    pub shape: Vec<u64>,
    pub data_offsets: DataOffsets,
}

impl TensorInfo {
    pub fn new(
        name: impl Into<String>,
        dtype: DType,
        shape: Vec<u64>,
        data_offsets: DataOffsets,
    ) -> Self {
        Self { name: name.into(), dtype, shape, data_offsets }
    }

    pub fn element_count(&self) -> std::result::Result<u64, Overflow> {
        math::element_count(&self.shape)
    }

    /// Bytes required by `shape` and `dtype`, independent of `data_offsets`.
    pub fn byte_size(&self) -> std::result::Result<u64, Overflow> {
        math::byte_size(&self.shape, self.dtype)
    }
}

/// Tensor descriptions keyed by name, optional metadata, and the position of
/// the byte buffer relative to where the header began.
///
/// A `Header` is not guaranteed to be consistent until [`Header::validate`]
/// succeeds. Decoding never validates on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub tensors: BTreeMap<String, TensorInfo>,
    /// Empty when the header carries no `__metadata__` entry.
    pub metadata: Metadata,
    /// `8 + N` for a decoded header of JSON length `N`.
    pub buffer_offset: u64,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(metadata: Metadata) -> Self {
        Self { metadata, ..Self::default() }
    }

    /// Add a tensor description keyed by its own name.
    pub fn insert(&mut self, info: TensorInfo) -> Result<()> {
        if info.name == METADATA_KEY {
            return Err(Error::malformed(format!("tensor name {METADATA_KEY:?} is reserved")));
        }
        if self.tensors.contains_key(&info.name) {
            return Err(HeaderViolation::DuplicateName(info.name).into());
        }
        self.tensors.insert(info.name.clone(), info);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TensorInfo> {
        self.tensors.get(name)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Tensor descriptions in ascending `(begin, end)` order, ties by name.
    pub fn sorted_by_offsets(&self) -> Vec<&TensorInfo> {
        let mut infos: Vec<&TensorInfo> = self.tensors.values().collect();
        infos.sort_by_key(|info| info.data_offsets);
        infos
    }

    /// Check every consistency rule; returns the byte buffer length.
    pub fn validate(&self) -> Result<u64> {
        validate(self)
    }
}
