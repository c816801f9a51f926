//! Element data types understood by the safetensors format.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when a data type cannot be recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DTypeError {
    #[error("invalid data type tag {0:?}")]
    UnknownTag(String),
    #[error("invalid data type value {0}")]
    UnknownValue(u8),
}

/// Element type of a tensor.
///
/// Declaration order is the total order used when laying out tensors for
/// serialization: element size never decreases along it, so sorting in
/// descending order groups the widest elements first and keeps every tensor
/// naturally aligned inside the byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DType {
    #[serde(rename = "BOOL")]
    Bool = 0,
    U8 = 1,
    I8 = 2,
    I16 = 3,
    U16 = 4,
    /// IEEE half precision, carried as opaque 16-bit values.
    F16 = 5,
    /// Brain floating point, carried as opaque 16-bit values.
    BF16 = 6,
    I32 = 7,
    U32 = 8,
    F32 = 9,
    F64 = 10,
    I64 = 11,
    U64 = 12,
}

impl DType {
    /// Every supported data type, in ascending order.
    pub const ALL: [DType; 13] = [
        DType::Bool,
        DType::U8,
        DType::I8,
        DType::I16,
        DType::U16,
        DType::F16,
        DType::BF16,
        DType::I32,
        DType::U32,
        DType::F32,
        DType::F64,
        DType::I64,
        DType::U64,
    ];

    /// Size in bytes of a single element.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            DType::Bool | DType::U8 | DType::I8 => 1,
            DType::I16 | DType::U16 | DType::F16 | DType::BF16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::F64 | DType::I64 | DType::U64 => 8,
        }
    }

    /// The textual tag used in headers (`"BOOL"`, `"U8"`, ...).
    pub const fn as_str(self) -> &'static str {
        match self {
            DType::Bool => "BOOL",
            DType::U8 => "U8",
            DType::I8 => "I8",
            DType::I16 => "I16",
            DType::U16 => "U16",
            DType::F16 => "F16",
            DType::BF16 => "BF16",
            DType::I32 => "I32",
            DType::U32 => "U32",
            DType::F32 => "F32",
            DType::F64 => "F64",
            DType::I64 => "I64",
            DType::U64 => "U64",
        }
    }

    /// Convert from the raw numeric discriminant.
    pub fn from_u8(v: u8) -> Result<Self, DTypeError> {
        match v {
            0 => Ok(DType::Bool),
            1 => Ok(DType::U8),
            2 => Ok(DType::I8),
            3 => Ok(DType::I16),
            4 => Ok(DType::U16),
            5 => Ok(DType::F16),
            6 => Ok(DType::BF16),
            7 => Ok(DType::I32),
            8 => Ok(DType::U32),
            9 => Ok(DType::F32),
            10 => Ok(DType::F64),
            11 => Ok(DType::I64),
            12 => Ok(DType::U64),
            _ => Err(DTypeError::UnknownValue(v)),
        }
    }

    /// Ordering used to lay tensors out for serialization: wider types
    /// first. Callers break ties by tensor name.
    pub fn serialization_cmp(self, other: DType) -> Ordering {
        other.cmp(&self)
    }
}

impl TryFrom<u8> for DType {
    type Error = DTypeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        DType::from_u8(v)
    }
}

impl FromStr for DType {
    type Err = DTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DType::ALL
            .iter()
            .copied()
            .find(|dt| dt.as_str() == s)
            .ok_or_else(|| DTypeError::UnknownTag(s.to_string()))
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
