//! Overflow-checked size arithmetic.
//!
//! Every byte count and element count derived from a header goes through
//! these helpers. A header comes from an untrusted file, so a product or sum
//! that does not fit is reported as an [`Overflow`] naming the computation,
//! never wrapped.

use std::fmt;

use crate::dtype::DType;

/// The size computation that overflowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Computation {
    /// Product of all shape dimensions.
    ElementCount,
    /// Element count times element size.
    ByteSize,
    /// Accumulated tensor offsets inside the byte buffer.
    DataOffset,
    /// Absolute position of the byte buffer (or of a tensor) in a stream.
    BufferOffset,
    /// Length prefix plus JSON header length.
    HeaderLength,
    /// Narrowing a 64-bit count to the platform's `usize`.
    PlatformSize,
}

impl fmt::Display for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Computation::ElementCount => "element count",
            Computation::ByteSize => "byte size",
            Computation::DataOffset => "data offset",
            Computation::BufferOffset => "byte-buffer offset",
            Computation::HeaderLength => "header length",
            Computation::PlatformSize => "platform size",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Op {
    Mul(u64),
    Add(u64),
    Narrow,
}

/// A size computation whose result does not fit its integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Overflow {
    computation: Computation,
    lhs: u64,
    op: Op,
}

impl Overflow {
    /// Which computation overflowed.
    pub fn computation(&self) -> Computation {
        self.computation
    }
}

impl fmt::Display for Overflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Overflow { computation, lhs, op } = *self;
        match op {
            Op::Mul(rhs) => write!(f, "overflow computing {computation}: {lhs} * {rhs} exceeds u64"),
            Op::Add(rhs) => write!(f, "overflow computing {computation}: {lhs} + {rhs} exceeds u64"),
            Op::Narrow => write!(f, "overflow computing {computation}: {lhs} does not fit in usize"),
        }
    }
}

impl std::error::Error for Overflow {}

/// `a * b`, or the computation that overflowed.
#[inline]
pub fn checked_mul(a: u64, b: u64, computation: Computation) -> Result<u64, Overflow> {
    a.checked_mul(b).ok_or(Overflow { computation, lhs: a, op: Op::Mul(b) })
}

/// `a + b`, or the computation that overflowed.
#[inline]
pub fn checked_add(a: u64, b: u64, computation: Computation) -> Result<u64, Overflow> {
    a.checked_add(b).ok_or(Overflow { computation, lhs: a, op: Op::Add(b) })
}

/// Narrow a 64-bit count to `usize` for indexing or allocation.
#[inline]
pub fn to_usize(v: u64, computation: Computation) -> Result<usize, Overflow> {
    usize::try_from(v).map_err(|_| Overflow { computation, lhs: v, op: Op::Narrow })
}

/// Number of elements described by `shape`.
///
/// The empty shape is a scalar and has one element. Any zero dimension
/// gives zero elements.
pub fn element_count(shape: &[u64]) -> Result<u64, Overflow> {
    shape.iter().try_fold(1u64, |acc, &dim| checked_mul(acc, dim, Computation::ElementCount))
}

/// Number of bytes needed to store `shape` elements of `dtype`.
pub fn byte_size(shape: &[u64], dtype: DType) -> Result<u64, Overflow> {
    let n = element_count(shape)?;
    checked_mul(n, dtype.size() as u64, Computation::ByteSize)
}
