//! Error types shared by every safetensors codec crate.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::dtype::{DType, DTypeError};
use crate::math::Overflow;

/// Broad category of an [`Error`], stable across context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The header bytes are not a well-formed safetensors header.
    MalformedHeader,
    /// The header parsed but its tensor descriptions are inconsistent.
    InvalidHeader,
    /// A size or offset computation does not fit its integer type.
    Overflow,
    /// The stream ended before the declared number of bytes.
    Truncated,
    /// Supplied data disagrees with a declared dtype or shape.
    TypeMismatch,
    /// The underlying reader or writer failed.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::MalformedHeader => "malformed header",
            ErrorKind::InvalidHeader => "invalid header",
            ErrorKind::Overflow => "overflow",
            ErrorKind::Truncated => "truncated",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::Io => "i/o",
        })
    }
}

/// What the codec was doing when an I/O failure or short read happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    HeaderLength,
    HeaderJson,
    TensorData,
    Seek,
    Position,
    HeaderWrite,
    TensorWrite,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::HeaderLength => "reading header length",
            Stage::HeaderJson => "reading header",
            Stage::TensorData => "reading tensor data",
            Stage::Seek => "seeking",
            Stage::Position => "querying stream position",
            Stage::HeaderWrite => "writing header",
            Stage::TensorWrite => "writing tensor data",
        })
    }
}

/// A consistency rule broken by a syntactically valid header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum HeaderViolation {
    #[error("tensor map key {key:?} does not match tensor name {name:?}")]
    NameMismatch { key: String, name: String },

    #[error("tensor {tensor:?}: expected data offsets to begin at {expected}, found {actual}")]
    OffsetMismatch { tensor: String, expected: u64, actual: u64 },

    #[error("tensor {tensor:?}: data offsets end {end} precedes begin {begin}")]
    ReversedRange { tensor: String, begin: u64, end: u64 },

    #[error(
        "tensor {tensor:?}: {dtype} shape {shape:?} needs {expected} bytes, data offsets span {actual}"
    )]
    SizeMismatch { tensor: String, dtype: DType, shape: Vec<u64>, expected: u64, actual: u64 },

    #[error("tensor {tensor:?}: negative dimension {value} at shape index {index}")]
    NegativeDimension { tensor: String, index: usize, value: i64 },

    #[error("duplicate tensor name {0:?}")]
    DuplicateName(String),

    #[error("byte buffer holds {actual} bytes, header describes {expected}")]
    TrailingData { expected: u64, actual: u64 },
}

/// Errors produced while encoding or decoding safetensors data.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("invalid header: {0}")]
    InvalidHeader(#[from] HeaderViolation),

    #[error(transparent)]
    Overflow(#[from] Overflow),

    #[error("truncated while {stage}: expected {expected} bytes, got {actual}")]
    Truncated { stage: Stage, expected: u64, actual: u64 },

    #[error("data type mismatch: declared {declared}, data holds {actual}")]
    DTypeMismatch { declared: DType, actual: DType },

    #[error("shape {shape:?} describes {expected} elements, data holds {actual}")]
    ShapeMismatch { shape: Vec<u64>, expected: u64, actual: u64 },

    #[error("expected {expected} data bytes, got {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("i/o error while {stage}: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: io::Error,
    },

    #[error("tensor {name:?}: {source}")]
    Tensor {
        name: String,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedHeader(msg.into())
    }

    /// Adapter for `map_err` on I/O results.
    pub fn io(stage: Stage) -> impl FnOnce(io::Error) -> Error {
        move |source| Error::Io { stage, source }
    }

    /// Attach the tensor name this error is about.
    pub fn in_tensor(self, name: impl Into<String>) -> Self {
        Error::Tensor { name: name.into(), source: Box::new(self) }
    }

    /// The innermost error, skipping tensor-name context.
    pub fn root(&self) -> &Error {
        let mut err = self;
        while let Error::Tensor { source, .. } = err {
            err = source;
        }
        err
    }

    /// Category of the innermost error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedHeader(_) => ErrorKind::MalformedHeader,
            Error::InvalidHeader(_) => ErrorKind::InvalidHeader,
            Error::Overflow(_) => ErrorKind::Overflow,
            Error::Truncated { .. } => ErrorKind::Truncated,
            Error::DTypeMismatch { .. }
            | Error::ShapeMismatch { .. }
            | Error::LengthMismatch { .. } => ErrorKind::TypeMismatch,
            Error::Io { .. } => ErrorKind::Io,
            Error::Tensor { source, .. } => source.kind(),
        }
    }

    /// The header violation, if this is an invalid-header error.
    pub fn violation(&self) -> Option<&HeaderViolation> {
        match self.root() {
            Error::InvalidHeader(v) => Some(v),
            _ => None,
        }
    }

    /// The overflow details, if this is an overflow error.
    pub fn overflow(&self) -> Option<&Overflow> {
        match self.root() {
            Error::Overflow(o) => Some(o),
            _ => None,
        }
    }
}

impl From<DTypeError> for Error {
    fn from(e: DTypeError) -> Self {
        Error::MalformedHeader(e.to_string())
    }
}
