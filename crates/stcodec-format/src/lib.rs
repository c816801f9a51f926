//! Header model, validation and wire framing for the safetensors format.
//!
//! A safetensors stream is laid out as
//!
//! ```text
//! [u64 LE: N][N bytes: JSON header, space padded to a multiple of 8][byte buffer]
//! ```
//!
//! This crate owns everything up to the byte buffer: the data type registry,
//! overflow-checked size arithmetic, the [`Header`] model with its validator,
//! and the JSON codec. Tensor payloads are handled by `stcodec-io`.
//!
//! # Example
//!
//! ```
//! use stcodec_format::{DType, DataOffsets, Header, ReadConfig, TensorInfo};
//! use stcodec_format::{decode_header, encode_header};
//!
//! let mut header = Header::new();
//! header.insert(TensorInfo::new("w", DType::F32, vec![2, 2], DataOffsets::new(0, 16)))?;
//! let bytes = encode_header(&header)?;
//!
//! let back = decode_header(&mut bytes.as_slice(), &ReadConfig::default())?;
//! assert_eq!(back.validate()?, 16);
//! assert_eq!(back.buffer_offset, bytes.len() as u64);
//! # Ok::<(), stcodec_format::Error>(())
//! ```

pub mod config;
pub mod dtype;
pub mod error;
pub mod header;
pub mod math;

pub use config::ReadConfig;
pub use dtype::{DType, DTypeError};
pub use error::{Error, ErrorKind, HeaderViolation, Result, Stage};
pub use header::{
    DataOffsets, Header, Metadata, TensorInfo, decode_header, encode_header, validate, write_header,
};
pub use math::{Computation, Overflow};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Reserved top-level key holding string metadata.
pub const METADATA_KEY: &str = "__metadata__";

/// Default ceiling on the declared JSON header length.
pub const DEFAULT_HEADER_SIZE_LIMIT: u64 = 100_000_000;

/// The JSON header is padded so the byte buffer starts at this alignment.
pub const HEADER_ALIGNMENT: usize = 8;

/// Smallest possible header, `{}`.
pub const MIN_HEADER_SIZE: u64 = 2;
