//! Reading and writing safetensors tensor data.
//!
//! Builds on the header model in [`stcodec_format`] with three access paths:
//!
//! - **eager**: [`read_all`] / [`read_all_raw`] consume a stream once, front
//!   to back, and return every tensor;
//! - **lazy**: [`LazySafeTensors`] parses only the header of a seekable
//!   stream and fetches single tensors on demand;
//! - **in memory**: [`SafeTensors`] borrows tensor bytes straight out of a
//!   complete file held in a slice.
//!
//! Writing goes through [`serialize`] / [`serialize_to_writer`], which accept
//! anything implementing [`View`].
//!
//! # Example
//!
//! ```
//! use stcodec_io::{Tensor, read_all, serialize};
//!
//! let attn = Tensor::new("attn.0", vec![1, 2, 3], vec![0f32, 1.0, 2.0, 3.0, 4.0, 5.0])?;
//! let bytes = serialize([("attn.0", &attn)], None)?;
//!
//! let loaded = read_all(bytes.as_slice())?;
//! assert_eq!(loaded.get("attn.0"), Some(&attn));
//! # Ok::<(), stcodec_io::Error>(())
//! ```

pub mod buffer;
pub mod data;
pub mod lazy;
pub mod read;
pub mod tensor;
pub mod write;

pub use buffer::{SafeTensors, read_metadata, read_metadata_with_config};
pub use data::{Element, TensorData};
pub use lazy::{LazySafeTensors, LazyTensor};
pub use read::{Loaded, read_all, read_all_raw, read_all_raw_with_config, read_all_with_config};
pub use stcodec_format::{
    DType, DataOffsets, Error, ErrorKind, Header, Metadata, ReadConfig, Result, TensorInfo,
};
pub use tensor::{RawTensor, Tensor, TensorView, View};
pub use write::{serialize, serialize_to_writer};

pub use half::{bf16, f16};
