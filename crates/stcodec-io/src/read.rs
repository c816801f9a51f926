//! Eager, single-pass reading of every tensor in a stream.

use std::io::Read;

use stcodec_format::{Header, Metadata, ReadConfig, Result, TensorInfo, decode_header};
use tracing::{debug, trace};

use crate::data::{TensorData, read_exact_progressive};
use crate::tensor::{RawTensor, Tensor};

/// Every tensor of a stream, in ascending offset order, plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub tensors: Vec<T>,
    pub metadata: Metadata,
}

impl<T> Loaded<T> {
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

impl Loaded<Tensor> {
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.iter().find(|t| t.name() == name)
    }
}

impl Loaded<RawTensor> {
    pub fn get(&self, name: &str) -> Option<&RawTensor> {
        self.tensors.iter().find(|t| t.name() == name)
    }
}

/// Read and decode every tensor. See [`read_all_with_config`].
pub fn read_all<R: Read>(reader: R) -> Result<Loaded<Tensor>> {
    read_all_with_config(reader, &ReadConfig::default())
}

/// Read and decode every tensor from `reader`.
///
/// The stream is consumed strictly forward, once. Any failure aborts the
/// whole read and names the tensor in progress.
pub fn read_all_with_config<R: Read>(reader: R, config: &ReadConfig) -> Result<Loaded<Tensor>> {
    read_each(reader, config, |info, reader| {
        let data = TensorData::read_from(reader, info.dtype, info.element_count()?)?;
        Tensor::new(info.name.as_str(), info.shape.clone(), data)
    })
}

/// Read every tensor without decoding. See [`read_all_raw_with_config`].
pub fn read_all_raw<R: Read>(reader: R) -> Result<Loaded<RawTensor>> {
    read_all_raw_with_config(reader, &ReadConfig::default())
}

/// Read every tensor's bytes verbatim.
pub fn read_all_raw_with_config<R: Read>(
    reader: R,
    config: &ReadConfig,
) -> Result<Loaded<RawTensor>> {
    read_each(reader, config, |info, reader| {
        let bytes = read_exact_progressive(reader, info.data_offsets.len())?;
        RawTensor::new(info.name.as_str(), info.dtype, info.shape.clone(), bytes)
    })
}

fn read_each<R, T, F>(mut reader: R, config: &ReadConfig, mut read_one: F) -> Result<Loaded<T>>
where
    R: Read,
    F: FnMut(&TensorInfo, &mut R) -> Result<T>,
{
    let header = decode_header(&mut reader, config)?;
    let buffer_len = header.validate()?;
    debug!(tensors = header.len(), buffer_len, "reading all tensors");

    let tensors = read_sorted(&header, |info| {
        trace!(tensor = %info.name, bytes = info.data_offsets.len(), "reading tensor");
        read_one(info, &mut reader)
    })?;
    Ok(Loaded { tensors, metadata: header.metadata })
}

/// Apply `read_one` to each tensor in ascending offset order, naming the
/// tensor on failure. Offsets are contiguous once validated, so a reader at
/// the buffer start can consume them back to back.
pub(crate) fn read_sorted<T>(
    header: &Header,
    mut read_one: impl FnMut(&TensorInfo) -> Result<T>,
) -> Result<Vec<T>> {
    header
        .sorted_by_offsets()
        .into_iter()
        .map(|info| read_one(info).map_err(|e| e.in_tensor(info.name.as_str())))
        .collect()
}
