//! Materialized tensors and the [`View`] abstraction consumed by writers.

use std::borrow::Cow;
use std::io::Write;

use stcodec_format::math::{byte_size, element_count};
use stcodec_format::{DType, Error, Result, Stage};

use crate::data::{Element, TensorData};

/// Anything that can be written as one tensor of a safetensors file.
pub trait View {
    fn dtype(&self) -> DType;

    fn shape(&self) -> &[u64];

    /// Length in bytes of the data [`View::write_data`] produces.
    fn data_len(&self) -> u64;

    /// Write the little-endian tensor bytes; returns the number written.
    fn write_data<W: Write + ?Sized>(&self, writer: &mut W) -> Result<u64>;
}

impl<V: View + ?Sized> View for &V {
    fn dtype(&self) -> DType {
        (**self).dtype()
    }

    fn shape(&self) -> &[u64] {
        (**self).shape()
    }

    fn data_len(&self) -> u64 {
        (**self).data_len()
    }

    fn write_data<W: Write + ?Sized>(&self, writer: &mut W) -> Result<u64> {
        (**self).write_data(writer)
    }
}

fn check_byte_len(shape: &[u64], dtype: DType, actual: u64) -> Result<()> {
    let expected = byte_size(shape, dtype)?;
    if expected != actual {
        return Err(Error::LengthMismatch { expected, actual });
    }
    Ok(())
}

fn write_bytes<W: Write + ?Sized>(writer: &mut W, bytes: &[u8]) -> Result<u64> {
    writer.write_all(bytes).map_err(Error::io(Stage::TensorWrite))?;
    Ok(bytes.len() as u64)
}

// ---------------------------------------------------------------------------
// Typed
// ---------------------------------------------------------------------------

/// A named tensor with decoded elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    name: String,
    shape: Vec<u64>,
    data: TensorData,
}

impl Tensor {
    /// Build a tensor, checking that `shape` describes exactly as many
    /// elements as `data` holds.
    pub fn new(name: impl Into<String>, shape: Vec<u64>, data: impl Into<TensorData>) -> Result<Self> {
        let data = data.into();
        let expected = element_count(&shape)?;
        let actual = data.len() as u64;
        if expected != actual {
            return Err(Error::ShapeMismatch { shape, expected, actual });
        }
        Ok(Self { name: name.into(), shape, data })
    }

    /// Like [`Tensor::new`] but also checks the data against a declared dtype.
    pub fn with_dtype(
        name: impl Into<String>,
        dtype: DType,
        shape: Vec<u64>,
        data: impl Into<TensorData>,
    ) -> Result<Self> {
        let data = data.into();
        if data.dtype() != dtype {
            return Err(Error::DTypeMismatch { declared: dtype, actual: data.dtype() });
        }
        Self::new(name, shape, data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn into_data(self) -> TensorData {
        self.data
    }

    /// Borrow the elements as `T`, if that is the element type.
    pub fn values<T: Element>(&self) -> Option<&[T]> {
        self.data.as_slice()
    }

    /// Mutate elements in place. The shape and element type are fixed.
    pub fn values_mut<T: Element>(&mut self) -> Option<&mut [T]> {
        self.data.as_mut_slice()
    }

    /// Encode back to an undecoded tensor.
    pub fn to_raw(&self) -> RawTensor {
        RawTensor {
            name: self.name.clone(),
            dtype: self.dtype(),
            shape: self.shape.clone(),
            data: self.data.encode(),
        }
    }
}

impl View for Tensor {
    fn dtype(&self) -> DType {
        self.data.dtype()
    }

    fn shape(&self) -> &[u64] {
        &self.shape
    }

    fn data_len(&self) -> u64 {
        self.data.byte_len()
    }

    fn write_data<W: Write + ?Sized>(&self, writer: &mut W) -> Result<u64> {
        self.data.write_to(writer).map_err(Error::io(Stage::TensorWrite))
    }
}

// ---------------------------------------------------------------------------
// Raw
// ---------------------------------------------------------------------------

/// A named tensor whose bytes are kept exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTensor {
    name: String,
    dtype: DType,
    shape: Vec<u64>,
    data: Vec<u8>,
}

impl RawTensor {
    /// Build a raw tensor, checking `data.len()` against shape and dtype.
    pub fn new(name: impl Into<String>, dtype: DType, shape: Vec<u64>, data: Vec<u8>) -> Result<Self> {
        check_byte_len(&shape, dtype, data.len() as u64)?;
        Ok(Self { name: name.into(), dtype, shape, data })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Decode the bytes into typed elements.
    pub fn decode(&self) -> Result<Tensor> {
        let data = TensorData::decode(self.dtype, &self.data)
            .map_err(|e| e.in_tensor(self.name.as_str()))?;
        Ok(Tensor { name: self.name.clone(), shape: self.shape.clone(), data })
    }
}

impl View for RawTensor {
    fn dtype(&self) -> DType {
        self.dtype
    }

    fn shape(&self) -> &[u64] {
        &self.shape
    }

    fn data_len(&self) -> u64 {
        self.data.len() as u64
    }

    fn write_data<W: Write + ?Sized>(&self, writer: &mut W) -> Result<u64> {
        write_bytes(writer, &self.data)
    }
}

// ---------------------------------------------------------------------------
// Borrowed
// ---------------------------------------------------------------------------

/// Unnamed tensor bytes borrowed from somewhere else, typically a
/// [`SafeTensors`](crate::SafeTensors) buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorView<'data> {
    dtype: DType,
    shape: Cow<'data, [u64]>,
    data: &'data [u8],
}

impl<'data> TensorView<'data> {
    /// Wrap `data`, checking its length against shape and dtype.
    pub fn new(dtype: DType, shape: Vec<u64>, data: &'data [u8]) -> Result<Self> {
        check_byte_len(&shape, dtype, data.len() as u64)?;
        Ok(Self { dtype, shape: Cow::Owned(shape), data })
    }

    /// For views into an already validated buffer.
    pub(crate) fn borrowed(dtype: DType, shape: &'data [u64], data: &'data [u8]) -> Self {
        Self { dtype, shape: Cow::Borrowed(shape), data }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn data(&self) -> &'data [u8] {
        self.data
    }

    /// Decode into typed elements.
    pub fn to_data(&self) -> Result<TensorData> {
        TensorData::decode(self.dtype, self.data)
    }

    /// Copy into an owned, named raw tensor.
    pub fn to_raw(&self, name: impl Into<String>) -> RawTensor {
        RawTensor {
            name: name.into(),
            dtype: self.dtype,
            shape: self.shape.to_vec(),
            data: self.data.to_vec(),
        }
    }
}

impl View for TensorView<'_> {
    fn dtype(&self) -> DType {
        self.dtype
    }

    fn shape(&self) -> &[u64] {
        &self.shape
    }

    fn data_len(&self) -> u64 {
        self.data.len() as u64
    }

    fn write_data<W: Write + ?Sized>(&self, writer: &mut W) -> Result<u64> {
        write_bytes(writer, self.data)
    }
}
