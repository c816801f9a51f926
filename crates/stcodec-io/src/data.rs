//! Little-endian encoding between raw bytes and typed element arrays.
//!
//! Every [`DType`] maps to exactly one Rust element type:
//!
//! | dtype | element |
//! |-------|---------|
//! | `BOOL` | `bool` |
//! | `U8`, `I8` | `u8`, `i8` |
//! | `U16`, `I16` | `u16`, `i16` |
//! | `F16`, `BF16` | [`half::f16`], [`half::bf16`] |
//! | `U32`, `I32`, `F32` | `u32`, `i32`, `f32` |
//! | `U64`, `I64`, `F64` | `u64`, `i64`, `f64` |
//!
//! Encoding is byte-order independent of the host. The 16-bit float types
//! are moved by bit pattern only; nothing here converts or rounds them.

use std::fmt;
use std::io::{self, Read, Write};

use half::{bf16, f16};
use stcodec_format::math::{Computation, checked_mul};
use stcodec_format::{DType, Error, Result, Stage};

/// Elements encoded per chunk when streaming to a writer.
const CHUNK_ELEMENTS: usize = 16 * 1024;

mod private {
    pub trait Sealed {}
}

/// An element type with a fixed safetensors [`DType`].
pub trait Element: Copy + PartialEq + fmt::Debug + Send + Sync + 'static + private::Sealed {
    const DTYPE: DType;

    /// Append the little-endian encoding of `values` to `out`.
    fn encode_le(values: &[Self], out: &mut Vec<u8>);

    /// Decode `bytes`, whose length must be a multiple of the element size.
    /// A trailing partial element is ignored.
    fn decode_le(bytes: &[u8]) -> Vec<Self>;

    fn slice(data: &TensorData) -> Option<&[Self]>;

    fn slice_mut(data: &mut TensorData) -> Option<&mut [Self]>;

    fn into_data(values: Vec<Self>) -> TensorData;

    fn from_data(data: TensorData) -> std::result::Result<Vec<Self>, TensorData>;
}

macro_rules! element {
    (@access $ty:ty => $variant:ident) => {
        fn slice(data: &TensorData) -> Option<&[Self]> {
            match data {
                TensorData::$variant(v) => Some(v),
                _ => None,
            }
        }

        fn slice_mut(data: &mut TensorData) -> Option<&mut [Self]> {
            match data {
                TensorData::$variant(v) => Some(v),
                _ => None,
            }
        }

        fn into_data(values: Vec<Self>) -> TensorData {
            TensorData::$variant(values)
        }

        fn from_data(data: TensorData) -> std::result::Result<Vec<Self>, TensorData> {
            match data {
                TensorData::$variant(v) => Ok(v),
                other => Err(other),
            }
        }
    };

    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl private::Sealed for $ty {}

        impl Element for $ty {
            const DTYPE: DType = DType::$variant;

            fn encode_le(values: &[Self], out: &mut Vec<u8>) {
                out.reserve(values.len() * size_of::<$ty>());
                for v in values {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }

            fn decode_le(bytes: &[u8]) -> Vec<Self> {
                bytes
                    .chunks_exact(size_of::<$ty>())
                    .map(|chunk| {
                        let mut le = [0u8; size_of::<$ty>()];
                        le.copy_from_slice(chunk);
                        <$ty>::from_le_bytes(le)
                    })
                    .collect()
            }

            element!(@access $ty => $variant);
        }
    )*};
}

element! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    f16 => F16,
    bf16 => BF16,
    u32 => U32,
    i32 => I32,
    f32 => F32,
    u64 => U64,
    i64 => I64,
    f64 => F64,
}

impl private::Sealed for bool {}

/// One byte per element: `0` is false, anything else is true. Encoding only
/// ever emits `0` or `1`.
impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn encode_le(values: &[Self], out: &mut Vec<u8>) {
        out.extend(values.iter().map(|&b| u8::from(b)));
    }

    fn decode_le(bytes: &[u8]) -> Vec<Self> {
        bytes.iter().map(|&b| b != 0).collect()
    }

    element!(@access bool => Bool);
}

/// Typed tensor contents, one variant per [`DType`].
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Bool(Vec<bool>),
    U8(Vec<u8>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    F16(Vec<f16>),
    BF16(Vec<bf16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    I64(Vec<i64>),
    U64(Vec<u64>),
}

/// Run `$body` with `$v` bound to the inner vector of any variant.
macro_rules! dispatch {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            TensorData::Bool($v) => $body,
            TensorData::U8($v) => $body,
            TensorData::I8($v) => $body,
            TensorData::I16($v) => $body,
            TensorData::U16($v) => $body,
            TensorData::F16($v) => $body,
            TensorData::BF16($v) => $body,
            TensorData::I32($v) => $body,
            TensorData::U32($v) => $body,
            TensorData::F32($v) => $body,
            TensorData::F64($v) => $body,
            TensorData::I64($v) => $body,
            TensorData::U64($v) => $body,
        }
    };
}

/// Run `$body` with `$t` as the element type for `$dtype`.
macro_rules! with_element {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            DType::Bool => { type $t = bool; $body }
            DType::U8 => { type $t = u8; $body }
            DType::I8 => { type $t = i8; $body }
            DType::I16 => { type $t = i16; $body }
            DType::U16 => { type $t = u16; $body }
            DType::F16 => { type $t = f16; $body }
            DType::BF16 => { type $t = bf16; $body }
            DType::I32 => { type $t = i32; $body }
            DType::U32 => { type $t = u32; $body }
            DType::F32 => { type $t = f32; $body }
            DType::F64 => { type $t = f64; $body }
            DType::I64 => { type $t = i64; $body }
            DType::U64 => { type $t = u64; $body }
        }
    };
}

impl TensorData {
    pub fn dtype(&self) -> DType {
        fn of<T: Element>(_: &[T]) -> DType {
            T::DTYPE
        }
        dispatch!(self, v => of(v.as_slice()))
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        dispatch!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the encoded form in bytes.
    pub fn byte_len(&self) -> u64 {
        self.len() as u64 * self.dtype().size() as u64
    }

    /// Borrow the elements if they are of type `T`.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(self)
    }

    /// Mutably borrow the elements if they are of type `T`. Length and type
    /// cannot change through the returned slice.
    pub fn as_mut_slice<T: Element>(&mut self) -> Option<&mut [T]> {
        T::slice_mut(self)
    }

    /// Take the elements if they are of type `T`, or give `self` back.
    pub fn into_vec<T: Element>(self) -> std::result::Result<Vec<T>, TensorData> {
        T::from_data(self)
    }

    /// Zero-length data of the given type.
    pub fn empty(dtype: DType) -> Self {
        with_element!(dtype, T => T::into_data(Vec::new()))
    }

    /// Little-endian encoding of every element.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        dispatch!(self, v => Element::encode_le(v.as_slice(), &mut out));
        out
    }

    /// Stream the encoding to `writer` in bounded chunks; returns the number
    /// of bytes written.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<u64> {
        fn write_chunks<T: Element, W: Write + ?Sized>(values: &[T], w: &mut W) -> io::Result<u64> {
            let mut buf = Vec::with_capacity(values.len().min(CHUNK_ELEMENTS) * T::DTYPE.size());
            let mut written = 0u64;
            for chunk in values.chunks(CHUNK_ELEMENTS) {
                buf.clear();
                T::encode_le(chunk, &mut buf);
                w.write_all(&buf)?;
                written += buf.len() as u64;
            }
            Ok(written)
        }
        dispatch!(self, v => write_chunks(v.as_slice(), writer))
    }

    /// Decode a whole byte slice as elements of `dtype`.
    pub fn decode(dtype: DType, bytes: &[u8]) -> Result<Self> {
        let size = dtype.size();
        if bytes.len() % size != 0 {
            let whole = (bytes.len() / size * size) as u64;
            return Err(Error::LengthMismatch { expected: whole, actual: bytes.len() as u64 });
        }
        Ok(with_element!(dtype, T => T::into_data(T::decode_le(bytes))))
    }

    /// Read exactly `count` elements of `dtype` from `reader`.
    ///
    /// The buffer grows with the bytes actually delivered, so a hostile
    /// `count` cannot force a large up-front allocation. A stream that ends
    /// early is reported as truncated tensor data.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R, dtype: DType, count: u64) -> Result<Self> {
        let expected = checked_mul(count, dtype.size() as u64, Computation::ByteSize)?;
        if expected == 0 {
            return Ok(Self::empty(dtype));
        }
        let bytes = read_exact_progressive(reader, expected)?;
        Self::decode(dtype, &bytes)
    }
}

/// Read exactly `len` bytes without trusting `len` for allocation.
pub(crate) fn read_exact_progressive<R: Read + ?Sized>(reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.take(len).read_to_end(&mut bytes).map_err(Error::io(Stage::TensorData))?;
    if (bytes.len() as u64) < len {
        return Err(Error::Truncated {
            stage: Stage::TensorData,
            expected: len,
            actual: bytes.len() as u64,
        });
    }
    Ok(bytes)
}

impl<T: Element> From<Vec<T>> for TensorData {
    fn from(values: Vec<T>) -> Self {
        T::into_data(values)
    }
}

impl<T: Element> From<&[T]> for TensorData {
    fn from(values: &[T]) -> Self {
        T::into_data(values.to_vec())
    }
}
