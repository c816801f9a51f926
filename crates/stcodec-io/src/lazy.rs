//! Seek-based, on-demand access to individual tensors.
//!
//! [`LazySafeTensors`] parses and validates only the header. Tensor bytes are
//! fetched when a [`LazyTensor`] handle asks for them, with a fresh seek for
//! every request, so handles may be used in any order and any number of
//! times. Nothing is cached.
//!
//! All handles share the one underlying stream through a [`RefCell`]. That
//! keeps the reader `!Sync`, so cross-thread use needs the caller's own
//! synchronization. The stream is owned by the reader, so no handle can
//! outlive it.

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};

use stcodec_format::math::{Computation, checked_add};
use stcodec_format::{
    DType, DataOffsets, Error, Header, Metadata, ReadConfig, Result, Stage, TensorInfo,
    decode_header,
};
use tracing::{debug, trace};

use crate::data::{TensorData, read_exact_progressive};
use crate::read::read_sorted;
use crate::tensor::{RawTensor, Tensor, View};

/// Bytes moved per step by [`LazyTensor::copy_to`].
const COPY_CHUNK: u64 = 64 * 1024;

/// A validated header over a seekable stream.
pub struct LazySafeTensors<R> {
    reader: RefCell<R>,
    header: Header,
    data_start: u64,
    buffer_len: u64,
}

impl<R> fmt::Debug for LazySafeTensors<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySafeTensors")
            .field("tensors", &self.header.len())
            .field("data_start", &self.data_start)
            .field("buffer_len", &self.buffer_len)
            .finish_non_exhaustive()
    }
}

impl<R: Read + Seek> LazySafeTensors<R> {
    /// Open with the default [`ReadConfig`].
    pub fn open(reader: R) -> Result<Self> {
        Self::open_with_config(reader, &ReadConfig::default())
    }

    /// Parse and validate the header found at the stream's current position.
    ///
    /// No tensor data is read. Offsets are resolved relative to the position
    /// the stream was at when this was called.
    pub fn open_with_config(mut reader: R, config: &ReadConfig) -> Result<Self> {
        let base = reader.stream_position().map_err(Error::io(Stage::Position))?;
        let header = decode_header(&mut reader, config)?;
        let buffer_len = header.validate()?;
        let data_start = checked_add(base, header.buffer_offset, Computation::BufferOffset)?;
        debug!(base, data_start, buffer_len, tensors = header.len(), "opened lazy reader");
        Ok(Self { reader: RefCell::new(reader), header, data_start, buffer_len })
    }

    /// Handle for `name`, or `None` if there is no such tensor.
    pub fn tensor(&self, name: &str) -> Option<LazyTensor<'_, R>> {
        self.header.get(name).map(|info| LazyTensor { source: self, info })
    }

    /// Handles for every tensor in ascending offset order.
    pub fn tensors(&self) -> impl Iterator<Item = LazyTensor<'_, R>> {
        self.header.sorted_by_offsets().into_iter().map(|info| LazyTensor { source: self, info })
    }

    /// Decode every tensor with one seek followed by sequential reads.
    pub fn all_tensors(&self) -> Result<Vec<Tensor>> {
        let mut reader = self.seek_to(self.data_start)?;
        read_sorted(&self.header, |info| {
            let data = TensorData::read_from(&mut *reader, info.dtype, info.element_count()?)?;
            Tensor::new(info.name.as_str(), info.shape.clone(), data)
        })
    }

    /// Raw counterpart of [`LazySafeTensors::all_tensors`].
    pub fn all_raw_tensors(&self) -> Result<Vec<RawTensor>> {
        let mut reader = self.seek_to(self.data_start)?;
        read_sorted(&self.header, |info| {
            let bytes = read_exact_progressive(&mut *reader, info.data_offsets.len())?;
            RawTensor::new(info.name.as_str(), info.dtype, info.shape.clone(), bytes)
        })
    }

    fn seek_to(&self, pos: u64) -> Result<RefMut<'_, R>> {
        let mut reader = self.reader.try_borrow_mut().map_err(|_| Error::Io {
            stage: Stage::Seek,
            source: io::Error::new(io::ErrorKind::ResourceBusy, "stream is already borrowed"),
        })?;
        reader.seek(SeekFrom::Start(pos)).map_err(Error::io(Stage::Seek))?;
        Ok(reader)
    }
}

impl<R> LazySafeTensors<R> {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn metadata(&self) -> &Metadata {
        &self.header.metadata
    }

    /// Tensor names in ascending offset order.
    pub fn names(&self) -> Vec<&str> {
        self.header.sorted_by_offsets().into_iter().map(|info| info.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.header.len()
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
    }

    /// Absolute stream position of the first buffer byte.
    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    pub fn buffer_len(&self) -> u64 {
        self.buffer_len
    }

    /// Give the stream back.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

/// Non-owning handle to one tensor of a [`LazySafeTensors`].
pub struct LazyTensor<'a, R> {
    source: &'a LazySafeTensors<R>,
    info: &'a TensorInfo,
}

impl<R> Clone for LazyTensor<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for LazyTensor<'_, R> {}

impl<R> fmt::Debug for LazyTensor<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyTensor").field("info", self.info).finish()
    }
}

impl<'a, R: Read + Seek> LazyTensor<'a, R> {
    pub fn name(&self) -> &'a str {
        &self.info.name
    }

    pub fn dtype(&self) -> DType {
        self.info.dtype
    }

    pub fn shape(&self) -> &'a [u64] {
        &self.info.shape
    }

    pub fn info(&self) -> &'a TensorInfo {
        self.info
    }

    /// Range relative to the start of the byte buffer.
    pub fn data_offsets(&self) -> DataOffsets {
        self.info.data_offsets
    }

    pub fn byte_len(&self) -> u64 {
        self.info.data_offsets.len()
    }

    /// The tensor's bytes exactly as stored.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        self.with_range(|reader, len| read_exact_progressive(reader, len))
            .map(Option::unwrap_or_default)
    }

    pub fn read_raw(&self) -> Result<RawTensor> {
        let bytes = self.read_bytes()?;
        RawTensor::new(self.name(), self.dtype(), self.info.shape.clone(), bytes)
            .map_err(|e| e.in_tensor(self.name()))
    }

    /// Decode the tensor's elements.
    pub fn read_tensor(&self) -> Result<Tensor> {
        let count = self.info.element_count().map_err(|e| Error::from(e).in_tensor(self.name()))?;
        let data = self
            .with_range(|reader, _| TensorData::read_from(reader, self.dtype(), count))?
            .unwrap_or_else(|| TensorData::empty(self.dtype()));
        Tensor::new(self.name(), self.info.shape.clone(), data).map_err(|e| e.in_tensor(self.name()))
    }

    /// Stream the tensor's bytes into `writer` without holding them all in
    /// memory; returns the number of bytes copied.
    pub fn copy_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<u64> {
        self.with_range(|reader, len| copy_exact(reader, writer, len))
            .map(Option::unwrap_or_default)
    }

    /// Seek to this tensor and hand `f` a reader over its `len` bytes.
    /// An empty range returns `None` without touching the stream.
    fn with_range<T>(&self, f: impl FnOnce(&mut R, u64) -> Result<T>) -> Result<Option<T>> {
        let DataOffsets { begin, .. } = self.info.data_offsets;
        let len = self.byte_len();
        if len == 0 {
            return Ok(None);
        }
        let run = || {
            let pos = checked_add(self.source.data_start, begin, Computation::BufferOffset)?;
            let mut reader = self.source.seek_to(pos)?;
            trace!(tensor = %self.info.name, pos, len, "lazy read");
            f(&mut *reader, len)
        };
        run().map(Some).map_err(|e| e.in_tensor(self.name()))
    }
}

fn copy_exact<R, W>(reader: &mut R, writer: &mut W, len: u64) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; len.min(COPY_CHUNK) as usize];
    let mut copied = 0u64;
    while copied < len {
        let want = (len - copied).min(buf.len() as u64) as usize;
        let n = match reader.read(&mut buf[..want]) {
            Ok(0) => {
                let actual = copied;
                return Err(Error::Truncated { stage: Stage::TensorData, expected: len, actual });
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::io(Stage::TensorData)(e)),
        };
        writer.write_all(&buf[..n]).map_err(Error::io(Stage::TensorWrite))?;
        copied += n as u64;
    }
    Ok(copied)
}

/// Re-serializing a lazy handle streams its bytes straight from the source.
impl<R: Read + Seek> View for LazyTensor<'_, R> {
    fn dtype(&self) -> DType {
        self.info.dtype
    }

    fn shape(&self) -> &[u64] {
        &self.info.shape
    }

    fn data_len(&self) -> u64 {
        self.byte_len()
    }

    fn write_data<W: Write + ?Sized>(&self, writer: &mut W) -> Result<u64> {
        self.copy_to(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use stcodec_format::ErrorKind;

    use crate::write::serialize;

    fn sample() -> Vec<u8> {
        let a = Tensor::new("a", vec![2], vec![1.5f32, -2.0]).unwrap();
        let b = Tensor::new("b", vec![3], vec![true, false, true]).unwrap();
        let e = Tensor::new("e", vec![0], Vec::<u64>::new()).unwrap();
        serialize([("a", &a), ("b", &b), ("e", &e)], None).unwrap()
    }

    /// Counts seeks and reads issued against the inner stream.
    struct Counting<R> {
        inner: R,
        seeks: usize,
        reads: usize,
    }

    impl<R: Read> Read for Counting<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            self.inner.read(buf)
        }
    }

    impl<R: Seek> Seek for Counting<R> {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.seeks += 1;
            self.inner.seek(pos)
        }
    }

    #[test]
    fn handles_read_in_any_order() {
        let lazy = LazySafeTensors::open(Cursor::new(sample())).unwrap();
        let b = lazy.tensor("b").unwrap();
        let a = lazy.tensor("a").unwrap();
        assert_eq!(b.read_tensor().unwrap().values::<bool>(), Some(&[true, false, true][..]));
        assert_eq!(a.read_tensor().unwrap().values::<f32>(), Some(&[1.5f32, -2.0][..]));
        assert_eq!(b.read_bytes().unwrap(), [1, 0, 1]);
        assert!(lazy.tensor("missing").is_none());
    }

    #[test]
    fn empty_tensor_does_no_io() {
        let lazy = LazySafeTensors::open(Counting { inner: Cursor::new(sample()), seeks: 0, reads: 0 })
            .unwrap();
        let e = lazy.tensor("e").unwrap();
        let before = {
            let r = lazy.reader.borrow();
            (r.seeks, r.reads)
        };
        assert!(e.read_bytes().unwrap().is_empty());
        assert_eq!(e.read_tensor().unwrap().data(), &TensorData::U64(vec![]));
        assert_eq!(e.copy_to(&mut io::sink()).unwrap(), 0);
        let r = lazy.reader.borrow();
        assert_eq!((r.seeks, r.reads), before);
    }

    #[test]
    fn each_read_seeks_first() {
        let lazy = LazySafeTensors::open(Counting { inner: Cursor::new(sample()), seeks: 0, reads: 0 })
            .unwrap();
        let a = lazy.tensor("a").unwrap();
        let seeks = lazy.reader.borrow().seeks;
        a.read_bytes().unwrap();
        a.read_bytes().unwrap();
        assert_eq!(lazy.reader.borrow().seeks, seeks + 2);
    }

    #[test]
    fn copy_to_streams_bytes() {
        let lazy = LazySafeTensors::open(Cursor::new(sample())).unwrap();
        let a = lazy.tensor("a").unwrap();
        let mut out = Vec::new();
        assert_eq!(a.copy_to(&mut out).unwrap(), 8);
        assert_eq!(out, a.read_bytes().unwrap());
    }

    #[test]
    fn opens_at_a_nonzero_base() {
        let mut bytes = b"prefix".to_vec();
        bytes.extend(sample());
        let mut cursor = Cursor::new(bytes);
        cursor.seek(SeekFrom::Start(6)).unwrap();
        let lazy = LazySafeTensors::open(cursor).unwrap();
        let a = lazy.tensor("a").unwrap();
        assert_eq!(a.read_tensor().unwrap().values::<f32>(), Some(&[1.5f32, -2.0][..]));
        assert_eq!(lazy.data_start(), 6 + lazy.header().buffer_offset);
    }

    #[test]
    fn truncated_buffer_names_tensor() {
        let mut bytes = sample();
        bytes.truncate(bytes.len() - 1);
        let lazy = LazySafeTensors::open(Cursor::new(bytes)).unwrap();
        let err = lazy.tensor("b").unwrap().read_bytes().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncated);
        assert!(matches!(&err, Error::Tensor { name, .. } if name == "b"));

        let err = lazy.tensor("b").unwrap().copy_to(&mut io::sink()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncated);
    }

    #[test]
    fn all_tensors_match_single_reads() {
        let lazy = LazySafeTensors::open(Cursor::new(sample())).unwrap();
        let all = lazy.all_tensors().unwrap();
        let one_by_one: Vec<Tensor> = lazy.tensors().map(|t| t.read_tensor().unwrap()).collect();
        assert_eq!(all, one_by_one);
        // The empty U64 tensor sorts first at offset 0.
        assert_eq!(lazy.names(), ["e", "a", "b"]);
    }
}
