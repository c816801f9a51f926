//! Serialization of named tensors plus metadata.

use std::io::{self, Write};

use stcodec_format::math::{Computation, byte_size, checked_add, to_usize};
use stcodec_format::{
    DataOffsets, Error, Header, Metadata, Result, Stage, TensorInfo, encode_header,
};
use tracing::{debug, trace};

use crate::tensor::View;

/// Tensors in file order with the encoded header that describes them.
struct Prepared<V> {
    header_bytes: Vec<u8>,
    buffer_len: u64,
    tensors: Vec<(String, V)>,
}

/// Sort, lay out and describe `tensors`.
///
/// Tensors are ordered by dtype, widest first, then by name, and packed back
/// to back from offset 0 in that order.
fn prepare<S, V, I>(tensors: I, metadata: Option<Metadata>) -> Result<Prepared<V>>
where
    S: Into<String>,
    V: View,
    I: IntoIterator<Item = (S, V)>,
{
    let mut tensors: Vec<(String, V)> = tensors.into_iter().map(|(n, v)| (n.into(), v)).collect();
    tensors.sort_by(|(ln, lv), (rn, rv)| lv.dtype().serialization_cmp(rv.dtype()).then(ln.cmp(rn)));

    let mut header = Header::with_metadata(metadata.unwrap_or_default());
    let mut offset = 0u64;
    for (name, view) in &tensors {
        let len = view.data_len();
        let expected = byte_size(view.shape(), view.dtype()).map_err(|e| Error::from(e).in_tensor(name))?;
        if len != expected {
            return Err(Error::LengthMismatch { expected, actual: len }.in_tensor(name));
        }
        let end = checked_add(offset, len, Computation::DataOffset)?;
        header.insert(TensorInfo::new(
            name.as_str(),
            view.dtype(),
            view.shape().to_vec(),
            DataOffsets::new(offset, end),
        ))?;
        offset = end;
    }

    let header_bytes = encode_header(&header)?;
    debug!(tensors = tensors.len(), header_len = header_bytes.len(), buffer_len = offset, "serializing");
    Ok(Prepared { header_bytes, buffer_len: offset, tensors })
}

fn write_tensors<V: View, W: Write + ?Sized>(tensors: &[(String, V)], writer: &mut W) -> Result<u64> {
    let mut total = 0u64;
    for (name, view) in tensors {
        let expected = view.data_len();
        let written = view.write_data(writer).map_err(|e| e.in_tensor(name))?;
        if written != expected {
            let source =
                io::Error::other(format!("wrote {written} bytes, header declares {expected}"));
            return Err(Error::Io { stage: Stage::TensorWrite, source }.in_tensor(name));
        }
        trace!(tensor = %name, bytes = written, "wrote tensor");
        total += written;
    }
    Ok(total)
}

/// Serialize `tensors` and optional `metadata` into a new buffer.
///
/// Duplicate names, the reserved `__metadata__` name, and data whose length
/// disagrees with its shape and dtype are rejected before anything is
/// written.
pub fn serialize<S, V, I>(tensors: I, metadata: Option<Metadata>) -> Result<Vec<u8>>
where
    S: Into<String>,
    V: View,
    I: IntoIterator<Item = (S, V)>,
{
    let prepared = prepare(tensors, metadata)?;
    let total = checked_add(prepared.header_bytes.len() as u64, prepared.buffer_len, Computation::BufferOffset)?;
    let mut out = Vec::with_capacity(to_usize(total, Computation::PlatformSize)?);
    out.extend_from_slice(&prepared.header_bytes);
    write_tensors(&prepared.tensors, &mut out)?;
    Ok(out)
}

/// Serialize `tensors` and optional `metadata` to `writer`; returns the
/// number of bytes written.
///
/// A failed or short tensor write leaves `writer` holding a partial file.
/// Serialization has to be restarted from scratch in that case.
pub fn serialize_to_writer<S, V, I, W>(tensors: I, metadata: Option<Metadata>, writer: &mut W) -> Result<u64>
where
    S: Into<String>,
    V: View,
    I: IntoIterator<Item = (S, V)>,
    W: Write + ?Sized,
{
    let prepared = prepare(tensors, metadata)?;
    writer.write_all(&prepared.header_bytes).map_err(Error::io(Stage::HeaderWrite))?;
    let data = write_tensors(&prepared.tensors, writer)?;
    writer.flush().map_err(Error::io(Stage::TensorWrite))?;
    Ok(prepared.header_bytes.len() as u64 + data)
}
