//! Zero-copy access to a complete safetensors file held in memory.

use stcodec_format::math::{Computation, to_usize};
use stcodec_format::{
    DataOffsets, Error, Header, HeaderViolation, Metadata, ReadConfig, Result, Stage, TensorInfo,
    decode_header,
};
use tracing::debug;

use crate::tensor::TensorView;

/// Parse and validate the header at the start of `bytes`.
///
/// Returns the header together with the byte buffer length it describes.
/// Nothing past the header is inspected.
pub fn read_metadata(bytes: &[u8]) -> Result<(Header, u64)> {
    read_metadata_with_config(bytes, &ReadConfig::default())
}

pub fn read_metadata_with_config(bytes: &[u8], config: &ReadConfig) -> Result<(Header, u64)> {
    let header = decode_header(&mut &bytes[..], config)?;
    let buffer_len = header.validate()?;
    Ok((header, buffer_len))
}

/// A validated file whose tensors are borrowed views into the input slice.
#[derive(Debug, Clone)]
pub struct SafeTensors<'data> {
    header: Header,
    data: &'data [u8],
}

impl<'data> SafeTensors<'data> {
    /// Deserialize with the default [`ReadConfig`].
    pub fn deserialize(bytes: &'data [u8]) -> Result<Self> {
        Self::deserialize_with_config(bytes, &ReadConfig::default())
    }

    /// Parse and validate `bytes`, which must hold exactly one file: header
    /// followed by a byte buffer of the declared length, nothing more.
    pub fn deserialize_with_config(bytes: &'data [u8], config: &ReadConfig) -> Result<Self> {
        let (header, buffer_len) = read_metadata_with_config(bytes, config)?;
        let start = to_usize(header.buffer_offset, Computation::PlatformSize)?;
        let data = bytes.get(start..).unwrap_or_default();

        let actual = data.len() as u64;
        if actual < buffer_len {
            return Err(Error::Truncated { stage: Stage::TensorData, expected: buffer_len, actual });
        }
        if actual > buffer_len {
            return Err(HeaderViolation::TrailingData { expected: buffer_len, actual }.into());
        }
        debug!(tensors = header.len(), buffer_len, "deserialized buffer");
        Ok(Self { header, data })
    }

    /// Borrowed view of `name`, or `None` if there is no such tensor.
    pub fn tensor(&self, name: &str) -> Option<TensorView<'_>> {
        let info = self.header.get(name)?;
        self.view(info)
    }

    /// Every tensor in ascending offset order.
    pub fn tensors(&self) -> Vec<(&str, TensorView<'_>)> {
        let views: Vec<_> = self
            .header
            .sorted_by_offsets()
            .into_iter()
            .filter_map(|info| Some((info.name.as_str(), self.view(info)?)))
            .collect();
        debug_assert_eq!(views.len(), self.header.len());
        views
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

    pub fn metadata(&self) -> &Metadata {
        &self.header.metadata
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The byte buffer following the header.
    pub fn data(&self) -> &'data [u8] {
        self.data
    }

    /// Never `None` for a tensor of this header: deserialization checked that
    /// the offsets are contiguous from 0 and that `data` ends exactly at the
    /// last of them.
    fn view<'s>(&'s self, info: &'s TensorInfo) -> Option<TensorView<'s>> {
        let DataOffsets { begin, end } = info.data_offsets;
        let range = usize::try_from(begin).ok()?..usize::try_from(end).ok()?;
        let data = self.data.get(range)?;
        Some(TensorView::borrowed(info.dtype, &info.shape, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stcodec_format::{DType, ErrorKind};

    const SCENARIO: &str = r#"{"test":{"dtype":"I32","shape":[2,2],"data_offsets":[0,16]},"__metadata__":{"foo":"bar"}}"#;

    fn file(json: &str, buffer: &[u8]) -> Vec<u8> {
        let mut v = (json.len() as u64).to_le_bytes().to_vec();
        v.extend_from_slice(json.as_bytes());
        v.extend_from_slice(buffer);
        v
    }

    #[test]
    fn borrows_tensor_bytes() {
        let mut buffer = [0u8; 16];
        buffer[4] = 7;
        let bytes = file(SCENARIO, &buffer);
        let st = SafeTensors::deserialize(&bytes).unwrap();
        assert_eq!(st.len(), 1);
        assert_eq!(st.metadata()["foo"], "bar");
        let view = st.tensor("test").unwrap();
        assert_eq!(view.dtype(), DType::I32);
        assert_eq!(view.shape(), [2, 2]);
        assert_eq!(view.data().as_ptr(), bytes[8 + 0x59..].as_ptr());
        assert_eq!(view.to_data().unwrap().as_slice::<i32>(), Some(&[0, 7, 0, 0][..]));
    }

    #[test]
    fn buffer_must_match_exactly() {
        let short = file(SCENARIO, &[0; 15]);
        let err = SafeTensors::deserialize(&short).unwrap_err();
        assert!(matches!(err, Error::Truncated { expected: 16, actual: 15, .. }));

        let long = file(SCENARIO, &[0; 17]);
        let err = SafeTensors::deserialize(&long).unwrap_err();
        assert_eq!(
            err.violation(),
            Some(&HeaderViolation::TrailingData { expected: 16, actual: 17 })
        );
    }

    #[test]
    fn read_metadata_ignores_the_buffer() {
        let bytes = file(SCENARIO, &[]);
        let (header, buffer_len) = read_metadata(&bytes).unwrap();
        assert_eq!(buffer_len, 16);
        assert_eq!(header.buffer_offset, 8 + 0x59);
        assert_eq!(SafeTensors::deserialize(&bytes).unwrap_err().kind(), ErrorKind::Truncated);
    }

    #[test]
    fn every_tensor_has_a_view() {
        let json = r#"{"s":{"dtype":"I64","shape":[],"data_offsets":[0,8]},"z":{"dtype":"F32","shape":[0,4],"data_offsets":[8,8]},"b":{"dtype":"BOOL","shape":[2],"data_offsets":[8,10]}}"#;
        let bytes = file(json, &[1, 0, 0, 0, 0, 0, 0, 0, 1, 0]);
        let st = SafeTensors::deserialize(&bytes).unwrap();
        let views = st.tensors();
        assert_eq!(views.len(), st.len());
        for name in st.names() {
            assert!(st.tensor(name).is_some(), "{name}");
        }
        assert!(views.iter().any(|(n, v)| *n == "z" && v.data().is_empty()));
    }

    #[test]
    fn tensors_come_in_offset_order() {
        let json = r#"{"b":{"dtype":"U8","shape":[1],"data_offsets":[1,2]},"a":{"dtype":"U8","shape":[1],"data_offsets":[0,1]}}"#;
        let bytes = file(json, &[10, 20]);
        let st = SafeTensors::deserialize(&bytes).unwrap();
        assert_eq!(st.names(), ["a", "b"]);
        let data: Vec<(&str, &[u8])> = st.tensors().into_iter().map(|(n, v)| (n, v.data())).collect();
        assert_eq!(data, [("a", &[10u8][..]), ("b", &[20u8][..])]);
    }
}
