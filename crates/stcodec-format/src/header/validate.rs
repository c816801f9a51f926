use tracing::trace;

use super::{DataOffsets, Header};
use crate::METADATA_KEY;
use crate::error::{Error, HeaderViolation, Result};

/// Check that `header` describes a usable byte buffer.
///
/// Rules, in order:
/// - every map key equals its descriptor's name and none is `__metadata__`;
/// - sorted by `(begin, end)`, ranges start at 0 and touch without gap or
///   overlap;
/// - every range spans exactly `product(shape) * size(dtype)` bytes.
///
/// Returns the total byte buffer length. Pure; never touches I/O.
pub fn validate(header: &Header) -> Result<u64> {
    for (key, info) in &header.tensors {
        if *key != info.name {
            return Err(HeaderViolation::NameMismatch { key: key.clone(), name: info.name.clone() }
                .into());
        }
        if key == METADATA_KEY {
            return Err(Error::malformed(format!("tensor name {METADATA_KEY:?} is reserved")));
        }
    }

    let sorted = header.sorted_by_offsets();

    let mut cursor = 0u64;
    for info in &sorted {
        let DataOffsets { begin, end } = info.data_offsets;
        if begin != cursor {
            return Err(HeaderViolation::OffsetMismatch {
                tensor: info.name.clone(),
                expected: cursor,
                actual: begin,
            }
            .into());
        }
        if end < begin {
            return Err(HeaderViolation::ReversedRange { tensor: info.name.clone(), begin, end }
                .into());
        }
        cursor = end;
    }

    for info in &sorted {
        let expected = info.byte_size().map_err(|e| Error::from(e).in_tensor(&info.name))?;
        let actual = info.data_offsets.len();
        if expected != actual {
            return Err(HeaderViolation::SizeMismatch {
                tensor: info.name.clone(),
                dtype: info.dtype,
                shape: info.shape.clone(),
                expected,
                actual,
            }
            .into());
        }
    }

    trace!(tensors = sorted.len(), buffer_len = cursor, "header validated");
    Ok(cursor)
}
