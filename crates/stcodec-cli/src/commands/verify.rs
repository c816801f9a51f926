//! Full read of every tensor, checking the file end to end.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use stcodec_format::{HeaderViolation, Stage, decode_header};
use stcodec_io::{Error, ReadConfig};
use tracing::info;

use super::open_file;

/// Verify command arguments
#[derive(Args, Debug)]
pub struct VerifyCommand {
    /// Safetensors file to verify
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub tensors: usize,
    pub buffer_len: u64,
}

/// Stream every tensor of `reader` through a sink, in offset order, and
/// require that nothing follows the byte buffer.
///
/// Tensor bytes are never held in memory beyond one copy buffer.
pub fn verify_stream<R: Read>(mut reader: R, config: &ReadConfig) -> Result<Summary, Error> {
    let header = decode_header(&mut reader, config)?;
    let buffer_len = header.validate()?;
    for info in header.sorted_by_offsets() {
        let expected = info.data_offsets.len();
        let actual = io::copy(&mut (&mut reader).take(expected), &mut io::sink())
            .map_err(|e| Error::io(Stage::TensorData)(e).in_tensor(info.name.as_str()))?;
        if actual < expected {
            return Err(Error::Truncated { stage: Stage::TensorData, expected, actual }
                .in_tensor(info.name.as_str()));
        }
    }
    let extra = io::copy(&mut reader, &mut io::sink()).map_err(Error::io(Stage::TensorData))?;
    if extra > 0 {
        let actual = buffer_len + extra;
        return Err(HeaderViolation::TrailingData { expected: buffer_len, actual }.into());
    }
    Ok(Summary { tensors: header.len(), buffer_len })
}

impl VerifyCommand {
    pub fn execute(&self, config: &ReadConfig) -> Result<()> {
        let summary = verify(&self.file, config)?;
        info!(file = %self.file.display(), tensors = summary.tensors, "verified");
        println!("ok: {} tensors, {} data bytes", summary.tensors, summary.buffer_len);
        Ok(())
    }
}

fn verify(path: &Path, config: &ReadConfig) -> Result<Summary> {
    verify_stream(open_file(path)?, config).with_context(|| format!("{} is not valid", path.display()))
}
