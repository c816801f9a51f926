//! Streaming a single tensor's raw bytes out of a file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use stcodec_io::ReadConfig;
use tracing::info;

use super::{TensorNotFound, open_lazy};

/// Extract command arguments
#[derive(Args, Debug)]
pub struct ExtractCommand {
    /// Safetensors file to read from
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Name of the tensor to extract
    #[arg(short, long, value_name = "NAME")]
    pub tensor: String,

    /// Destination for the tensor's little-endian bytes
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,
}

impl ExtractCommand {
    pub fn execute(&self, config: &ReadConfig) -> Result<()> {
        let lazy = open_lazy(&self.file, config)?;
        let tensor =
            lazy.tensor(&self.tensor).ok_or_else(|| TensorNotFound(self.tensor.clone()))?;

        let file = File::create(&self.output)
            .with_context(|| format!("failed to create {}", self.output.display()))?;
        let mut out = BufWriter::new(file);
        let bytes = tensor
            .copy_to(&mut out)
            .with_context(|| format!("failed to extract from {}", self.file.display()))?;
        out.flush().with_context(|| format!("failed to write {}", self.output.display()))?;

        info!(
            tensor = %self.tensor,
            dtype = %tensor.dtype(),
            shape = ?tensor.shape(),
            bytes,
            output = %self.output.display(),
            "extracted"
        );
        Ok(())
    }
}
