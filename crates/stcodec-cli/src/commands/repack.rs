//! Rewriting a file in canonical layout, optionally editing its metadata.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use stcodec_io::{Metadata, ReadConfig, serialize_to_writer};
use tracing::info;

use super::open_lazy;

/// Repack command arguments
#[derive(Args, Debug)]
pub struct RepackCommand {
    /// Source safetensors file
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Destination file; must differ from the source
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Add or replace a metadata entry (repeatable)
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub meta: Vec<(String, String)>,
}

/// Parse a `key=value` pair; the value may itself contain `=`.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}

/// Existing metadata with `edits` applied in order.
pub fn merged_metadata(existing: &Metadata, edits: &[(String, String)]) -> Metadata {
    let mut merged = existing.clone();
    merged.extend(edits.iter().cloned());
    merged
}

impl RepackCommand {
    pub fn execute(&self, config: &ReadConfig) -> Result<()> {
        if let (Ok(src), Ok(dst)) = (fs::canonicalize(&self.input), fs::canonicalize(&self.output))
            && src == dst
        {
            bail!("refusing to repack {} onto itself", self.input.display());
        }

        let lazy = open_lazy(&self.input, config)?;
        let metadata = merged_metadata(lazy.metadata(), &self.meta);

        let file = File::create(&self.output)
            .with_context(|| format!("failed to create {}", self.output.display()))?;
        let mut out = BufWriter::new(file);
        let tensors = lazy.tensors().map(|t| (t.name(), t));
        let written = serialize_to_writer(tensors, Some(metadata), &mut out)
            .with_context(|| format!("failed to repack {}", self.input.display()))?;

        info!(
            input = %self.input.display(),
            output = %self.output.display(),
            tensors = lazy.len(),
            bytes = written,
            "repacked"
        );
        Ok(())
    }
}
