//! Header inspection without touching tensor data.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use stcodec_io::{DType, DataOffsets, LazySafeTensors, Metadata, ReadConfig};

use super::open_lazy;

/// Inspect command arguments
#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Safetensors file to inspect
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Print a JSON document instead of a table
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub header_len: u64,
    pub buffer_len: u64,
    pub metadata: &'a Metadata,
    pub tensors: Vec<TensorRow<'a>>,
}

#[derive(Debug, Serialize)]
pub struct TensorRow<'a> {
    pub name: &'a str,
    pub dtype: DType,
    pub shape: &'a [u64],
    pub data_offsets: DataOffsets,
}

impl<'a> Report<'a> {
    pub fn new<R>(lazy: &'a LazySafeTensors<R>) -> Self {
        let header = lazy.header();
        let tensors = header
            .sorted_by_offsets()
            .into_iter()
            .map(|info| TensorRow {
                name: &info.name,
                dtype: info.dtype,
                shape: &info.shape,
                data_offsets: info.data_offsets,
            })
            .collect();
        Self {
            header_len: header.buffer_offset.saturating_sub(8),
            buffer_len: lazy.buffer_len(),
            metadata: lazy.metadata(),
            tensors,
        }
    }

    pub fn write_table<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "header: {} bytes, buffer: {} bytes, tensors: {}",
            self.header_len,
            self.buffer_len,
            self.tensors.len()
        )?;
        for (key, value) in self.metadata {
            writeln!(out, "metadata {key} = {value}")?;
        }
        for row in &self.tensors {
            let DataOffsets { begin, end } = row.data_offsets;
            writeln!(out, "{}\t{}\t{:?}\t[{begin}, {end})", row.name, row.dtype, row.shape)?;
        }
        Ok(())
    }
}

impl InspectCommand {
    pub fn execute(&self, config: &ReadConfig) -> Result<()> {
        let lazy = open_lazy(&self.file, config)?;
        let report = Report::new(&lazy);
        let mut out = io::stdout().lock();
        if self.json {
            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
        } else {
            report.write_table(&mut out)?;
        }
        Ok(())
    }
}
