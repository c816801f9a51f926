//! CLI command implementations

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use stcodec_io::{LazySafeTensors, ReadConfig};
use thiserror::Error;

pub mod extract;
pub mod inspect;
pub mod repack;
pub mod verify;

pub use extract::ExtractCommand;
pub use inspect::InspectCommand;
pub use repack::RepackCommand;
pub use verify::VerifyCommand;

/// The requested tensor is not in the file.
#[derive(Debug, Error)]
#[error("no tensor named {0:?}")]
pub struct TensorNotFound(pub String);

pub(crate) fn open_file(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Open `path` and parse its header without reading any tensor data.
pub(crate) fn open_lazy(
    path: &Path,
    config: &ReadConfig,
) -> Result<LazySafeTensors<BufReader<File>>> {
    LazySafeTensors::open_with_config(open_file(path)?, config)
        .with_context(|| format!("failed to read header of {}", path.display()))
}
