//! Resolution of the [`ReadConfig`] used by every command.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use stcodec_format::ReadConfig;
use tracing::debug;

/// Load `config` (JSON) if given, then apply a `--header-limit` override.
///
/// Fields missing from the file keep their defaults.
pub fn resolve(config: Option<&Path>, header_limit: Option<u64>) -> Result<ReadConfig> {
    let mut resolved = match config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => ReadConfig::default(),
    };
    if let Some(limit) = header_limit {
        resolved = resolved.with_header_size_limit(limit);
    }
    debug!(header_size_limit = resolved.header_size_limit, "read configuration");
    Ok(resolved)
}
