//! Reader configuration.

use serde::{Deserialize, Serialize};

use crate::DEFAULT_HEADER_SIZE_LIMIT;

/// Limits applied while decoding untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    /// Largest accepted JSON header length in bytes. Headers declaring a
    /// larger length are rejected before any of it is read.
    pub header_size_limit: u64,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self { header_size_limit: DEFAULT_HEADER_SIZE_LIMIT }
    }
}

impl ReadConfig {
    pub fn with_header_size_limit(mut self, limit: u64) -> Self {
        self.header_size_limit = limit;
        self
    }

    /// Configuration without a header length ceiling.
    pub fn unlimited() -> Self {
        Self { header_size_limit: u64::MAX }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limit() {
        assert_eq!(ReadConfig::default().header_size_limit, 100_000_000);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: ReadConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, ReadConfig::default());

        let cfg: ReadConfig = serde_json::from_str(r#"{"header_size_limit":4096}"#).unwrap();
        assert_eq!(cfg.header_size_limit, 4096);
    }

    #[test]
    fn builder() {
        let cfg = ReadConfig::default().with_header_size_limit(64);
        assert_eq!(cfg.header_size_limit, 64);
        assert_eq!(ReadConfig::unlimited().header_size_limit, u64::MAX);
    }
}
