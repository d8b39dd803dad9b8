use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{LsfsError, LsfsResult};
use crate::types::MAC_SIZE;

/// Smallest accepted plaintext block size.
pub const MIN_BLOCK_SIZE: u32 = 32;
/// Accepted IV length range, inclusive.
pub const MIN_IV_SIZE: u32 = 12;
pub const MAX_IV_SIZE: u32 = 32;

/// Top-level configuration (loaded from lsfs.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LsfsConfig {
    pub stream: StreamConfig,
    pub log: LogConfig,
}

impl LsfsConfig {
    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> LsfsResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| LsfsError::Config(format!("parsing {}: {e}", path.display())))?;
        config.stream.validate()?;
        Ok(config)
    }
}

/// Geometry and policy of an encrypted stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Plaintext bytes per block (default: 4096, minimum 32)
    pub block_size: u32,
    /// IV bytes stored in front of every block (default: 12, range 12..=32)
    pub iv_size: u32,
    /// Fail reads whose authentication tag does not match (default: true)
    pub integrity_check: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            block_size: 4096,
            iv_size: 12,
            integrity_check: true,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> LsfsResult<()> {
        if !(MIN_IV_SIZE..=MAX_IV_SIZE).contains(&self.iv_size) {
            return Err(LsfsError::Config(format!(
                "IV size too small or too large: {} (expected {MIN_IV_SIZE}..={MAX_IV_SIZE})",
                self.iv_size
            )));
        }
        if self.block_size < MIN_BLOCK_SIZE {
            return Err(LsfsError::Config(format!(
                "block size too small: {} (minimum {MIN_BLOCK_SIZE})",
                self.block_size
            )));
        }
        Ok(())
    }

    /// Per-block bytes that carry no plaintext: IV plus tag.
    pub fn block_overhead(&self) -> usize {
        self.iv_size as usize + MAC_SIZE
    }

    /// On-disk size of a full block.
    pub fn physical_block_size(&self) -> usize {
        self.block_size as usize + self.block_overhead()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}
