use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{SstreamError, SstreamResult};
use crate::types::Variant;

/// Default maximum plaintext length of a single chunk.
pub const DEFAULT_MAX_CHUNK_LEN: usize = 65535;

/// Top-level configuration (loaded from sstream.toml)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SstreamConfig {
    pub stream: StreamConfig,
    pub log: LogConfig,
}

/// Parameters both sides of a stream must agree on out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Wire protocol variant (default: subkey-derived)
    pub variant: Variant,
    /// Maximum plaintext bytes per chunk (default: 65535)
    pub max_chunk_len: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            variant: Variant::SubkeyDerived,
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
        }
    }
}

impl StreamConfig {
    pub fn new(variant: Variant, max_chunk_len: usize) -> Self {
        Self {
            variant,
            max_chunk_len,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl SstreamConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file is
    /// an error.
    pub fn load(path: &Path) -> SstreamResult<Self> {
        if !path.exists() {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| SstreamError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml(&self) -> SstreamResult<String> {
        toml::to_string_pretty(self).map_err(|e| SstreamError::Config(e.to_string()))
    }
}
