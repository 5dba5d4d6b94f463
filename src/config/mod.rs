use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compressor::{BlockCodec, CodecKind};
use crate::error::{Error, Result};

pub const DEFAULT_BLOCK_POPULATION: u32 = 1000;
pub const DEFAULT_BLOCK_SYMBOL_COUNT: u32 = 8000;
pub const DEFAULT_SNIPPET_CONTEXT: usize = 20;

/// Settings shared by index construction, loading and querying.
///
/// The codec is not recorded in the index image, so an image must be loaded
/// with the same `codec` it was built with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub block_population: u32,          // Number of 1-bits closing a `Last` block
    pub block_symbol_count: u32,        // Number of tokens in an `Alpha` block
    pub codec: CodecKind,               // Codec used for every block
    pub compression_level: Option<i32>, // zstd / deflate level, codec default if unset
    pub trim_whitespace: bool,          // Drop whitespace-only text while parsing
    pub snippet_context: usize,         // Bytes shown around each search hit
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            block_population: DEFAULT_BLOCK_POPULATION,
            block_symbol_count: DEFAULT_BLOCK_SYMBOL_COUNT,
            codec: CodecKind::default(),
            compression_level: None,
            trim_whitespace: false,
            snippet_context: DEFAULT_SNIPPET_CONTEXT,
        }
    }
}

impl IndexConfig {
    /// Loads a configuration from a JSON file; missing keys take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: IndexConfig =
            serde_json::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_population == 0 {
            return Err(Error::Config("block_population must be positive".into()));
        }
        if self.block_symbol_count == 0 {
            return Err(Error::Config("block_symbol_count must be positive".into()));
        }
        Ok(())
    }

    pub fn build_codec(&self) -> Arc<dyn BlockCodec> {
        self.codec.build(self.compression_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = IndexConfig::from_json_str(r#"{ "codec": "lz4", "block_population": 16 }"#)
            .unwrap();
        assert_eq!(config.codec, CodecKind::Lz4);
        assert_eq!(config.block_population, 16);
        assert_eq!(config.block_symbol_count, DEFAULT_BLOCK_SYMBOL_COUNT);
        assert!(!config.trim_whitespace);
    }

    #[test]
    fn zero_block_sizes_are_rejected() {
        assert!(matches!(
            IndexConfig::from_json_str(r#"{ "block_symbol_count": 0 }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            IndexConfig::from_json_str(r#"{ "codec": "brotli" }"#),
            Err(Error::Config(_))
        ));
    }
}
