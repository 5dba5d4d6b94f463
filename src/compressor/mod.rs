pub mod deflate;
pub mod lz4;
pub mod raw;
pub mod snappy;
pub mod zstd;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// General-purpose block compressor used for every index block.
///
/// Compressed blocks are self-describing: `decompress` recovers the original
/// length without being told.
pub trait BlockCodec: Send + Sync {
    /// Compresses one non-empty block.
    fn compress_block(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompresses one non-empty block.
    fn decompress_block(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Returns the name of the codec.
    fn name(&self) -> &str;

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        self.compress_block(data)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        self.decompress_block(data)
    }

    /// Decompresses and checks the result against the length implied by the
    /// surrounding bookkeeping.
    fn decompress_exact(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let out = self.decompress(data)?;
        if out.len() != expected_len {
            return Err(Error::malformed(format!(
                "{} block decompressed to {} bytes, expected {}",
                self.name(),
                out.len(),
                expected_len
            )));
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Zstd,
    Lz4,
    Snappy,
    Deflate,
    Raw,
}

impl CodecKind {
    pub const ALL: [CodecKind; 5] = [
        CodecKind::Zstd,
        CodecKind::Lz4,
        CodecKind::Snappy,
        CodecKind::Deflate,
        CodecKind::Raw,
    ];

    /// Instantiates the codec; `level` only applies to zstd and deflate.
    pub fn build(self, level: Option<i32>) -> Arc<dyn BlockCodec> {
        match self {
            CodecKind::Zstd => Arc::new(zstd::ZstdCodec::new(level)),
            CodecKind::Lz4 => Arc::new(lz4::Lz4Codec),
            CodecKind::Snappy => Arc::new(snappy::SnappyCodec),
            CodecKind::Deflate => Arc::new(deflate::DeflateCodec::new(level)),
            CodecKind::Raw => Arc::new(raw::RawCodec),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CodecKind::Zstd => "zstd",
            CodecKind::Lz4 => "lz4",
            CodecKind::Snappy => "snappy",
            CodecKind::Deflate => "deflate",
            CodecKind::Raw => "raw",
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodecKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CodecKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Config(format!("unknown codec '{}'", s)))
    }
}
