use super::BlockCodec;
use crate::error::{Error, Result};

pub struct ZstdCodec {
    level: i32, // Compression level handed to libzstd
}

impl ZstdCodec {
    pub fn new(level: Option<i32>) -> Self {
        ZstdCodec {
            level: level.unwrap_or(zstd::DEFAULT_COMPRESSION_LEVEL),
        }
    }
}

impl BlockCodec for ZstdCodec {
    fn compress_block(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::bulk::compress(data, self.level).map_err(Error::delegate)
    }

    fn decompress_block(&self, data: &[u8]) -> Result<Vec<u8>> {
        // Frames written by `bulk::compress` carry their content size.
        zstd::stream::decode_all(data).map_err(Error::delegate)
    }

    fn name(&self) -> &str {
        "Zstd"
    }
}
