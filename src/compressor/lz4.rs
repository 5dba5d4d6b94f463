use lz4::block;

use super::BlockCodec;
use crate::error::{Error, Result};

/// LZ4 block format with the uncompressed size prepended to each block.
pub struct Lz4Codec;

impl BlockCodec for Lz4Codec {
    fn compress_block(&self, data: &[u8]) -> Result<Vec<u8>> {
        block::compress(data, None, true).map_err(Error::delegate)
    }

    fn decompress_block(&self, data: &[u8]) -> Result<Vec<u8>> {
        block::decompress(data, None).map_err(Error::delegate)
    }

    fn name(&self) -> &str {
        "LZ4"
    }
}
