//! Raw (uncompressed) baseline codec.
//!
//! Keeps blocks in their original form behind the same interface as the
//! compressing codecs. Useful to measure what compression buys on a given
//! document.

use super::BlockCodec;
use crate::error::Result;

pub struct RawCodec;

impl BlockCodec for RawCodec {
    fn compress_block(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress_block(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn name(&self) -> &str {
        "Raw"
    }
}
