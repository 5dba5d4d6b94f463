use snap::raw::{Decoder, Encoder};

use super::BlockCodec;
use crate::error::{Error, Result};

pub struct SnappyCodec;

impl BlockCodec for SnappyCodec {
    fn compress_block(&self, data: &[u8]) -> Result<Vec<u8>> {
        Encoder::new().compress_vec(data).map_err(Error::delegate)
    }

    fn decompress_block(&self, data: &[u8]) -> Result<Vec<u8>> {
        Decoder::new().decompress_vec(data).map_err(Error::delegate)
    }

    fn name(&self) -> &str {
        "Snappy"
    }
}
