use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use super::BlockCodec;
use crate::error::{Error, Result};

pub struct DeflateCodec {
    level: Compression,
}

impl DeflateCodec {
    pub fn new(level: Option<i32>) -> Self {
        let level = match level {
            Some(l) => Compression::new(l.clamp(0, 9) as u32),
            None => Compression::default(),
        };
        DeflateCodec { level }
    }
}

impl BlockCodec for DeflateCodec {
    fn compress_block(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), self.level);
        encoder.write_all(data).map_err(Error::delegate)?;
        encoder.finish().map_err(Error::delegate)
    }

    fn decompress_block(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() * 3);
        DeflateDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(Error::delegate)?;
        Ok(out)
    }

    fn name(&self) -> &str {
        "Deflate"
    }
}
