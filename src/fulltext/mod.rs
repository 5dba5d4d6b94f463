//! Full-text index seam for content blocks.
//!
//! [`FullTextIndex`] is the contract the Pcdata blocks rely on. The shipped
//! [`ScanTextIndex`] keeps each block compressed in its image and answers
//! pattern queries by scanning the decompressed text with `memchr::memmem`.

use memchr::memmem;

use crate::bitrun::{BitReader, BitWriter};
use crate::compressor::BlockCodec;
use crate::error::{Error, Result};

pub trait FullTextIndex: Sized {
    fn build(text: &[u8], codec: &dyn BlockCodec) -> Result<Self>;

    /// Length of the indexed text.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes `[from, to)` of the indexed text.
    fn extract(&self, from: usize, to: usize) -> Result<Vec<u8>>;

    fn count(&self, pattern: &[u8]) -> Result<usize>;

    /// Starting positions of every occurrence, in text order.
    fn locate(&self, pattern: &[u8]) -> Result<Vec<usize>>;

    /// Every occurrence with up to `context` bytes on each side.
    fn display(&self, pattern: &[u8], context: usize) -> Result<Vec<Vec<u8>>>;

    fn to_bytes(&self) -> Vec<u8>;

    fn from_bytes(bytes: &[u8], codec: &dyn BlockCodec) -> Result<Self>;
}

/// Every match of a non-empty `pattern`, overlapping ones included.
fn overlapping<'a>(text: &'a [u8], pattern: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    let finder = memmem::Finder::new(pattern);
    let mut from = 0;
    std::iter::from_fn(move || {
        let pos = from + finder.find(text.get(from..)?)?;
        from = pos + 1;
        Some(pos)
    })
}

const STORED: u32 = 0;
const COMPRESSED: u32 = 1;

/// Compressed text searched by linear scan.
///
/// Image: a 32-bit mode word (stored or compressed), the 32-bit text length,
/// then the payload.
#[derive(Debug, Clone)]
pub struct ScanTextIndex {
    text: Vec<u8>,
    image: Vec<u8>,
}

impl FullTextIndex for ScanTextIndex {
    fn build(text: &[u8], codec: &dyn BlockCodec) -> Result<Self> {
        let packed = codec.compress(text)?;
        let mut writer = BitWriter::with_capacity(packed.len().min(text.len()) + 8);
        if packed.len() < text.len() {
            writer.write_u32(COMPRESSED);
            writer.write_len(text.len())?;
            writer.write_bytes(&packed);
        } else {
            writer.write_u32(STORED);
            writer.write_len(text.len())?;
            writer.write_bytes(text);
        }
        Ok(ScanTextIndex {
            text: text.to_vec(),
            image: writer.finish(),
        })
    }

    fn len(&self) -> usize {
        self.text.len()
    }

    fn extract(&self, from: usize, to: usize) -> Result<Vec<u8>> {
        if from > to || to > self.text.len() {
            return Err(Error::delegate(format!(
                "extract [{}, {}) outside text of length {}",
                from,
                to,
                self.text.len()
            )));
        }
        Ok(self.text[from..to].to_vec())
    }

    fn count(&self, pattern: &[u8]) -> Result<usize> {
        if pattern.is_empty() {
            return Ok(0);
        }
        Ok(overlapping(&self.text, pattern).count())
    }

    fn locate(&self, pattern: &[u8]) -> Result<Vec<usize>> {
        if pattern.is_empty() {
            return Ok(Vec::new());
        }
        Ok(overlapping(&self.text, pattern).collect())
    }

    fn display(&self, pattern: &[u8], context: usize) -> Result<Vec<Vec<u8>>> {
        let hits = self.locate(pattern)?;
        Ok(hits
            .into_iter()
            .map(|pos| {
                let from = pos.saturating_sub(context);
                let to = (pos + pattern.len() + context).min(self.text.len());
                self.text[from..to].to_vec()
            })
            .collect())
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.image.clone()
    }

    fn from_bytes(bytes: &[u8], codec: &dyn BlockCodec) -> Result<Self> {
        let mut reader = BitReader::new(bytes);
        let mode = reader.read_u32()?;
        let len = reader.read_len()?;
        let body = reader.read_bytes(reader.remaining_bits() / 8)?;
        let text = match mode {
            STORED if body.len() == len => body.to_vec(),
            COMPRESSED => codec.decompress_exact(body, len)?,
            _ => {
                return Err(Error::malformed(format!(
                    "text block mode {} with {} payload bytes for {} text bytes",
                    mode,
                    body.len(),
                    len
                )))
            }
        };
        Ok(ScanTextIndex {
            text,
            image: bytes.to_vec(),
        })
    }
}
