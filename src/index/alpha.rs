use std::sync::Arc;

use crate::compressor::BlockCodec;
use crate::error::{Error, Result};
use crate::tree::{ATTRIBUTE_MARKER, TAG_MARKER};
use crate::xbwt::Alphabet;

use super::AccessStats;

/// Blocked `Alpha` token stream with per-symbol rank/select.
///
/// Blocks hold `block_len` tokens (the final one fewer), stored as the
/// concatenation of their token bytes. `counts` keeps, for every block, the
/// occurrences of each code from row 0 through the end of that block; the
/// empty sentinel block repeats the totals.
pub struct AlphaBlockIndex {
    payload: Vec<u8>,
    offsets: Vec<u32>,          // Byte offset of each block, sentinel included
    counts: Vec<u32>,           // blocks x cardinality cumulative counts
    block_len: usize,
    rows: usize,
    alphabet: Alphabet,
    codec: Arc<dyn BlockCodec>,
}

impl AlphaBlockIndex {
    pub fn build(
        alpha: &[u32],
        alphabet: Alphabet,
        block_len: usize,
        codec: Arc<dyn BlockCodec>,
    ) -> Result<Self> {
        if block_len == 0 {
            return Err(Error::Config("block symbol count must be positive".into()));
        }
        let sigma = alphabet.len();
        let mut payload = Vec::new();
        let mut offsets = Vec::new();
        let mut counts = Vec::new();
        let mut running = vec![0u32; sigma];
        let mut raw = Vec::new();

        for chunk in alpha.chunks(block_len) {
            offsets.push(payload.len() as u32);
            raw.clear();
            for &code in chunk {
                raw.extend_from_slice(alphabet.token(code));
                if let Some(count) = running.get_mut(code as usize) {
                    *count += 1;
                }
            }
            payload.extend_from_slice(&codec.compress(&raw)?);
            counts.extend_from_slice(&running);
        }
        offsets.push(payload.len() as u32);
        counts.extend_from_slice(&running);

        Ok(AlphaBlockIndex {
            payload,
            offsets,
            counts,
            block_len,
            rows: alpha.len(),
            alphabet,
            codec,
        })
    }

    /// Restores the index from its persisted parts. The block length is
    /// recovered from the counts of block 0, which also holds the root row.
    pub fn from_parts(
        payload: Vec<u8>,
        offsets: Vec<u32>,
        counts: Vec<u32>,
        alphabet: Alphabet,
        rows: usize,
        codec: Arc<dyn BlockCodec>,
    ) -> Result<Self> {
        let sigma = alphabet.len();
        if offsets.len() < 2 || counts.len() != offsets.len() * sigma {
            return Err(Error::malformed("alpha block table has the wrong shape"));
        }
        if offsets.windows(2).any(|w| w[0] > w[1])
            || *offsets.last().unwrap_or(&0) as usize != payload.len()
        {
            return Err(Error::malformed("alpha block offsets are inconsistent"));
        }
        let blocks = offsets.len() - 1;
        let totals = &counts[blocks * sigma..];
        if totals.iter().map(|&c| c as usize).sum::<usize>() + 1 != rows {
            return Err(Error::malformed("alpha counts do not cover every row"));
        }
        let block_len = if blocks == 1 {
            rows
        } else {
            counts[..sigma].iter().map(|&c| c as usize).sum::<usize>() + 1
        };
        if block_len == 0 || (rows + block_len - 1) / block_len != blocks {
            return Err(Error::malformed("alpha block count disagrees with the row count"));
        }
        Ok(AlphaBlockIndex {
            payload,
            offsets,
            counts,
            block_len,
            rows,
            alphabet,
            codec,
        })
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn block_count(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Occurrences of `code` in blocks `0..block`.
    fn count_before_block(&self, code: u32, block: usize) -> usize {
        match block {
            0 => 0,
            _ => self.counts[(block - 1) * self.alphabet.len() + code as usize] as usize,
        }
    }

    pub fn total(&self, code: u32) -> usize {
        self.counts[self.block_count() * self.alphabet.len() + code as usize] as usize
    }

    fn decode_block(&self, block: usize, stats: &mut AccessStats) -> Result<Vec<u32>> {
        let from = self.offsets[block] as usize;
        let to = self.offsets[block + 1] as usize;
        stats.touch_alpha(to - from);
        let raw = self
            .codec
            .decompress(&self.payload[from..to])
            .map_err(|e| e.in_block(block))?;

        let expected = self.block_len.min(self.rows - block * self.block_len);
        let mut codes = Vec::with_capacity(expected);
        for token in split_tokens(&raw) {
            let code = self.alphabet.code(token).ok_or_else(|| {
                Error::malformed(format!(
                    "alpha block {} holds unknown token {}",
                    block,
                    String::from_utf8_lossy(token)
                ))
            })?;
            codes.push(code);
        }
        if codes.len() != expected {
            return Err(Error::malformed(format!(
                "alpha block {} decoded {} tokens, expected {}",
                block,
                codes.len(),
                expected
            )));
        }
        Ok(codes)
    }

    fn check_code(&self, code: u32) -> Result<()> {
        if code as usize >= self.alphabet.len() {
            return Err(Error::SymbolNotFound(format!("code {}", code)));
        }
        Ok(())
    }

    /// Occurrences of `code` in `Alpha[0..=pos]`.
    pub fn rank(&self, code: u32, pos: usize, stats: &mut AccessStats) -> Result<usize> {
        self.check_code(code)?;
        if pos >= self.rows {
            return Err(Error::out_of_range("rank position", pos, self.rows));
        }
        let block = pos / self.block_len;
        let codes = self.decode_block(block, stats)?;
        let local = codes[..=pos - block * self.block_len]
            .iter()
            .filter(|&&c| c == code)
            .count();
        Ok(self.count_before_block(code, block) + local)
    }

    /// Position of the `rank`-th occurrence of `code`, 1-indexed.
    pub fn select(&self, code: u32, rank: usize, stats: &mut AccessStats) -> Result<usize> {
        self.check_code(code)?;
        let total = self.total(code);
        if rank == 0 || rank > total {
            return Err(Error::out_of_range("select rank", rank, total));
        }
        let sigma = self.alphabet.len();
        let block = (0..self.block_count())
            .find(|&b| self.counts[b * sigma + code as usize] as usize >= rank)
            .ok_or_else(|| Error::malformed("alpha counts never reach the total"))?;
        let mut needed = rank - self.count_before_block(code, block);
        let codes = self.decode_block(block, stats)?;
        for (i, &c) in codes.iter().enumerate() {
            if c == code {
                needed -= 1;
                if needed == 0 {
                    return Ok(block * self.block_len + i);
                }
            }
        }
        Err(Error::malformed(format!("alpha block {} is short of code {}", block, code)))
    }

    /// Label code of the row at `pos`.
    pub fn code_at(&self, pos: usize, stats: &mut AccessStats) -> Result<u32> {
        if pos >= self.rows {
            return Err(Error::out_of_range("row", pos, self.rows));
        }
        let block = pos / self.block_len;
        let codes = self.decode_block(block, stats)?;
        Ok(codes[pos - block * self.block_len])
    }

    /// Decodes every block back into one code sequence.
    pub fn decode_all(&self, stats: &mut AccessStats) -> Result<Vec<u32>> {
        let mut all = Vec::with_capacity(self.rows);
        for block in 0..self.block_count() {
            all.extend(self.decode_block(block, stats)?);
        }
        Ok(all)
    }
}

/// Splits concatenated tokens at their marker bytes.
pub fn split_tokens(raw: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        if pos >= raw.len() {
            return None;
        }
        let start = pos;
        pos += 1;
        while pos < raw.len() && !matches!(raw[pos], TAG_MARKER | ATTRIBUTE_MARKER | b'=') {
            pos += 1;
        }
        Some(&raw[start..pos])
    })
}
