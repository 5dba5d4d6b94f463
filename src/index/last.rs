use std::sync::Arc;

use crate::bit_vector::BitVector;
use crate::compressor::BlockCodec;
use crate::error::{Error, Result};

use super::AccessStats;

/// Blocked `Last` bit vector with rank/select.
///
/// Every block but the final one holds exactly `population` set bits; an
/// empty sentinel block starting at row `len()` closes the table.
pub struct LastBlockIndex {
    payload: Vec<u8>,           // Concatenated compressed blocks
    offsets: Vec<u32>,          // Byte offset of each block, sentinel included
    start_rows: Vec<u32>,       // First row of each block, sentinel included
    population: usize,          // Set bits per full block
    ones: usize,                // Set bits overall
    codec: Arc<dyn BlockCodec>,
}

impl LastBlockIndex {
    pub fn build(last: &BitVector, population: usize, codec: Arc<dyn BlockCodec>) -> Result<Self> {
        if population == 0 {
            return Err(Error::Config("block population must be positive".into()));
        }
        let mut payload = Vec::new();
        let mut offsets = Vec::new();
        let mut start_rows = Vec::new();

        let mut block_start = 0usize;
        let mut seen = 0usize;
        let mut push_block = |from: usize, to: usize, payload: &mut Vec<u8>| -> Result<()> {
            offsets.push(payload.len() as u32);
            start_rows.push(from as u32);
            let packed = last.to_msb_bytes(from, to);
            payload.extend_from_slice(&codec.compress(&packed)?);
            Ok(())
        };
        for pos in last.ones(0) {
            seen += 1;
            if seen % population == 0 {
                push_block(block_start, pos + 1, &mut payload)?;
                block_start = pos + 1;
            }
        }
        if block_start < last.len() {
            push_block(block_start, last.len(), &mut payload)?;
        }
        offsets.push(payload.len() as u32);
        start_rows.push(last.len() as u32);

        Ok(LastBlockIndex {
            payload,
            offsets,
            start_rows,
            population,
            ones: seen,
            codec,
        })
    }

    /// Restores the index from its persisted parts, recovering the block
    /// population and the total count of set bits from the blocks themselves.
    pub fn from_parts(
        payload: Vec<u8>,
        offsets: Vec<u32>,
        start_rows: Vec<u32>,
        codec: Arc<dyn BlockCodec>,
    ) -> Result<Self> {
        if offsets.len() != start_rows.len() || offsets.len() < 2 {
            return Err(Error::malformed("last index needs at least one block and a sentinel"));
        }
        if offsets.windows(2).any(|w| w[0] > w[1])
            || *offsets.last().unwrap_or(&0) as usize != payload.len()
        {
            return Err(Error::malformed("last block offsets are inconsistent"));
        }
        if start_rows[0] != 0 || start_rows.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::malformed("last block start rows are not increasing"));
        }
        let mut index = LastBlockIndex {
            payload,
            offsets,
            start_rows,
            population: 1,
            ones: 0,
            codec,
        };
        let blocks = index.block_count();
        let mut scratch = AccessStats::default();
        let first_ones = index.decode_block(0, &mut scratch)?.count_ones();
        let tail_ones = index.decode_block(blocks - 1, &mut scratch)?.count_ones();
        if blocks == 1 {
            index.population = first_ones.max(1);
            index.ones = first_ones;
        } else {
            if first_ones == 0 || tail_ones > first_ones {
                return Err(Error::malformed("last blocks disagree on their population"));
            }
            index.population = first_ones;
            index.ones = first_ones * (blocks - 1) + tail_ones;
        }
        Ok(index)
    }

    /// Number of real blocks, sentinel excluded.
    pub fn block_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.start_rows[self.block_count()] as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_ones(&self) -> usize {
        self.ones
    }

    pub fn population(&self) -> usize {
        self.population
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn start_rows(&self) -> &[u32] {
        &self.start_rows
    }

    fn decode_block(&self, block: usize, stats: &mut AccessStats) -> Result<BitVector> {
        let from = self.offsets[block] as usize;
        let to = self.offsets[block + 1] as usize;
        let n_bits = (self.start_rows[block + 1] - self.start_rows[block]) as usize;
        stats.touch_last(to - from);
        let packed = self
            .codec
            .decompress_exact(&self.payload[from..to], (n_bits + 7) / 8)
            .map_err(|e| e.in_block(block))?;
        BitVector::from_msb_bytes(&packed, n_bits)
    }

    /// Number of set bits in `Last[0..=pos]`.
    pub fn rank1(&self, pos: usize, stats: &mut AccessStats) -> Result<usize> {
        if pos >= self.len() {
            return Err(Error::out_of_range("rank1 position", pos, self.len()));
        }
        let block = self.start_rows[..self.block_count()].partition_point(|&s| s as usize <= pos) - 1;
        let bits = self.decode_block(block, stats)?;
        let local = bits
            .rank1(pos - self.start_rows[block] as usize)
            .ok_or_else(|| Error::malformed(format!("last block {} is too short", block)))?;
        Ok(block * self.population + local)
    }

    /// Number of set bits in `Last[0..row)`.
    pub fn rank1_before(&self, row: usize, stats: &mut AccessStats) -> Result<usize> {
        match row {
            0 => Ok(0),
            _ => self.rank1(row - 1, stats),
        }
    }

    /// Position of the `rank`-th set bit, 1-indexed.
    pub fn select1(&self, rank: usize, stats: &mut AccessStats) -> Result<usize> {
        if rank == 0 || rank > self.ones {
            return Err(Error::out_of_range("select1 rank", rank, self.ones));
        }
        let block = (rank - 1) / self.population;
        let local = (rank - 1) % self.population + 1;
        let bits = self.decode_block(block, stats)?;
        let pos = bits
            .select1(local)
            .ok_or_else(|| Error::malformed(format!("last block {} lacks set bit {}", block, local)))?;
        Ok(self.start_rows[block] as usize + pos)
    }

    /// Decodes every block back into one bit vector.
    pub fn decode_all(&self, stats: &mut AccessStats) -> Result<BitVector> {
        let mut all = BitVector::with_capacity(self.len());
        for block in 0..self.block_count() {
            let bits = self.decode_block(block, stats)?;
            for bit in 0..bits.len() {
                all.push(bits.get(bit) == Some(true));
            }
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::CodecKind;

    fn bits(pattern: &str) -> BitVector {
        pattern.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn blocks_close_on_population() {
        let last = bits("1011001110001");
        let index = LastBlockIndex::build(&last, 3, CodecKind::Raw.build(None)).unwrap();
        // ones at 0 2 3 6 7 8 12: blocks end after 3 and 8, tail holds one bit
        assert_eq!(index.start_rows(), &[0, 4, 9, 13]);
        assert_eq!(index.count_ones(), 7);
        assert_eq!(index.len(), 13);
    }

    #[test]
    fn rank_select_match_plain_vector() {
        let pattern = "1001011100010101111000001011";
        let last = bits(pattern);
        for kind in [CodecKind::Zstd, CodecKind::Lz4, CodecKind::Raw] {
            let index = LastBlockIndex::build(&last, 4, kind.build(None)).unwrap();
            let mut stats = AccessStats::default();
            for pos in 0..last.len() {
                assert_eq!(index.rank1(pos, &mut stats).unwrap(), last.rank1(pos).unwrap());
            }
            for rank in 1..=last.count_ones() {
                assert_eq!(index.select1(rank, &mut stats).unwrap(), last.select1(rank).unwrap());
            }
            assert_eq!(stats.last_blocks as usize, last.len() + last.count_ones());
            assert_eq!(index.decode_all(&mut stats).unwrap(), last);
        }
    }

    #[test]
    fn out_of_range_arguments() {
        let last = bits("0101");
        let index = LastBlockIndex::build(&last, 8, CodecKind::Raw.build(None)).unwrap();
        let mut stats = AccessStats::default();
        assert!(matches!(index.rank1(4, &mut stats), Err(Error::OutOfRange { .. })));
        assert!(matches!(index.select1(0, &mut stats), Err(Error::OutOfRange { .. })));
        assert!(matches!(index.select1(3, &mut stats), Err(Error::OutOfRange { .. })));
        assert_eq!(index.rank1_before(0, &mut stats).unwrap(), 0);
        assert_eq!(stats.total_blocks(), 0);
    }

    #[test]
    fn parts_restore_population() {
        let last = bits("110111011101111");
        let codec = CodecKind::Snappy.build(None);
        let built = LastBlockIndex::build(&last, 3, codec.clone()).unwrap();
        let restored = LastBlockIndex::from_parts(
            built.payload().to_vec(),
            built.offsets().to_vec(),
            built.start_rows().to_vec(),
            codec,
        )
        .unwrap();
        assert_eq!(restored.population(), 3);
        assert_eq!(restored.count_ones(), last.count_ones());
        let mut stats = AccessStats::default();
        assert_eq!(restored.select1(7, &mut stats).unwrap(), last.select1(7).unwrap());
    }
}
