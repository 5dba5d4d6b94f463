use crate::bitrun::{BitReader, BitWriter};
use crate::error::Result;

/// Growable bit vector over 64-bit words, least significant bit first.
#[derive(Default, Clone, Debug, Eq, PartialEq)]
pub struct BitVector {
    data: Vec<u64>,
    position: usize,
}

impl BitVector {
    /// Creates a new empty binary vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty binary vector with at least a capacity of ```n_bits```.
    pub fn with_capacity(n_bits: usize) -> Self {
        let capacity = (n_bits + 63) / 64;
        Self {
            data: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Decodes `n_bits` bits packed most significant bit first.
    pub fn from_msb_bytes(bytes: &[u8], n_bits: usize) -> Result<Self> {
        let mut bv = Self::with_capacity(n_bits);
        let mut reader = BitReader::new(bytes);
        let mut remaining = n_bits;
        while remaining > 0 {
            let width = remaining.min(32);
            let chunk = reader.read_bits(width as u32)?;
            // Reverse so the first bit read lands at the lowest index.
            let reversed = chunk.reverse_bits() >> (32 - width);
            bv.append_bits(u64::from(reversed), width);
            remaining -= width;
        }
        Ok(bv)
    }

    /// Packs the bits in `[from, to)` most significant bit first.
    pub fn to_msb_bytes(&self, from: usize, to: usize) -> Vec<u8> {
        let mut writer = BitWriter::with_capacity((to - from + 7) / 8);
        let mut pos = from;
        while pos < to {
            let width = (to - pos).min(32);
            let bits = self.get_bits(pos, width).unwrap_or(0) as u32;
            writer.write_bits(bits.reverse_bits() >> (32 - width), width as u32);
            pos += width;
        }
        writer.finish()
    }

    #[inline]
    pub fn push(&mut self, bit: bool) {
        let pos_in_word = self.position % 64;
        if pos_in_word == 0 {
            self.data.push(0);
        }
        if bit {
            if let Some(last) = self.data.last_mut() {
                *last |= 1u64 << pos_in_word;
            }
        }
        self.position += 1;
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.position {
            return None;
        }
        let word = index >> 6;
        let pos_in_word = index & 63;
        Some(self.data[word] >> pos_in_word & 1_u64 == 1)
    }

    /// Sets the bit at position ```index``` to ```bit```.
    #[inline(always)]
    pub fn set(&mut self, index: usize, bit: bool) {
        let word = index >> 6;
        let pos_in_word = index & 63;
        self.data[word] &= !(1_u64 << pos_in_word);
        self.data[word] |= (bit as u64) << pos_in_word;
    }

    #[inline(always)]
    pub fn append_bits(&mut self, bits: u64, len: usize) {
        assert!(len <= 64);
        assert!(len == 64 || (bits >> len) == 0);
        if len == 0 {
            return;
        }
        let pos_in_word: usize = self.position & 63;
        self.position += len;

        if pos_in_word == 0 {
            self.data.push(bits);
        } else if let Some(last) = self.data.last_mut() {
            *last |= bits << pos_in_word;
            if len > 64 - pos_in_word {
                self.data.push(bits >> (64 - pos_in_word));
            }
        }
    }

    #[inline(always)]
    pub fn get_bits(&self, index: usize, len: usize) -> Option<u64> {
        if (len > 64) | (index + len > self.position) {
            return None;
        }
        if len == 0 {
            return Some(0);
        }
        let block = index >> 6;
        let shift = index & 63;

        let mask = if len == 64 { u64::MAX } else { (1_u64 << len) - 1 };

        if shift + len <= 64 {
            return Some(self.data[block] >> shift & mask);
        }
        Some(((self.data[block] >> shift) | (self.data[block + 1] << (64 - shift))) & mask)
    }

    /// Position of the first set bit strictly after `pos`.
    #[inline(always)]
    pub fn next_one(&self, pos: usize) -> Option<usize> {
        let mut next_pos = pos + 1;
        if next_pos >= self.position {
            return None;
        }
        let mut word_pos = next_pos >> 6;
        let mut buffer = self.data[word_pos] >> (next_pos % 64);

        while buffer == 0 {
            next_pos += 64 - (next_pos % 64);
            word_pos = next_pos >> 6;
            if word_pos >= self.data.len() {
                return None;
            }
            buffer = self.data[word_pos];
        }
        next_pos += buffer.trailing_zeros() as usize;

        Some(next_pos).filter(|&p| p < self.position)
    }

    /// Number of set bits in `[0, pos]`.
    pub fn rank1(&self, pos: usize) -> Option<usize> {
        if pos >= self.position {
            return None;
        }
        let word = pos >> 6;
        let full: usize = self.data[..word].iter().map(|w| w.count_ones() as usize).sum();
        let shift = pos & 63;
        let mask = if shift == 63 { u64::MAX } else { (1u64 << (shift + 1)) - 1 };
        Some(full + (self.data[word] & mask).count_ones() as usize)
    }

    /// Position of the `rank`-th set bit, 1-indexed.
    pub fn select1(&self, rank: usize) -> Option<usize> {
        if rank == 0 {
            return None;
        }
        let mut remaining = rank;
        for (i, &word) in self.data.iter().enumerate() {
            let ones = word.count_ones() as usize;
            if ones >= remaining {
                let mut w = word;
                for _ in 1..remaining {
                    w &= w - 1;  // drop lowest set bit
                }
                let pos = (i << 6) + w.trailing_zeros() as usize;
                return Some(pos).filter(|&p| p < self.position);
            }
            remaining -= ones;
        }
        None
    }

    pub fn count_ones(&self) -> usize {
        self.data.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Checks if the vector is empty.
    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    /// Returns the number of bits in the bitvector.
    pub fn len(&self) -> usize {
        self.position
    }

    pub fn ones(&self, pos: usize) -> UnaryIterOnes<'_> {
        UnaryIterOnes::new(self, pos)
    }
}

// Iterator over positions of set bits
pub struct UnaryIterOnes<'a> {
    bv: &'a BitVector,
    pos: usize,
    word_pos: usize,
    buffer: u64,
}

impl<'a> UnaryIterOnes<'a> {
    // Creates the iterator from the given bit position
    pub fn new(bv: &'a BitVector, pos: usize) -> UnaryIterOnes<'a> {
        let word_pos = pos >> 6;
        let buffer = if word_pos < bv.data.len() {
            bv.data[word_pos] >> (pos % 64)
        } else {
            0
        };

        UnaryIterOnes {
            bv,
            pos,
            word_pos,
            buffer,
        }
    }
}

impl<'a> Iterator for UnaryIterOnes<'a> {
    type Item = usize;

    #[inline(always)]
    fn next(&mut self) -> Option<usize> {
        while self.buffer == 0 {
            self.pos += 64 - (self.pos % 64);
            self.word_pos = self.pos >> 6;
            if self.word_pos >= self.bv.data.len() {
                return None;
            }
            self.buffer = self.bv.data[self.word_pos];
        }
        let pos_in_word: usize = self.buffer.trailing_zeros() as usize;
        self.pos += pos_in_word + 1;
        self.word_pos = self.pos >> 6;
        self.buffer = if self.word_pos < self.bv.data.len() {
            self.bv.data[self.word_pos] >> (self.pos % 64)
        } else {
            0
        };
        Some(self.pos - 1).filter(|&p| p < self.bv.position)
    }
}

impl FromIterator<bool> for BitVector {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut bv = BitVector::new();
        for bit in iter {
            bv.push(bit);
        }
        bv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(pattern: &str) -> BitVector {
        pattern.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn rank_and_select_agree() {
        let bv = bits("1001101000000000000000000000000000000000000000000000000000000000011");
        assert_eq!(bv.count_ones(), 6);
        assert_eq!(bv.rank1(0), Some(1));
        assert_eq!(bv.rank1(3), Some(2));
        assert_eq!(bv.rank1(bv.len() - 1), Some(6));
        assert_eq!(bv.rank1(bv.len()), None);
        for r in 1..=6 {
            let pos = bv.select1(r).unwrap();
            assert_eq!(bv.rank1(pos), Some(r));
            assert_eq!(bv.get(pos), Some(true));
        }
        assert_eq!(bv.select1(0), None);
        assert_eq!(bv.select1(7), None);
    }

    #[test]
    fn msb_packing_is_reversible() {
        let bv = bits("1100000101");
        let packed = bv.to_msb_bytes(0, bv.len());
        assert_eq!(packed, vec![0b1100_0001, 0b0100_0000]);
        assert_eq!(BitVector::from_msb_bytes(&packed, bv.len()).unwrap(), bv);

        let tail = bv.to_msb_bytes(6, 10);
        assert_eq!(BitVector::from_msb_bytes(&tail, 4).unwrap(), bits("0101"));
    }

    #[test]
    fn truncated_bytes_are_malformed() {
        assert!(BitVector::from_msb_bytes(&[0xff], 9).is_err());
    }

    #[test]
    fn ones_iterator_and_next_one() {
        let mut bv = BitVector::with_capacity(130);
        for i in 0..130 {
            bv.push(i % 64 == 3 || i == 129);
        }
        let ones: Vec<usize> = bv.ones(0).collect();
        assert_eq!(ones, vec![3, 67, 129]);
        assert_eq!(bv.next_one(3), Some(67));
        assert_eq!(bv.next_one(67), Some(129));
        assert_eq!(bv.next_one(129), None);
    }

    #[test]
    fn append_bits_crosses_words() {
        let mut bv = BitVector::new();
        bv.append_bits(0, 60);
        bv.append_bits(0b1011, 4);
        bv.append_bits(0b1, 1);
        assert_eq!(bv.len(), 65);
        assert_eq!(bv.get_bits(60, 5), Some(0b11011));
    }
}
