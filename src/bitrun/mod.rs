//! Big-endian bit packing.
//!
//! Values are written most significant bit first. Every integer field of the
//! index image goes through a [`BitWriter`] as a 32-bit word, and `Last`
//! blocks are packed bit by bit with the same writer.

use crate::error::{Error, Result};

/// Bit-level writer with an internal cursor.
#[derive(Default, Debug, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    buffer: u64,    // Pending bits, right aligned
    filled: u32,    // Number of pending bits in `buffer` (< 8 after every write)
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n_bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(n_bytes),
            ..Self::default()
        }
    }

    /// Appends the `width` low bits of `value`, most significant first.
    #[inline]
    pub fn write_bits(&mut self, value: u32, width: u32) {
        debug_assert!(width <= 32);
        if width == 0 {
            return;
        }
        let mask = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
        self.buffer = (self.buffer << width) | u64::from(value & mask);
        self.filled += width;
        while self.filled >= 8 {
            self.filled -= 8;
            self.bytes.push((self.buffer >> self.filled) as u8);
        }
        self.buffer &= (1u64 << self.filled) - 1;
    }

    #[inline]
    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits(bit as u32, 1);
    }

    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.write_bits(value, 32);
    }

    /// Writes a `usize` as a 32-bit word, rejecting values that do not fit.
    pub fn write_len(&mut self, value: usize) -> Result<()> {
        let value = u32::try_from(value)
            .map_err(|_| Error::out_of_range("32-bit field", value, u32::MAX as usize))?;
        self.write_u32(value);
        Ok(())
    }

    /// Copies raw bytes after aligning to a byte boundary.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.byte_align();
        self.bytes.extend_from_slice(bytes);
    }

    /// Elias gamma code of `value` (must be >= 1).
    pub fn write_gamma(&mut self, value: u32) {
        debug_assert!(value >= 1);
        let len = 32 - value.leading_zeros();
        self.write_bits(0, len - 1);
        self.write_bits(value, len);
    }

    /// Elias delta code of `value` (must be >= 1).
    pub fn write_delta(&mut self, value: u32) {
        debug_assert!(value >= 1);
        let len = 32 - value.leading_zeros();
        self.write_gamma(len);
        self.write_bits(value, len - 1);
    }

    /// Pads the pending byte with zeroes.
    pub fn byte_align(&mut self) {
        if self.filled > 0 {
            let pad = 8 - self.filled;
            self.write_bits(0, pad);
        }
    }

    /// Number of bits written so far.
    pub fn len_bits(&self) -> usize {
        self.bytes.len() * 8 + self.filled as usize
    }

    /// Flushes pending bits and returns the packed bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.byte_align();
        self.bytes
    }
}

/// Bit-level reader over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    position: usize,    // Cursor in bits
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        BitReader { bytes, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining_bits(&self) -> usize {
        self.bytes.len() * 8 - self.position
    }

    pub fn read_bits(&mut self, width: u32) -> Result<u32> {
        debug_assert!(width <= 32);
        if width as usize > self.remaining_bits() {
            return Err(Error::malformed(format!(
                "bit stream exhausted at bit {} (wanted {} more)",
                self.position, width
            )));
        }
        let mut value = 0u64;
        let mut needed = width;
        while needed > 0 {
            let byte = self.bytes[self.position / 8];
            let offset = (self.position % 8) as u32;
            let available = 8 - offset;
            let take = available.min(needed);
            let chunk = (byte >> (available - take)) & ((1u16 << take) - 1) as u8;
            value = (value << take) | u64::from(chunk);
            needed -= take;
            self.position += take as usize;
        }
        Ok(value as u32)
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_bits(32)
    }

    pub fn read_len(&mut self) -> Result<usize> {
        Ok(self.read_u32()? as usize)
    }

    /// Reads `count` 32-bit words.
    pub fn read_u32_vec(&mut self, count: usize) -> Result<Vec<u32>> {
        if count.saturating_mul(32) > self.remaining_bits() {
            return Err(Error::malformed(format!(
                "{} words declared but only {} bits remain",
                count,
                self.remaining_bits()
            )));
        }
        (0..count).map(|_| self.read_u32()).collect()
    }

    /// Borrows `len` raw bytes after aligning to a byte boundary.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.byte_align();
        let start = self.position / 8;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                Error::malformed(format!(
                    "{} raw bytes declared at offset {} but input has {}",
                    len,
                    start,
                    self.bytes.len()
                ))
            })?;
        self.position = end * 8;
        Ok(&self.bytes[start..end])
    }

    pub fn read_gamma(&mut self) -> Result<u32> {
        let mut zeroes = 0u32;
        while !self.read_bit()? {
            zeroes += 1;
            if zeroes > 31 {
                return Err(Error::malformed("gamma code longer than 32 bits"));
            }
        }
        let rest = self.read_bits(zeroes)?;
        Ok((1u32 << zeroes) | rest)
    }

    pub fn read_delta(&mut self) -> Result<u32> {
        let len = self.read_gamma()?;
        if len == 0 || len > 32 {
            return Err(Error::malformed(format!("delta length {} invalid", len)));
        }
        let rest = self.read_bits(len - 1)?;
        Ok((1u32 << (len - 1)) | rest)
    }

    pub fn byte_align(&mut self) {
        self.position = (self.position + 7) / 8 * 8;
    }

    pub fn is_exhausted(&self) -> bool {
        self.position / 8 >= self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_big_endian() {
        let mut writer = BitWriter::new();
        writer.write_u32(0x0102_0304);
        writer.write_u32(7);
        assert_eq!(writer.finish(), vec![1, 2, 3, 4, 0, 0, 0, 7]);
    }

    #[test]
    fn short_fields_pack_msb_first() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        writer.write_bits(0b01, 2);
        writer.write_bits(0b11111, 5);
        writer.write_bit(true);
        assert_eq!(writer.len_bits(), 9);
        assert_eq!(writer.finish(), vec![0b1011_1111, 0b1000_0000]);
    }

    #[test]
    fn reader_walks_mixed_widths() {
        let bytes = [0b1011_1111, 0b1000_0000, 0xde, 0xad, 0xbe, 0xef];
        let mut reader = BitReader::new(&bytes);
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.read_bits(2).unwrap(), 0b01);
        assert_eq!(reader.read_bits(5).unwrap(), 0b11111);
        assert!(reader.read_bit().unwrap());
        reader.byte_align();
        assert_eq!(reader.read_u32().unwrap(), 0xdead_beef);
        assert!(reader.is_exhausted());
        assert!(matches!(reader.read_bit(), Err(Error::MalformedIndex(_))));
    }

    #[test]
    fn raw_bytes_follow_alignment() {
        let mut writer = BitWriter::new();
        writer.write_bits(1, 3);
        writer.write_bytes(b"xy");
        let bytes = writer.finish();
        assert_eq!(bytes, vec![0b0010_0000, b'x', b'y']);

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bits(3).unwrap(), 1);
        assert_eq!(reader.read_bytes(2).unwrap(), b"xy");
        assert!(reader.read_bytes(1).is_err());
    }

    #[test]
    fn elias_codes_decode_back() {
        let values = [1u32, 2, 3, 4, 17, 1000, 65_537, u32::MAX];
        let mut writer = BitWriter::new();
        for &v in &values {
            writer.write_gamma(v);
            writer.write_delta(v);
        }
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        for &v in &values {
            assert_eq!(reader.read_gamma().unwrap(), v);
            assert_eq!(reader.read_delta().unwrap(), v);
        }
    }

    #[test]
    fn gamma_of_one_is_a_single_bit() {
        let mut writer = BitWriter::new();
        writer.write_gamma(1);
        assert_eq!(writer.len_bits(), 1);
        writer.write_delta(1);
        assert_eq!(writer.len_bits(), 2);
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut writer = BitWriter::new();
        assert!(writer.write_len(u32::MAX as usize).is_ok());
        #[cfg(target_pointer_width = "64")]
        assert!(writer.write_len(u32::MAX as usize + 1).is_err());
    }
}
