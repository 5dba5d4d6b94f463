use std::marker::PhantomData;
use std::ops::Range;
use std::sync::Arc;

use tracing::trace;

use crate::compressor::BlockCodec;
use crate::error::{Error, Result};
use crate::fulltext::{FullTextIndex, ScanTextIndex};
use crate::xbwt::{split_payloads, PAYLOAD_SEPARATOR};

use super::AccessStats;

/// Content payloads grouped by upward path, one full-text index per group.
///
/// There is no sentinel block: the last block ends at the payload length.
pub struct PcdataBlockIndex<T = ScanTextIndex> {
    payload: Vec<u8>,           // Concatenated full-text images
    offsets: Vec<u32>,          // Byte offset of each block
    item_counts: Vec<u32>,      // Content items held by each block
    first_items: Vec<u32>,      // Prefix sums of `item_counts`
    text_len: usize,            // Length of the NUL-prefixed content stream
    codec: Arc<dyn BlockCodec>,
    _text_index: PhantomData<T>,
}

fn prefix_sums(item_counts: &[u32]) -> Vec<u32> {
    let mut sums = Vec::with_capacity(item_counts.len() + 1);
    let mut acc = 0u32;
    sums.push(acc);
    for &count in item_counts {
        acc += count;
        sums.push(acc);
    }
    sums
}

impl<T: FullTextIndex> PcdataBlockIndex<T> {
    /// Builds one block per run of `groups`, which partition the items of
    /// the NUL-prefixed `pcdata` stream.
    pub fn build(pcdata: &[u8], groups: &[u32], codec: Arc<dyn BlockCodec>) -> Result<Self> {
        let items = split_payloads(pcdata);
        let grouped: usize = groups.iter().map(|&g| g as usize).sum();
        if grouped != items.len() {
            return Err(Error::malformed(format!(
                "content groups cover {} items, stream holds {}",
                grouped,
                items.len()
            )));
        }

        let mut payload = Vec::new();
        let mut offsets = Vec::with_capacity(groups.len());
        let mut text = Vec::new();
        let mut next = 0usize;
        for (block, &size) in groups.iter().enumerate() {
            text.clear();
            for item in &items[next..next + size as usize] {
                text.push(PAYLOAD_SEPARATOR);
                text.extend_from_slice(item);
            }
            next += size as usize;
            offsets.push(payload.len() as u32);
            let index = T::build(&text, codec.as_ref()).map_err(|e| e.in_block(block))?;
            payload.extend_from_slice(&index.to_bytes());
        }

        Ok(PcdataBlockIndex {
            payload,
            offsets,
            first_items: prefix_sums(groups),
            item_counts: groups.to_vec(),
            text_len: pcdata.len(),
            codec,
            _text_index: PhantomData,
        })
    }

    pub fn from_parts(
        payload: Vec<u8>,
        offsets: Vec<u32>,
        item_counts: Vec<u32>,
        text_len: usize,
        codec: Arc<dyn BlockCodec>,
    ) -> Result<Self> {
        if offsets.len() != item_counts.len() {
            return Err(Error::malformed("pcdata offsets and item counts differ in length"));
        }
        if offsets.first().map_or(false, |&o| o != 0)
            || offsets.windows(2).any(|w| w[0] > w[1])
            || offsets.last().map_or(false, |&o| o as usize > payload.len())
        {
            return Err(Error::malformed("pcdata block offsets are inconsistent"));
        }
        Ok(PcdataBlockIndex {
            payload,
            offsets,
            first_items: prefix_sums(&item_counts),
            item_counts,
            text_len,
            codec,
            _text_index: PhantomData,
        })
    }

    pub fn block_count(&self) -> usize {
        self.offsets.len()
    }

    /// Number of content items.
    pub fn item_count(&self) -> usize {
        self.first_items.last().copied().unwrap_or(0) as usize
    }

    pub fn text_len(&self) -> usize {
        self.text_len
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn item_counts(&self) -> &[u32] {
        &self.item_counts
    }

    fn block_bytes(&self, block: usize) -> Result<&[u8]> {
        if block >= self.block_count() {
            return Err(Error::out_of_range("pcdata block", block, self.block_count()));
        }
        let from = self.offsets[block] as usize;
        let to = match self.offsets.get(block + 1) {
            Some(&next) => next as usize,
            None => self.payload.len(),
        };
        Ok(&self.payload[from..to])
    }

    /// Loads the full-text index of one block.
    pub fn load_block(&self, block: usize, stats: &mut AccessStats) -> Result<T> {
        let bytes = self.block_bytes(block)?;
        stats.touch_pcdata(bytes.len());
        trace!(block, bytes = bytes.len(), "loading pcdata block");
        T::from_bytes(bytes, self.codec.as_ref()).map_err(|e| e.in_block(block))
    }

    /// Block holding the content item with this ordinal.
    pub fn block_of_item(&self, ordinal: usize) -> Result<usize> {
        if ordinal >= self.item_count() {
            return Err(Error::out_of_range("content item", ordinal, self.item_count()));
        }
        Ok(self.first_items.partition_point(|&first| first as usize <= ordinal) - 1)
    }

    /// Blocks covering the content items `[first, end)`.
    pub fn blocks_for_items(&self, items: Range<usize>) -> Result<Range<usize>> {
        if items.is_empty() {
            return Ok(0..0);
        }
        let first = self.block_of_item(items.start)?;
        let last = self.block_of_item(items.end - 1)?;
        Ok(first..last + 1)
    }

    /// Payload of the content item with this ordinal.
    pub fn item(&self, ordinal: usize, stats: &mut AccessStats) -> Result<Vec<u8>> {
        let block = self.block_of_item(ordinal)?;
        let index = self.load_block(block, stats)?;
        let text = index
            .extract(0, index.len())
            .map_err(|e| e.in_block(block))?;
        let local = ordinal - self.first_items[block] as usize;
        split_payloads(&text)
            .get(local)
            .map(|item| item.to_vec())
            .ok_or_else(|| {
                Error::malformed(format!("pcdata block {} is missing item {}", block, local))
            })
    }

    pub fn extract(&self, block: usize, from: usize, to: usize, stats: &mut AccessStats) -> Result<Vec<u8>> {
        self.load_block(block, stats)?
            .extract(from, to)
            .map_err(|e| e.in_block(block))
    }

    pub fn count(&self, block: usize, pattern: &[u8], stats: &mut AccessStats) -> Result<usize> {
        self.load_block(block, stats)?
            .count(pattern)
            .map_err(|e| e.in_block(block))
    }

    pub fn display(
        &self,
        block: usize,
        pattern: &[u8],
        context: usize,
        stats: &mut AccessStats,
    ) -> Result<Vec<Vec<u8>>> {
        self.load_block(block, stats)?
            .display(pattern, context)
            .map_err(|e| e.in_block(block))
    }

    /// Decodes every block back into the NUL-prefixed content stream.
    pub fn decode_all(&self, stats: &mut AccessStats) -> Result<Vec<u8>> {
        let mut all = Vec::with_capacity(self.text_len);
        for block in 0..self.block_count() {
            let index = self.load_block(block, stats)?;
            all.extend(index.extract(0, index.len()).map_err(|e| e.in_block(block))?);
        }
        if all.len() != self.text_len {
            return Err(Error::malformed(format!(
                "pcdata blocks hold {} bytes, header declares {}",
                all.len(),
                self.text_len
            )));
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::CodecKind;

    const STREAM: &[u8] = b"\0Paolo\0Giovanni\0Paolo\0x\0Paolo and Paolo";

    fn index() -> PcdataBlockIndex {
        PcdataBlockIndex::build(STREAM, &[2, 1, 2], CodecKind::Zstd.build(None)).unwrap()
    }

    #[test]
    fn items_map_to_blocks() {
        let pc = index();
        assert_eq!(pc.block_count(), 3);
        assert_eq!(pc.item_count(), 5);
        assert_eq!(pc.block_of_item(0).unwrap(), 0);
        assert_eq!(pc.block_of_item(2).unwrap(), 1);
        assert_eq!(pc.block_of_item(4).unwrap(), 2);
        assert!(pc.block_of_item(5).is_err());
        assert_eq!(pc.blocks_for_items(1..4).unwrap(), 0..3);
        assert_eq!(pc.blocks_for_items(3..3).unwrap(), 0..0);
    }

    #[test]
    fn block_queries() {
        let pc = index();
        let mut stats = AccessStats::default();
        assert_eq!(pc.item(1, &mut stats).unwrap(), b"Giovanni".to_vec());
        assert_eq!(pc.item(3, &mut stats).unwrap(), b"x".to_vec());
        assert_eq!(pc.count(0, b"Paolo", &mut stats).unwrap(), 1);
        assert_eq!(pc.count(2, b"Paolo", &mut stats).unwrap(), 2);
        assert_eq!(pc.extract(1, 1, 6, &mut stats).unwrap(), b"Paolo".to_vec());
        assert_eq!(pc.display(0, b"Gio", 1, &mut stats).unwrap(), vec![b"\0Giov".to_vec()]);
        assert_eq!(stats.pcdata_blocks, 6);
        assert_eq!(pc.decode_all(&mut stats).unwrap(), STREAM.to_vec());
    }

    #[test]
    fn groups_must_cover_the_stream() {
        let err = PcdataBlockIndex::<ScanTextIndex>::build(STREAM, &[2, 2], CodecKind::Raw.build(None));
        assert!(matches!(err, Err(Error::MalformedIndex(_))));
    }

    #[test]
    fn extraction_failures_carry_the_block() {
        let pc = index();
        let mut stats = AccessStats::default();
        match pc.extract(2, 0, 500, &mut stats) {
            Err(Error::DelegateFailure { block, .. }) => assert_eq!(block, Some(2)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
