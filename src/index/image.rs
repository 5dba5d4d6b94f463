use std::time::Instant;

use tracing::{debug, info};

use crate::bitrun::{BitReader, BitWriter};
use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::xbwt::Alphabet;

use super::{AccessStats, AlphaBlockIndex, LastBlockIndex, PcdataBlockIndex, XbwtIndex};

impl XbwtIndex {
    /// Serializes the index. Every integer is a big-endian 32-bit word; the
    /// raw block payloads and the alphabet follow the tables.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let alphabet = self.alphabet().to_bytes();
        let sigma = self.alphabet().len();
        let (last, alpha, pcdata) = (&self.last, &self.alpha, &self.pcdata);

        let tables = 10 + 2 * last.offsets().len() + alpha.offsets().len()
            + alpha.counts().len() + 2 * pcdata.block_count() + sigma;
        let raw = last.payload().len() + alpha.payload().len() + pcdata.payload().len() + alphabet.len();
        let mut writer = BitWriter::with_capacity(tables * 4 + raw);

        writer.write_len(pcdata.text_len())?;
        writer.write_len(self.nodes)?;
        writer.write_len(self.content_items)?;
        writer.write_len(alphabet.len())?;
        writer.write_len(sigma)?;
        writer.write_len(last.payload().len())?;
        writer.write_len(last.offsets().len())?;
        for &offset in last.offsets() {
            writer.write_u32(offset);
        }
        for &row in last.start_rows() {
            writer.write_u32(row);
        }

        writer.write_len(alpha.offsets().len())?;
        writer.write_len(alpha.payload().len())?;
        for &offset in alpha.offsets() {
            writer.write_u32(offset);
        }
        for &count in alpha.counts() {
            writer.write_u32(count);
        }

        writer.write_len(pcdata.payload().len())?;
        writer.write_len(pcdata.block_count())?;
        for &offset in pcdata.offsets() {
            writer.write_u32(offset);
        }
        for &items in pcdata.item_counts() {
            writer.write_u32(items);
        }

        for &first in &self.f[..sigma] {
            writer.write_u32(first);
        }

        writer.write_bytes(last.payload());
        writer.write_bytes(alpha.payload());
        writer.write_bytes(pcdata.payload());
        writer.write_bytes(&alphabet);
        Ok(writer.finish())
    }

    /// Loads an index image. The image does not record its codec: `config`
    /// must name the one it was built with.
    pub fn from_bytes(bytes: &[u8], config: &IndexConfig) -> Result<Self> {
        let start = Instant::now();
        let codec = config.build_codec();
        let mut reader = BitReader::new(bytes);

        let text_len = reader.read_len()?;
        let nodes = reader.read_len()?;
        let content_items = reader.read_len()?;
        let alphabet_len = reader.read_len()?;
        let sigma = reader.read_len()?;
        let last_len = reader.read_len()?;
        let last_blocks = reader.read_len()?;
        let last_offsets = reader.read_u32_vec(last_blocks)?;
        let start_rows = reader.read_u32_vec(last_blocks)?;

        let alpha_blocks = reader.read_len()?;
        let alpha_len = reader.read_len()?;
        let alpha_offsets = reader.read_u32_vec(alpha_blocks)?;
        let counts_len = alpha_blocks
            .checked_mul(sigma)
            .ok_or_else(|| Error::malformed("alpha count table size overflows"))?;
        let counts = reader.read_u32_vec(counts_len)?;

        let pcdata_len = reader.read_len()?;
        let pcdata_blocks = reader.read_len()?;
        let pcdata_offsets = reader.read_u32_vec(pcdata_blocks)?;
        let item_counts = reader.read_u32_vec(pcdata_blocks)?;

        let mut f = reader.read_u32_vec(sigma)?;

        let last_payload = reader.read_bytes(last_len)?.to_vec();
        let alpha_payload = reader.read_bytes(alpha_len)?.to_vec();
        let pcdata_payload = reader.read_bytes(pcdata_len)?.to_vec();
        let alphabet_bytes = reader.read_bytes(alphabet_len)?;
        if !reader.is_exhausted() {
            return Err(Error::malformed(format!(
                "{} trailing bytes after the alphabet",
                bytes.len() - reader.position() / 8
            )));
        }
        let alphabet = Alphabet::from_bytes(alphabet_bytes, sigma)?;

        let last = LastBlockIndex::from_parts(last_payload, last_offsets, start_rows, codec.clone())?;
        if last.len() != nodes {
            return Err(Error::malformed(format!(
                "last blocks cover {} rows, header declares {}",
                last.len(),
                nodes
            )));
        }
        let alpha = AlphaBlockIndex::from_parts(alpha_payload, alpha_offsets, counts, alphabet, nodes, codec.clone())?;
        let pcdata = PcdataBlockIndex::from_parts(pcdata_payload, pcdata_offsets, item_counts, text_len, codec)?;
        if pcdata.item_count() != content_items {
            return Err(Error::malformed(format!(
                "pcdata blocks hold {} items, header declares {}",
                pcdata.item_count(),
                content_items
            )));
        }
        if f.first().map_or(false, |&first| first != 1)
            || f.windows(2).any(|w| w[0] > w[1])
            || f.last().map_or(false, |&first| first as usize > nodes)
        {
            return Err(Error::malformed("F table is not a non-decreasing run of rows"));
        }

        let ones = last.count_ones();
        if ones < 2 {
            return Err(Error::malformed("last stream holds fewer than two groups"));
        }
        let mut scratch = AccessStats::default();
        let root_group = last.select1(ones - 1, &mut scratch)? + 1;
        f.push(root_group as u32);

        info!(
            nodes,
            labels = sigma,
            bytes = bytes.len(),
            elapsed = ?start.elapsed(),
            "loaded index"
        );
        debug!(
            last_blocks = last.block_count(),
            alpha_blocks = alpha.block_count(),
            pcdata_blocks = pcdata.block_count(),
            "index block layout"
        );

        Ok(XbwtIndex {
            last,
            alpha,
            pcdata,
            f,
            nodes,
            content_items,
        })
    }
}
