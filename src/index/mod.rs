//! The searchable compressed index.
//!
//! [`XbwtIndex`] owns the three blocked streams and the `F` table. It is
//! immutable once built or loaded; queries run through a
//! [`Navigator`](crate::navigation::Navigator) that carries its own
//! [`AccessStats`].

mod alpha;
mod image;
mod last;
mod pcdata;
mod stats;

pub use alpha::{split_tokens, AlphaBlockIndex};
pub use last::LastBlockIndex;
pub use pcdata::PcdataBlockIndex;
pub use stats::AccessStats;

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::navigation::Navigator;
use crate::parser::{parse_document, ParseOptions};
use crate::tree::Tree;
use crate::xbwt::{Alphabet, XbwtTriple};

pub struct XbwtIndex {
    last: LastBlockIndex,
    alpha: AlphaBlockIndex,
    pcdata: PcdataBlockIndex,
    f: Vec<u32>,            // First row of each code's child group; f[σ] is the root's
    nodes: usize,
    content_items: usize,
}

/// Sizes and block counts of a built index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub nodes: usize,
    pub content_items: usize,
    pub text_len: usize,
    pub alphabet_len: usize,
    pub last_blocks: usize,
    pub last_bytes: usize,
    pub block_population: usize,
    pub alpha_blocks: usize,
    pub alpha_bytes: usize,
    pub block_symbol_count: usize,
    pub pcdata_blocks: usize,
    pub pcdata_bytes: usize,
}

impl XbwtIndex {
    /// Parses an XML document and indexes it.
    pub fn from_xml(xml: &[u8], config: &IndexConfig) -> Result<Self> {
        let start = Instant::now();
        let tree = parse_document(xml, &ParseOptions::from(config))?;
        debug!(bytes = xml.len(), nodes = tree.len(), elapsed = ?start.elapsed(), "parsed document");
        Self::build(&tree, config)
    }

    pub fn build(tree: &Tree, config: &IndexConfig) -> Result<Self> {
        config.validate()?;
        let start = Instant::now();
        let triple = XbwtTriple::from_tree(tree)?;
        let index = Self::from_triple(&triple, config)?;
        info!(
            nodes = index.nodes,
            labels = index.alphabet().len(),
            content_items = index.content_items,
            codec = config.codec.as_str(),
            elapsed = ?start.elapsed(),
            "built index"
        );
        Ok(index)
    }

    /// Blocks and compresses the streams of an already linearized tree.
    pub fn from_triple(triple: &XbwtTriple, config: &IndexConfig) -> Result<Self> {
        config.validate()?;
        let codec = config.build_codec();
        let f = triple.first_rows()?;

        let start = Instant::now();
        let last = LastBlockIndex::build(&triple.last, config.block_population as usize, codec.clone())?;
        debug!(blocks = last.block_count(), bytes = last.payload().len(), elapsed = ?start.elapsed(), "built last blocks");

        let start = Instant::now();
        let alpha = AlphaBlockIndex::build(
            &triple.alpha,
            triple.alphabet.clone(),
            config.block_symbol_count as usize,
            codec.clone(),
        )?;
        debug!(blocks = alpha.block_count(), bytes = alpha.payload().len(), elapsed = ?start.elapsed(), "built alpha blocks");

        let start = Instant::now();
        let pcdata = PcdataBlockIndex::build(&triple.pcdata, &triple.content_groups, codec)?;
        debug!(blocks = pcdata.block_count(), bytes = pcdata.payload().len(), elapsed = ?start.elapsed(), "built pcdata blocks");

        Ok(XbwtIndex {
            last,
            alpha,
            pcdata,
            f,
            nodes: triple.len(),
            content_items: triple.content_count(),
        })
    }

    pub fn navigator(&self) -> Navigator<'_> {
        Navigator::new(self)
    }

    pub fn alphabet(&self) -> &Alphabet {
        self.alpha.alphabet()
    }

    /// Number of rows, the synthetic root included.
    pub fn len(&self) -> usize {
        self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes == 0
    }

    pub fn content_count(&self) -> usize {
        self.content_items
    }

    /// The `F` table, `alphabet().len() + 1` entries.
    pub fn first_rows(&self) -> &[u32] {
        &self.f
    }

    pub fn last(&self) -> &LastBlockIndex {
        &self.last
    }

    pub fn alpha(&self) -> &AlphaBlockIndex {
        &self.alpha
    }

    pub fn pcdata(&self) -> &PcdataBlockIndex {
        &self.pcdata
    }

    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            nodes: self.nodes,
            content_items: self.content_items,
            text_len: self.pcdata.text_len(),
            alphabet_len: self.alphabet().len(),
            last_blocks: self.last.block_count(),
            last_bytes: self.last.payload().len(),
            block_population: self.last.population(),
            alpha_blocks: self.alpha.block_count(),
            alpha_bytes: self.alpha.payload().len(),
            block_symbol_count: self.alpha.block_len(),
            pcdata_blocks: self.pcdata.block_count(),
            pcdata_bytes: self.pcdata.payload().len(),
        }
    }

    /// Decompresses every block back into the three streams.
    pub fn decode_streams(&self) -> Result<XbwtTriple> {
        let mut stats = AccessStats::default();
        let triple = XbwtTriple {
            last: self.last.decode_all(&mut stats)?,
            alpha: self.alpha.decode_all(&mut stats)?,
            pcdata: self.pcdata.decode_all(&mut stats)?,
            alphabet: self.alphabet().clone(),
            content_groups: self.pcdata.item_counts().to_vec(),
        };
        if triple.last.len() != self.nodes || triple.alpha.len() != self.nodes {
            return Err(Error::malformed(format!(
                "decoded {} last bits and {} alpha codes for {} nodes",
                triple.last.len(),
                triple.alpha.len(),
                self.nodes
            )));
        }
        debug!(bytes = stats.total_bytes(), blocks = stats.total_blocks(), "decoded all streams");
        Ok(triple)
    }

    /// Rebuilds the whole indexed document.
    pub fn extract_document(&self) -> Result<Vec<u8>> {
        let start = Instant::now();
        let xml = self.decode_streams()?.to_xml()?;
        info!(bytes = xml.len(), elapsed = ?start.elapsed(), "extracted document");
        Ok(xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::CodecKind;

    fn small_blocks(codec: CodecKind) -> IndexConfig {
        IndexConfig {
            block_population: 2,
            block_symbol_count: 3,
            codec,
            ..IndexConfig::default()
        }
    }

    const DOC: &str = "<lib><book id=\"1\"><title>XML</title><author>Paolo</author></book>\
                       <book id=\"2\"><title>BWT</title><author>Giovanni</author><author>Paolo</author></book></lib>";

    #[test]
    fn three_node_document_tables() {
        let index = XbwtIndex::from_xml(b"<a><b>x</b></a>", &IndexConfig::default()).unwrap();
        assert_eq!(index.len(), 4);
        assert_eq!(index.alphabet().len(), 3);
        assert_eq!(index.first_rows(), &[1, 2, 3, 3]);
        assert_eq!(index.content_count(), 1);
    }

    #[test]
    fn extraction_reproduces_the_document() {
        for codec in CodecKind::ALL {
            let index = XbwtIndex::from_xml(DOC.as_bytes(), &small_blocks(codec)).unwrap();
            assert_eq!(index.extract_document().unwrap(), DOC.as_bytes().to_vec());
        }
    }

    #[test]
    fn summary_reports_block_layout() {
        let index = XbwtIndex::from_xml(DOC.as_bytes(), &small_blocks(CodecKind::Raw)).unwrap();
        let summary = index.summary();
        assert_eq!(summary.nodes, index.len());
        assert_eq!(summary.block_population, 2);
        assert_eq!(summary.block_symbol_count, 3);
        assert_eq!(summary.alpha_blocks, (index.len() + 2) / 3);
        assert!(summary.last_blocks > 1);
        assert_eq!(summary.content_items, 7);
    }

    #[test]
    fn zero_block_sizes_are_rejected() {
        let config = IndexConfig {
            block_population: 0,
            ..IndexConfig::default()
        };
        assert!(matches!(
            XbwtIndex::from_xml(DOC.as_bytes(), &config),
            Err(Error::Config(_))
        ));
    }
}
