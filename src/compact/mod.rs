//! Compact, non-searchable container.
//!
//! Layout: seven 32-bit header words `{layout, nodes, cardinality,
//! alphabet bytes, last bytes, alpha bytes, pcdata bytes}`, the
//! NUL-terminated alphabet, then the three sections. With
//! [`Layout::Separate`] `last` holds Elias-delta gaps between set bits,
//! `alpha` the fixed-width codes and `pcdata` the content stream, the latter
//! two compressed whole. [`Layout::Fused`] leaves `last` empty and stores the
//! compressed fused token stream in `alpha`.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bit_vector::BitVector;
use crate::bitrun::{BitReader, BitWriter};
use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::parser::{parse_document, ParseOptions};
use crate::xbwt::{fuse_alpha_last, unfuse_alpha_last, Alphabet, XbwtTriple};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Separate,
    Fused,
}

impl Layout {
    pub fn as_str(self) -> &'static str {
        match self {
            Layout::Separate => "separate",
            Layout::Fused => "fused",
        }
    }

    fn to_word(self) -> u32 {
        match self {
            Layout::Separate => 0,
            Layout::Fused => 1,
        }
    }

    fn from_word(word: u32) -> Result<Self> {
        match word {
            0 => Ok(Layout::Separate),
            1 => Ok(Layout::Fused),
            other => Err(Error::malformed(format!("unknown container layout {}", other))),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "separate" => Ok(Layout::Separate),
            "fused" => Ok(Layout::Fused),
            other => Err(Error::Config(format!("unknown layout '{}'", other))),
        }
    }
}

/// Bits needed for every code up to and including the root code.
fn code_width(alphabet: &Alphabet) -> u32 {
    (32 - alphabet.root_code().leading_zeros()).max(1)
}

fn encode_gaps(last: &BitVector) -> Result<Vec<u8>> {
    let mut writer = BitWriter::with_capacity(last.len() / 4 + 1);
    let mut previous: Option<usize> = None;
    for pos in last.ones(0) {
        let gap = match previous {
            Some(p) => pos - p,
            None => pos + 1,
        };
        let gap = u32::try_from(gap).map_err(|_| Error::out_of_range("last gap", gap, u32::MAX as usize))?;
        writer.write_delta(gap);
        previous = Some(pos);
    }
    Ok(writer.finish())
}

fn decode_gaps(bytes: &[u8], nodes: usize) -> Result<BitVector> {
    let mut last = BitVector::with_capacity(nodes);
    let mut reader = BitReader::new(bytes);
    while last.len() < nodes {
        let gap = reader.read_delta()? as usize;
        if last.len() + gap > nodes {
            return Err(Error::malformed(format!(
                "last gap {} runs past {} rows",
                gap, nodes
            )));
        }
        for _ in 1..gap {
            last.push(false);
        }
        last.push(true);
    }
    Ok(last)
}

/// Parses and transforms a document, then packs it into a container.
pub fn compress_document(xml: &[u8], config: &IndexConfig, layout: Layout) -> Result<Vec<u8>> {
    let tree = parse_document(xml, &ParseOptions::from(config))?;
    let triple = XbwtTriple::from_tree(&tree)?;
    compress_triple(&triple, config, layout)
}

pub fn compress_triple(triple: &XbwtTriple, config: &IndexConfig, layout: Layout) -> Result<Vec<u8>> {
    let start = Instant::now();
    let codec = config.build_codec();
    let alphabet = triple.alphabet.to_bytes();

    let (last, alpha) = match layout {
        Layout::Separate => {
            let width = code_width(&triple.alphabet);
            let mut codes = BitWriter::with_capacity(triple.len() * width as usize / 8 + 1);
            for &code in &triple.alpha {
                codes.write_bits(code, width);
            }
            (encode_gaps(&triple.last)?, codec.compress(&codes.finish())?)
        }
        Layout::Fused => (Vec::new(), codec.compress(&fuse_alpha_last(triple))?),
    };
    let pcdata = codec.compress(&triple.pcdata)?;

    let mut writer = BitWriter::with_capacity(28 + alphabet.len() + last.len() + alpha.len() + pcdata.len());
    writer.write_u32(layout.to_word());
    writer.write_len(triple.len())?;
    writer.write_len(triple.alphabet.len())?;
    writer.write_len(alphabet.len())?;
    writer.write_len(last.len())?;
    writer.write_len(alpha.len())?;
    writer.write_len(pcdata.len())?;
    writer.write_bytes(&alphabet);
    writer.write_bytes(&last);
    writer.write_bytes(&alpha);
    writer.write_bytes(&pcdata);
    let packed = writer.finish();

    info!(
        layout = layout.as_str(),
        codec = codec.name(),
        nodes = triple.len(),
        bytes = packed.len(),
        elapsed = ?start.elapsed(),
        "compressed document"
    );
    Ok(packed)
}

/// Unpacks a container into its three streams.
pub fn decompress_triple(bytes: &[u8], config: &IndexConfig) -> Result<XbwtTriple> {
    let codec = config.build_codec();
    let mut reader = BitReader::new(bytes);
    let layout = Layout::from_word(reader.read_u32()?)?;
    let nodes = reader.read_len()?;
    let cardinality = reader.read_len()?;
    let alphabet_len = reader.read_len()?;
    let last_len = reader.read_len()?;
    let alpha_len = reader.read_len()?;
    let pcdata_len = reader.read_len()?;
    let alphabet = Alphabet::from_bytes(reader.read_bytes(alphabet_len)?, cardinality)?;
    let last_bytes = reader.read_bytes(last_len)?;
    let alpha_bytes = reader.read_bytes(alpha_len)?;
    let pcdata_bytes = reader.read_bytes(pcdata_len)?;
    if !reader.is_exhausted() {
        return Err(Error::malformed("trailing bytes after the pcdata section"));
    }

    let (last, alpha) = match layout {
        Layout::Separate => {
            let last = decode_gaps(last_bytes, nodes)?;
            let packed = codec.decompress(alpha_bytes)?;
            let width = code_width(&alphabet);
            let mut codes = BitReader::new(&packed);
            let mut alpha = Vec::with_capacity(nodes);
            for _ in 0..nodes {
                let code = codes.read_bits(width)?;
                if code > alphabet.root_code() {
                    return Err(Error::malformed(format!("alpha code {} outside the alphabet", code)));
                }
                alpha.push(code);
            }
            (last, alpha)
        }
        Layout::Fused => {
            let fused = codec.decompress(alpha_bytes)?;
            let (last, tokens) = unfuse_alpha_last(&fused)?;
            let alpha = tokens
                .iter()
                .map(|token| alphabet.code(token).ok_or_else(|| Error::symbol_not_found(token)))
                .collect::<Result<Vec<u32>>>()?;
            (last, alpha)
        }
    };
    if last.len() != nodes || alpha.len() != nodes {
        return Err(Error::malformed(format!(
            "container declares {} nodes, streams hold {} and {}",
            nodes,
            last.len(),
            alpha.len()
        )));
    }
    let pcdata = codec.decompress(pcdata_bytes)?;
    debug!(layout = layout.as_str(), nodes, "unpacked container");

    Ok(XbwtTriple {
        last,
        alpha,
        pcdata,
        alphabet,
        content_groups: Vec::new(), // Not needed to rebuild the text
    })
}

/// Rebuilds the document held by a container.
pub fn decompress_document(bytes: &[u8], config: &IndexConfig) -> Result<Vec<u8>> {
    let start = Instant::now();
    let xml = decompress_triple(bytes, config)?.to_xml()?;
    info!(bytes = xml.len(), elapsed = ?start.elapsed(), "decompressed document");
    Ok(xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::CodecKind;

    const DOC: &[u8] = b"<?xml version=\"1.0\"?>\n<site><people><person id=\"p1\"><name>Ann</name></person>\
        <person id=\"p2\"><name>Bob</name><note/></person></people><!-- end --></site>\n";

    #[test]
    fn gaps_roundtrip() {
        let last: BitVector = "1101000100001".chars().map(|c| c == '1').collect();
        let packed = encode_gaps(&last).unwrap();
        assert_eq!(decode_gaps(&packed, last.len()).unwrap(), last);
        assert!(decode_gaps(&packed, last.len() - 2).is_err());
    }

    #[test]
    fn both_layouts_restore_the_document() {
        let expected = String::from_utf8_lossy(DOC).replace("<note/>", "<note></note>");
        for codec in [CodecKind::Zstd, CodecKind::Deflate, CodecKind::Raw] {
            let config = IndexConfig {
                codec,
                ..IndexConfig::default()
            };
            for layout in [Layout::Separate, Layout::Fused] {
                let packed = compress_document(DOC, &config, layout).unwrap();
                let xml = decompress_document(&packed, &config).unwrap();
                assert_eq!(String::from_utf8(xml).unwrap(), expected, "{} {}", codec, layout);
            }
        }
    }

    #[test]
    fn header_records_layout_and_counts() {
        let config = IndexConfig::default();
        let packed = compress_document(b"<a><b>x</b></a>", &config, Layout::Fused).unwrap();
        assert_eq!(&packed[..12], &[0, 0, 0, 1, 0, 0, 0, 4, 0, 0, 0, 3]);
        // no last section in the fused layout
        assert_eq!(&packed[16..20], &[0, 0, 0, 0]);
    }

    #[test]
    fn damaged_containers_are_rejected() {
        let config = IndexConfig::default();
        let packed = compress_document(DOC, &config, Layout::Separate).unwrap();
        assert!(decompress_document(&packed[..packed.len() - 1], &config).is_err());
        let mut bad_layout = packed.clone();
        bad_layout[3] = 7;
        assert!(matches!(
            decompress_document(&bad_layout, &config),
            Err(Error::MalformedIndex(_))
        ));
        assert!("zigzag".parse::<Layout>().is_err());
        assert_eq!("fused".parse::<Layout>().unwrap(), Layout::Fused);
    }
}
