#![allow(dead_code)]

use std::fmt::Write;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use xbwt_index::{CodecKind, IndexConfig};

const LABELS: [&str; 6] = ["a", "b", "item", "name", "title", "x"];
const ATTRIBUTES: [&str; 3] = ["id", "k", "lang"];
const WORDS: [&str; 7] = ["Paolo", "Giovanni", "xml tree", "  ", "data", "Paolo Ferragina", "z"];

pub const DBLP: &str = "<dblp><article key=\"a1\"><author>Paolo Ferragina</author>\
<author>Giovanni Manzini</author><title>Compressing and searching XML data</title></article>\
<article key=\"a2\"><author>Paolo Ferragina</author><author>S. Muthukrishnan</author>\
<title>Structuring labeled trees</title><year>2005</year></article>\
<inproceedings key=\"c1\"><author>Giovanni Manzini</author><title>An analysis of the BWT</title></inproceedings></dblp>";

/// Small blocks so that every stream spans several of them.
pub fn small_blocks(codec: CodecKind) -> IndexConfig {
    IndexConfig {
        block_population: 3,
        block_symbol_count: 7,
        codec,
        ..IndexConfig::default()
    }
}

/// A random well-formed document of at most `max_elements` elements with
/// no self-closing tags, so it survives a round trip byte for byte.
pub fn random_document(seed: u64, max_elements: usize) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = String::new();
    let mut budget = max_elements.max(1);
    write_element(&mut rng, &mut out, 0, &mut budget);
    out
}

fn write_element(rng: &mut StdRng, out: &mut String, depth: usize, budget: &mut usize) {
    *budget -= 1;
    let label = LABELS[rng.gen_range(0..LABELS.len())];
    out.push('<');
    out.push_str(label);
    for attribute in ATTRIBUTES {
        if rng.gen_bool(0.25) {
            let value = WORDS[rng.gen_range(0..WORDS.len())];
            let _ = write!(out, " {}=\"{}\"", attribute, value);
        }
    }
    out.push('>');

    let slots = if depth < 6 { rng.gen_range(0..4) } else { 1 };
    let mut after_text = false;
    for _ in 0..slots {
        if *budget > 0 && rng.gen_bool(0.6) {
            write_element(rng, out, depth + 1, budget);
            after_text = false;
        } else if !after_text {
            out.push_str(WORDS[rng.gen_range(0..WORDS.len())]);
            after_text = true;
        }
    }

    out.push_str("</");
    out.push_str(label);
    out.push('>');
}
