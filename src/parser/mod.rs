//! XML to [`Tree`] adapter over the `quick-xml` event reader.
//!
//! Text, entity references and attribute values are kept verbatim (no
//! unescaping), so writing the tree back yields the input bytes. Markup that
//! is not an element (comments, CDATA sections, processing instructions,
//! declarations, doctype) is folded into the surrounding text.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::tree::{Tree, TreeBuilder};

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Drop text made only of whitespace.
    pub trim_whitespace: bool,
}

impl From<&IndexConfig> for ParseOptions {
    fn from(config: &IndexConfig) -> Self {
        ParseOptions {
            trim_whitespace: config.trim_whitespace,
        }
    }
}

/// Parses a whole document into an arena tree.
pub fn parse_document(xml: &[u8], options: &ParseOptions) -> Result<Tree> {
    let mut reader = Reader::from_reader(xml);
    let mut builder = TreeBuilder::new();
    let mut pending: Vec<u8> = Vec::new();
    let mut elements = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::Parse(e.to_string()))?;
        match event {
            Event::Start(ref e) => {
                flush_text(&mut builder, &mut pending, options);
                open_with_attributes(&mut builder, e)?;
                elements += 1;
            }
            Event::Empty(ref e) => {
                flush_text(&mut builder, &mut pending, options);
                open_with_attributes(&mut builder, e)?;
                builder.close_element()?;
                elements += 1;
            }
            Event::End(ref e) => {
                flush_text(&mut builder, &mut pending, options);
                if builder.open_label() != Some(e.name().as_ref()) {
                    return Err(Error::Parse(format!(
                        "unexpected closing tag </{}>",
                        String::from_utf8_lossy(e.name().as_ref())
                    )));
                }
                builder.close_element()?;
            }
            Event::Text(ref e) => pending.extend_from_slice(e),
            Event::CData(ref e) => wrap(&mut pending, b"<![CDATA[", e, b"]]>"),
            Event::Comment(ref e) => wrap(&mut pending, b"<!--", e, b"-->"),
            Event::PI(ref e) => wrap(&mut pending, b"<?", e, b"?>"),
            Event::Decl(ref e) => wrap(&mut pending, b"<?", e, b"?>"),
            Event::DocType(ref e) => wrap(&mut pending, b"<!DOCTYPE ", e, b">"),
            Event::Eof => break,
        }
    }
    flush_text(&mut builder, &mut pending, options);

    let tree = builder.finish()?;
    debug!(
        nodes = tree.len(),
        elements,
        content_items = tree.content_count(),
        "parsed document"
    );
    Ok(tree)
}

fn open_with_attributes(builder: &mut TreeBuilder, e: &BytesStart) -> Result<()> {
    builder.open_element(e.name().as_ref())?;
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::Parse(err.to_string()))?;
        builder.attribute(attr.key.as_ref(), &attr.value)?;
    }
    Ok(())
}

fn wrap(pending: &mut Vec<u8>, open: &[u8], body: &[u8], close: &[u8]) {
    pending.extend_from_slice(open);
    pending.extend_from_slice(body);
    pending.extend_from_slice(close);
}

fn flush_text(builder: &mut TreeBuilder, pending: &mut Vec<u8>, options: &ParseOptions) {
    if pending.is_empty() {
        return;
    }
    let blank = pending.iter().all(u8::is_ascii_whitespace);
    if !(options.trim_whitespace && blank) {
        builder.text(pending);
    }
    pending.clear();
}
