//! Subtree reconstruction.
//!
//! The writer walks rows with an explicit stack of [`Step`]s, so nesting
//! depth is bounded only by memory. It runs over any [`RowSource`]: the
//! compressed index through a `Navigator`, or fully decoded streams when a
//! whole document is extracted.

use crate::error::{Error, Result};
use crate::navigation::{Navigator, RowRange};
use crate::tree::{write_quoted, NodeKind, EMPTY_FILLER};
use crate::xbwt::Alphabet;

/// Row-level access needed to write XML text.
pub trait RowSource {
    /// Label code of a row.
    fn row_code(&mut self, row: usize) -> Result<u32>;

    /// Children interval of a row, `None` for content rows.
    fn row_children(&mut self, row: usize) -> Result<Option<RowRange>>;

    /// Raw payload of a content row.
    fn row_payload(&mut self, row: usize) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Enter(usize),
    Exit(usize),
}

/// Text of the subtree anchored at the nearest tag above a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtree {
    pub anchor: usize,
    pub text: Vec<u8>,
}

/// Writes the subtree rooted at the tag row `row`.
///
/// The root row writes its children only. Attribute rows are written as
/// `name="value"` inside their element's start tag.
pub fn write_subtree<S: RowSource>(
    source: &mut S,
    alphabet: &Alphabet,
    row: usize,
    out: &mut Vec<u8>,
) -> Result<()> {
    let root_code = alphabet.root_code();
    let mut stack = vec![Step::Enter(row)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(r) => {
                let code = source.row_code(r)?;
                let token = alphabet.token(code);
                match NodeKind::of_token(token) {
                    Some(NodeKind::Content) => {
                        let payload = source.row_payload(r)?;
                        if payload != [EMPTY_FILLER] {
                            out.extend_from_slice(&payload);
                        }
                    }
                    Some(NodeKind::Attribute) => write_attribute(source, token, r, out)?,
                    Some(NodeKind::Tag) => {
                        let range = source
                            .row_children(r)?
                            .ok_or_else(|| Error::malformed(format!("tag row {} has no children", r)))?;
                        let mut next = range.first;
                        if code != root_code {
                            out.extend_from_slice(token);
                            while next <= range.last {
                                let child_token = alphabet.token(source.row_code(next)?);
                                if NodeKind::of_token(child_token) != Some(NodeKind::Attribute) {
                                    break;
                                }
                                write_attribute(source, child_token, next, out)?;
                                next += 1;
                            }
                            out.push(b'>');
                            stack.push(Step::Exit(r));
                        }
                        for child in (next..=range.last).rev() {
                            stack.push(Step::Enter(child));
                        }
                    }
                    None => {
                        return Err(Error::malformed(format!("row {} has an unknown token", r)));
                    }
                }
            }
            Step::Exit(r) => {
                let token = alphabet.token(source.row_code(r)?);
                out.extend_from_slice(b"</");
                out.extend_from_slice(&token[1..]);
                out.push(b'>');
            }
        }
    }
    Ok(())
}

fn write_attribute<S: RowSource>(
    source: &mut S,
    token: &[u8],
    row: usize,
    out: &mut Vec<u8>,
) -> Result<()> {
    out.push(b' ');
    out.extend_from_slice(&token[1..]);
    let mut value = Vec::new();
    if let Some(range) = source.row_children(row)? {
        for child in range.first..=range.last {
            value.extend_from_slice(&source.row_payload(child)?);
        }
    }
    write_quoted(&value, out);
    Ok(())
}

impl<'a> Navigator<'a> {
    /// Nearest tag row at or above `row`: attributes climb to their element,
    /// content climbs to its parent and, under an attribute, once more.
    pub fn anchor_row(&mut self, row: usize) -> Result<usize> {
        match self.kind(row)? {
            NodeKind::Tag => Ok(row),
            NodeKind::Attribute => self.parent(row),
            NodeKind::Content => {
                let parent = self.parent(row)?;
                match self.kind(parent)? {
                    NodeKind::Attribute => self.parent(parent),
                    _ => Ok(parent),
                }
            }
        }
    }

    /// Reconstructs the XML text of the element enclosing `row`.
    pub fn subtree_text(&mut self, row: usize) -> Result<Subtree> {
        let anchor = self.anchor_row(row)?;
        let mut text = Vec::new();
        let index = self.index();
        write_subtree(self, index.alphabet(), anchor, &mut text)?;
        Ok(Subtree { anchor, text })
    }
}

impl<'a> RowSource for Navigator<'a> {
    fn row_code(&mut self, row: usize) -> Result<u32> {
        self.code_at(row)
    }

    fn row_children(&mut self, row: usize) -> Result<Option<RowRange>> {
        self.children(row)
    }

    fn row_payload(&mut self, row: usize) -> Result<Vec<u8>> {
        self.raw_payload(row)
    }
}
