use crate::bit_vector::BitVector;
use crate::error::{Error, Result};
use crate::tree::TAG_MARKER;

use super::XbwtTriple;

/// Marker closing every sibling group in the fused stream.
pub const GROUP_END: &[u8] = b"</";

/// Interleaves `alpha` and `last` into one token stream: every token is
/// followed by [`GROUP_END`] when its row closes a sibling group.
pub fn fuse_alpha_last(triple: &XbwtTriple) -> Vec<u8> {
    let mut out = Vec::with_capacity(triple.len() * 4);
    for row in 0..triple.len() {
        out.extend_from_slice(triple.token(row));
        if triple.last.get(row) == Some(true) {
            out.extend_from_slice(GROUP_END);
        }
    }
    out
}

/// Splits a fused stream back into `last` and the token of every row.
pub fn unfuse_alpha_last(fused: &[u8]) -> Result<(BitVector, Vec<&[u8]>)> {
    let mut last = BitVector::with_capacity(fused.len() / 3);
    let mut tokens: Vec<&[u8]> = Vec::with_capacity(fused.len() / 3);
    let mut pos = 0;
    while pos < fused.len() {
        if fused[pos..].starts_with(GROUP_END) {
            match last.len().checked_sub(1) {
                Some(row) if last.get(row) == Some(false) => last.set(row, true),
                _ => return Err(Error::malformed("group end without a preceding token")),
            }
            pos += GROUP_END.len();
            continue;
        }
        let end = fused[pos + 1..]
            .iter()
            .position(|&b| matches!(b, TAG_MARKER | b'@' | b'='))
            .map_or(fused.len(), |p| pos + 1 + p);
        tokens.push(&fused[pos..end]);
        last.push(false);
        pos = end;
    }
    Ok((last, tokens))
}
