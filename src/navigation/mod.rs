//! Tree navigation over the compressed streams.
//!
//! Every primitive decompresses the blocks it needs and records them in the
//! session's [`AccessStats`]. Parent and children follow the `F` table:
//! children of the rows labeled `c` occupy consecutive sibling groups
//! starting at `F[c]`, in the same order as those rows.

use std::mem;

use crate::error::{Error, Result};
use crate::index::{AccessStats, XbwtIndex};
use crate::tree::{NodeKind, EMPTY_FILLER};

/// Inclusive interval of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub first: usize,
    pub last: usize,
}

impl RowRange {
    pub fn len(&self) -> usize {
        self.last + 1 - self.first
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }

    pub fn contains(&self, row: usize) -> bool {
        self.first <= row && row <= self.last
    }
}

/// A query session over a shared index.
pub struct Navigator<'a> {
    index: &'a XbwtIndex,
    stats: AccessStats,
}

impl<'a> Navigator<'a> {
    pub fn new(index: &'a XbwtIndex) -> Self {
        Navigator {
            index,
            stats: AccessStats::default(),
        }
    }

    pub fn index(&self) -> &'a XbwtIndex {
        self.index
    }

    pub fn stats(&self) -> AccessStats {
        self.stats
    }

    /// Returns the statistics gathered so far and starts afresh.
    pub fn reset_stats(&mut self) -> AccessStats {
        mem::take(&mut self.stats)
    }

    pub(crate) fn stats_mut(&mut self) -> &mut AccessStats {
        &mut self.stats
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.index.len() {
            return Err(Error::out_of_range("row", row, self.index.len()));
        }
        Ok(())
    }

    /// Number of last children in rows `0..=pos`.
    pub fn rank1(&mut self, pos: usize) -> Result<usize> {
        self.index.last().rank1(pos, &mut self.stats)
    }

    /// Number of last children in rows `0..row`.
    pub fn rank1_before(&mut self, row: usize) -> Result<usize> {
        self.index.last().rank1_before(row, &mut self.stats)
    }

    pub fn select1(&mut self, rank: usize) -> Result<usize> {
        self.index.last().select1(rank, &mut self.stats)
    }

    /// Rows labeled `label` among rows `0..=pos`.
    pub fn rank_symbol(&mut self, label: &[u8], pos: usize) -> Result<usize> {
        let code = self.index.alphabet().require(label)?;
        self.index.alpha().rank(code, pos, &mut self.stats)
    }

    /// Row of the `rank`-th occurrence of `label`, 1-indexed.
    pub fn select_symbol(&mut self, label: &[u8], rank: usize) -> Result<usize> {
        let code = self.index.alphabet().require(label)?;
        self.index.alpha().select(code, rank, &mut self.stats)
    }

    pub fn code_at(&mut self, row: usize) -> Result<u32> {
        self.index.alpha().code_at(row, &mut self.stats)
    }

    /// Label token of a row; the root reads as `<`.
    pub fn label(&mut self, row: usize) -> Result<&'a [u8]> {
        let index = self.index;
        let code = self.code_at(row)?;
        Ok(index.alphabet().token(code))
    }

    pub fn kind(&mut self, row: usize) -> Result<NodeKind> {
        let token = self.label(row)?;
        NodeKind::of_token(token)
            .ok_or_else(|| Error::malformed(format!("row {} has an unknown token", row)))
    }

    pub fn parent(&mut self, row: usize) -> Result<usize> {
        self.check_row(row)?;
        if row == 0 {
            return Err(Error::out_of_range("parent of row", row, 0));
        }
        let index = self.index;
        let f = index.first_rows();
        let sigma = f.len() - 1;
        if row >= f[sigma] as usize {
            return Ok(0);
        }
        let code = f.partition_point(|&first| first as usize <= row) - 1;
        let group = self.rank1_before(row)? - self.rank1_before(f[code] as usize)? + 1;
        index.alpha().select(code as u32, group, &mut self.stats)
    }

    /// Children interval of a row, `None` for content rows.
    pub fn children(&mut self, row: usize) -> Result<Option<RowRange>> {
        let index = self.index;
        let code = self.code_at(row)?;
        let alphabet = index.alphabet();
        let f = index.first_rows();
        if code == alphabet.root_code() {
            return Ok(Some(RowRange {
                first: f[code as usize] as usize,
                last: index.len() - 1,
            }));
        }
        if Some(code) == alphabet.content_code() {
            return Ok(None);
        }
        let groups_before = self.rank1_before(f[code as usize] as usize)?;
        let k = index.alpha().rank(code, row, &mut self.stats)?;
        let first = self.select1(groups_before + k - 1)? + 1;
        let last = self.select1(groups_before + k)?;
        Ok(Some(RowRange { first, last }))
    }

    /// The `i`-th child (1-indexed) of `row` labeled `label`.
    pub fn ith_child_with_label(&mut self, row: usize, label: &[u8], i: usize) -> Result<Option<usize>> {
        if i == 0 {
            return Ok(None);
        }
        let index = self.index;
        let Ok(code) = index.alphabet().require(label) else {
            return Ok(None);
        };
        let Some(range) = self.children(row)? else {
            return Ok(None);
        };
        let alpha = index.alpha();
        let before = alpha.rank(code, range.first - 1, &mut self.stats)?;
        let through = alpha.rank(code, range.last, &mut self.stats)?;
        if through - before < i {
            return Ok(None);
        }
        alpha.select(code, before + i, &mut self.stats).map(Some)
    }

    /// Ordinal of a content row among all content rows.
    pub fn content_ordinal(&mut self, row: usize) -> Result<Option<usize>> {
        let code = self.code_at(row)?;
        match self.index.alphabet().content_code() {
            Some(content) if content == code => {
                Ok(Some(self.index.alpha().rank(content, row, &mut self.stats)? - 1))
            }
            _ => Ok(None),
        }
    }

    /// Stored payload of a content row, filler included.
    pub fn raw_payload(&mut self, row: usize) -> Result<Vec<u8>> {
        let ordinal = self
            .content_ordinal(row)?
            .ok_or_else(|| Error::malformed(format!("row {} is not a content row", row)))?;
        self.index.pcdata().item(ordinal, &mut self.stats)
    }

    /// Text of a content row, `None` for any other row. Elements written
    /// empty read back as empty text.
    pub fn text_content(&mut self, row: usize) -> Result<Option<Vec<u8>>> {
        if self.content_ordinal(row)?.is_none() {
            return Ok(None);
        }
        let payload = self.raw_payload(row)?;
        if payload == [EMPTY_FILLER] {
            return Ok(Some(Vec::new()));
        }
        Ok(Some(payload))
    }
}
