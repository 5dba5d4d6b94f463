use crate::error::{Error, Result};
use crate::navigation::RowRange;
use crate::subtree::{write_subtree, RowSource};

use super::XbwtTriple;

/// Fully decoded streams with the first child of every row precomputed.
struct DecodedRows<'t> {
    triple: &'t XbwtTriple,
    first_child: Vec<u32>,      // u32::MAX on content rows
    payloads: Vec<&'t [u8]>,
    ordinals: Vec<u32>,         // Content ordinal of each row
}

impl<'t> DecodedRows<'t> {
    fn new(triple: &'t XbwtTriple) -> Result<Self> {
        let f = triple.first_rows()?;
        let n = triple.len();
        let content = triple.alphabet.content_code();
        let root = triple.alphabet.root_code();

        // Rows sharing a label own consecutive groups, in row order.
        let mut cursor = f.clone();
        let mut first_child = vec![u32::MAX; n];
        let mut ordinals = vec![u32::MAX; n];
        let mut items = 0u32;
        for (row, &code) in triple.alpha.iter().enumerate() {
            if Some(code) == content {
                ordinals[row] = items;
                items += 1;
            } else if code == root {
                first_child[row] = f[root as usize];
            } else {
                let start = cursor[code as usize] as usize;
                let end = group_end(triple, start)?;
                first_child[row] = start as u32;
                cursor[code as usize] = end as u32 + 1;
            }
        }

        let payloads = triple.payloads();
        if payloads.len() != items as usize {
            return Err(Error::malformed(format!(
                "{} payloads for {} content rows",
                payloads.len(),
                items
            )));
        }
        Ok(DecodedRows {
            triple,
            first_child,
            payloads,
            ordinals,
        })
    }
}

fn group_end(triple: &XbwtTriple, start: usize) -> Result<usize> {
    match triple.last.get(start) {
        Some(true) => Ok(start),
        Some(false) => triple
            .last
            .next_one(start)
            .ok_or_else(|| Error::malformed(format!("group at row {} is never closed", start))),
        None => Err(Error::malformed(format!("group start {} past the last row", start))),
    }
}

impl<'t> RowSource for DecodedRows<'t> {
    fn row_code(&mut self, row: usize) -> Result<u32> {
        self.triple
            .alpha
            .get(row)
            .copied()
            .ok_or_else(|| Error::out_of_range("row", row, self.triple.len()))
    }

    fn row_children(&mut self, row: usize) -> Result<Option<RowRange>> {
        match self.first_child.get(row) {
            Some(&u32::MAX) => Ok(None),
            Some(&first) => {
                let first = first as usize;
                let last = group_end(self.triple, first)?;
                Ok(Some(RowRange { first, last }))
            }
            None => Err(Error::out_of_range("row", row, self.triple.len())),
        }
    }

    fn row_payload(&mut self, row: usize) -> Result<Vec<u8>> {
        let ordinal = self.ordinals[row];
        self.payloads
            .get(ordinal as usize)
            .map(|p| p.to_vec())
            .ok_or_else(|| Error::malformed(format!("row {} is not a content row", row)))
    }
}

impl XbwtTriple {
    /// Rebuilds the whole document from the three streams in one pass.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut rows = DecodedRows::new(self)?;
        let mut out = Vec::with_capacity(self.pcdata.len() + self.len() * 8);
        write_subtree(&mut rows, &self.alphabet, 0, &mut out)?;
        Ok(out)
    }
}
