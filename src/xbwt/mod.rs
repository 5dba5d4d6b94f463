//! The XML Burrows-Wheeler transform.
//!
//! Nodes are sorted by upward path (the label codes of their ancestors,
//! nearest first) with pre-order as tie-break. The sorted sequence yields
//! three streams: `last` marks the last child of every sibling group, `alpha`
//! holds the label code of every row and `pcdata` the content payloads in row
//! order, each prefixed by a NUL byte.

mod alphabet;
mod fuse;
mod unbuild;

pub use alphabet::Alphabet;
pub use fuse::{fuse_alpha_last, unfuse_alpha_last, GROUP_END};

use std::time::Instant;

use tracing::{debug, trace};

use crate::bit_vector::BitVector;
use crate::error::{Error, Result};
use crate::tree::{NodeId, NodeKind, Tree};

/// Separator written before every payload of the `pcdata` stream.
pub const PAYLOAD_SEPARATOR: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XbwtTriple {
    pub last: BitVector,            // One bit per row, set on the last child of a group
    pub alpha: Vec<u32>,            // Label code of each row, root row holds `alphabet.root_code()`
    pub pcdata: Vec<u8>,            // NUL-prefixed payloads of the content rows, in row order
    pub alphabet: Alphabet,
    pub content_groups: Vec<u32>,   // Sizes of the runs of content items sharing an upward path
}

impl XbwtTriple {
    /// Linearizes a tree.
    pub fn from_tree(tree: &Tree) -> Result<Self> {
        let start = Instant::now();
        let n = tree.len();
        if n < 2 {
            return Err(Error::Parse("document has no content".into()));
        }
        if u32::try_from(n).is_err() {
            return Err(Error::out_of_range("node count", n, u32::MAX as usize));
        }

        let alphabet = Alphabet::from_labels((1..n as NodeId).map(|id| tree.label(id)));
        let mut codes = Vec::with_capacity(n);
        for id in 0..n as NodeId {
            codes.push(alphabet.code(tree.label(id)).unwrap_or(alphabet.root_code()));
        }

        // Every label except content must own a group of children, or the
        // group bookkeeping in `last` falls out of step with `alpha`.
        for id in 1..n as NodeId {
            if tree.kind(id) != NodeKind::Content && tree.children(id).is_empty() {
                return Err(Error::Parse(format!(
                    "{} node {} has no children",
                    String::from_utf8_lossy(tree.label(id)),
                    id
                )));
            }
            if tree.kind(id) == NodeKind::Content && !tree.children(id).is_empty() {
                return Err(Error::Parse(format!("content node {} has children", id)));
            }
        }

        // A node sorts by the upward string of its parent; the root has none.
        let ranks = upward_ranks(tree, &codes);
        let key = |id: NodeId| tree.parent(id).map_or(0, |p| ranks[p as usize]);
        let mut rows: Vec<NodeId> = (0..n as NodeId).collect();
        rows.sort_unstable_by_key(|&id| (key(id), id));
        debug!(nodes = n, labels = alphabet.len(), elapsed = ?start.elapsed(), "sorted upward paths");

        let mut last = BitVector::with_capacity(n);
        let mut alpha = Vec::with_capacity(n);
        let mut pcdata = Vec::new();
        let mut content_groups: Vec<u32> = Vec::new();
        let mut previous_content: Option<NodeId> = None;

        for &id in &rows {
            last.push(tree.is_last_child(id));
            alpha.push(codes[id as usize]);
            if tree.kind(id) == NodeKind::Content {
                pcdata.push(PAYLOAD_SEPARATOR);
                pcdata.extend_from_slice(tree.content(id));
                match previous_content {
                    Some(prev) if key(prev) == key(id) => {
                        if let Some(size) = content_groups.last_mut() {
                            *size += 1;
                        }
                    }
                    _ => content_groups.push(1),
                }
                previous_content = Some(id);
            }
        }

        Ok(XbwtTriple {
            last,
            alpha,
            pcdata,
            alphabet,
            content_groups,
        })
    }

    pub fn len(&self) -> usize {
        self.alpha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alpha.is_empty()
    }

    pub fn content_count(&self) -> usize {
        self.content_groups.iter().map(|&g| g as usize).sum()
    }

    /// Token bytes of a row.
    pub fn token(&self, row: usize) -> &[u8] {
        self.alphabet.token(self.alpha[row])
    }

    /// First row of the child group of each label code, plus the start of
    /// the root's group at index `alphabet.len()`.
    ///
    /// Codes that own no group (the content marker among them) take the
    /// value of the next code, so the table is non-decreasing.
    pub fn first_rows(&self) -> Result<Vec<u32>> {
        let sigma = self.alphabet.len();
        let ones = self.last.count_ones();
        let mut f = vec![u32::MAX; sigma + 1];
        f[sigma] = self.root_group_start(ones)? as u32;

        // Walk the groups in row order; group g belongs to the g-th parent in
        // code order, found by counting the non-content rows per code.
        let mut owners = vec![0usize; sigma + 1];
        for &code in &self.alpha {
            if Some(code) != self.alphabet.content_code() {
                owners[code as usize] += 1;
            }
        }
        owners[sigma] = 0;

        let mut group_start = 1usize;
        let mut ends = self.last.ones(1);
        for code in 0..sigma {
            for taken in 0..owners[code] {
                let end = ends
                    .next()
                    .ok_or_else(|| Error::malformed("fewer sibling groups than parents"))?;
                if taken == 0 {
                    f[code] = group_start as u32;
                }
                group_start = end + 1;
            }
        }
        for code in (0..sigma).rev() {
            if f[code] == u32::MAX {
                f[code] = f[code + 1];
            }
        }
        Ok(f)
    }

    fn root_group_start(&self, ones: usize) -> Result<usize> {
        if ones < 2 {
            return Err(Error::malformed("last stream holds fewer than two groups"));
        }
        self.last
            .select1(ones - 1)
            .map(|p| p + 1)
            .ok_or_else(|| Error::malformed("cannot locate the root group"))
    }

    /// Payload of every content row, in row order.
    pub fn payloads(&self) -> Vec<&[u8]> {
        split_payloads(&self.pcdata)
    }
}

/// Splits a NUL-prefixed payload stream into its items.
pub fn split_payloads(pcdata: &[u8]) -> Vec<&[u8]> {
    match pcdata.split_first() {
        Some((&PAYLOAD_SEPARATOR, rest)) => rest.split(|&b| b == PAYLOAD_SEPARATOR).collect(),
        _ => Vec::new(),
    }
}

/// Compares the upward paths of two nodes, shorter prefix first.
/// Dense rank (from 1) of every node's upward string: its own code followed
/// by the codes of its ancestors up to the root, a proper prefix ranking
/// below its extensions.
///
/// Prefix doubling: round `k` ranks the first `2^k` codes as the pair of the
/// previous rank and the previous rank of the `2^(k-1)`-th ancestor.
fn upward_ranks(tree: &Tree, codes: &[u32]) -> Vec<u32> {
    let n = codes.len();
    let mut rank: Vec<u32> = codes.iter().map(|&c| c + 1).collect();
    let mut jump: Vec<Option<NodeId>> = (0..n as NodeId).map(|id| tree.parent(id)).collect();
    let mut order: Vec<NodeId> = (0..n as NodeId).collect();
    let mut rounds = 0;

    while jump.iter().any(Option::is_some) {
        let pair = |v: NodeId| {
            let ancestor = jump[v as usize].map_or(0, |a| rank[a as usize]);
            (rank[v as usize], ancestor)
        };
        order.sort_unstable_by_key(|&v| pair(v));

        let mut next = vec![0u32; n];
        let mut current = 0u32;
        let mut previous = None;
        for &v in &order {
            let p = pair(v);
            if previous != Some(p) {
                current += 1;
                previous = Some(p);
            }
            next[v as usize] = current;
        }
        let doubled = jump.iter().map(|j| j.and_then(|a| jump[a as usize])).collect();
        rank = next;
        jump = doubled;
        rounds += 1;
    }
    trace!(nodes = n, rounds, "ranked upward strings");
    rank
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_document, ParseOptions};

    fn triple(xml: &str) -> XbwtTriple {
        let tree = parse_document(xml.as_bytes(), &ParseOptions::default()).unwrap();
        XbwtTriple::from_tree(&tree).unwrap()
    }

    fn tokens(t: &XbwtTriple) -> Vec<String> {
        (0..t.len())
            .map(|r| String::from_utf8_lossy(t.token(r)).into_owned())
            .collect()
    }

    fn bits(t: &XbwtTriple) -> String {
        (0..t.len())
            .map(|r| if t.last.get(r) == Some(true) { '1' } else { '0' })
            .collect()
    }

    #[test]
    fn three_node_document() {
        let t = triple("<a><b>x</b></a>");
        assert_eq!(tokens(&t), ["<", "<b", "=", "<a"]);
        assert_eq!(bits(&t), "1111");
        assert_eq!(t.pcdata, b"\0x".to_vec());
        assert_eq!(t.alphabet.len(), 3);
        assert_eq!(t.first_rows().unwrap(), vec![1, 2, 3, 3]);
        assert_eq!(t.content_groups, vec![1]);
    }

    #[test]
    fn siblings_share_a_group() {
        let t = triple("<r><a>1</a><b>2</b><a>3</a></r>");
        // codes: <a=0 <b=1 <r=2 ==3, root=4
        assert_eq!(tokens(&t), ["<", "=", "=", "=", "<a", "<b", "<a", "<r"]);
        assert_eq!(bits(&t), "11110011");
        assert_eq!(t.payloads(), [&b"1"[..], &b"3"[..], &b"2"[..]]);
        assert_eq!(t.content_groups, vec![2, 1]);
        assert_eq!(t.first_rows().unwrap(), vec![1, 3, 4, 7, 7]);
    }

    #[test]
    fn root_group_sorts_last() {
        let t = triple("<?p?><a/>tail");
        let n = t.len();
        assert_eq!(t.token(n - 1), b"=");
        assert_eq!(t.token(n - 2), b"<a");
        assert_eq!(t.token(n - 3), b"=");
        let f = t.first_rows().unwrap();
        assert_eq!(f[t.alphabet.len()] as usize, n - 3);
    }

    #[test]
    fn upward_ranks_order_ancestor_strings() {
        let xml = "<r><a><a><b>1</b></a><b>2</b></a><b><a>3</a></b></r>";
        let tree = parse_document(xml.as_bytes(), &ParseOptions::default()).unwrap();
        let alphabet = Alphabet::from_labels((1..tree.len() as NodeId).map(|id| tree.label(id)));
        let codes: Vec<u32> = (0..tree.len() as NodeId)
            .map(|id| alphabet.code(tree.label(id)).unwrap_or(alphabet.root_code()))
            .collect();
        let upward = |mut id: NodeId| {
            let mut s = vec![codes[id as usize]];
            while let Some(p) = tree.parent(id) {
                s.push(codes[p as usize]);
                id = p;
            }
            s
        };

        let ranks = upward_ranks(&tree, &codes);
        for u in 0..tree.len() as NodeId {
            for v in 0..tree.len() as NodeId {
                assert_eq!(ranks[u as usize].cmp(&ranks[v as usize]), upward(u).cmp(&upward(v)), "{} {}", u, v);
            }
        }
    }

    #[test]
    fn deep_chains_linearize() {
        let depth = 3000;
        let mut xml = String::new();
        for i in 0..depth {
            xml.push_str(if i % 2 == 0 { "<a>" } else { "<b>" });
        }
        xml.push('x');
        for i in (0..depth).rev() {
            xml.push_str(if i % 2 == 0 { "</a>" } else { "</b>" });
        }
        let t = triple(&xml);
        assert_eq!(t.len(), depth + 2);
        assert_eq!(t.content_groups, vec![1]);
        assert_eq!(t.to_xml().unwrap(), xml.into_bytes());
    }

    #[test]
    fn payload_split_handles_empty_items() {
        assert_eq!(split_payloads(b"\0a\0\0b"), [&b"a"[..], &b""[..], &b"b"[..]]);
        assert!(split_payloads(b"").is_empty());
    }
}
