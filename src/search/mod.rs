//! Path search.
//!
//! A query is a chain of label tokens (`<tag`, `@attribute`), read from the
//! topmost element down, optionally closed by a `=value` content pattern.
//! The chain is matched anywhere in the document, not only at the root.

use std::ops::Range;

use tracing::debug;

use crate::error::{Error, Result};
use crate::navigation::{Navigator, RowRange};
use crate::tree::{ATTRIBUTE_MARKER, TAG_MARKER};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    /// Children of the nodes reached by the path, `None` when nothing matched.
    pub range: Option<RowRange>,
    /// Nodes reached by the label path.
    pub path_occurrences: usize,
    /// Occurrences of the content pattern, or `path_occurrences` without one.
    pub occurrences: usize,
    /// Content items under the reached nodes.
    pub content_items: Range<usize>,
    /// Pcdata blocks scanned for the pattern.
    pub blocks: Range<usize>,
    pub snippets: Vec<Vec<u8>>,
}

/// Splits a query string such as `<chapter<section@author=Paolo` into its
/// tokens. Everything after the first `=` is the content pattern.
pub fn parse_path(query: &str) -> Result<Vec<Vec<u8>>> {
    let bytes = query.as_bytes();
    match bytes.first() {
        Some(&TAG_MARKER) | Some(&ATTRIBUTE_MARKER) | Some(b'=') => {}
        _ => {
            return Err(Error::UnsupportedQuery(format!(
                "query must start with <, @ or =: {:?}",
                query
            )))
        }
    }
    let mut tokens = Vec::new();
    let mut start = 0;
    for pos in 1..=bytes.len() {
        if bytes[start] == b'=' {
            tokens.push(bytes[start..].to_vec());
            return Ok(tokens);
        }
        if pos == bytes.len() || matches!(bytes[pos], TAG_MARKER | ATTRIBUTE_MARKER | b'=') {
            tokens.push(bytes[start..pos].to_vec());
            start = pos;
        }
    }
    Ok(tokens)
}

/// Separates label tokens from the trailing content pattern.
fn split_query<T: AsRef<[u8]>>(tokens: &[T]) -> Result<(Vec<&[u8]>, Option<&[u8]>)> {
    let mut labels = Vec::with_capacity(tokens.len());
    let mut pattern = None;
    for (i, token) in tokens.iter().enumerate() {
        let token = token.as_ref();
        match token.first() {
            Some(b'=') if i + 1 == tokens.len() => {
                if token.len() == 1 {
                    return Err(Error::UnsupportedQuery("empty content pattern".into()));
                }
                pattern = Some(&token[1..]);
            }
            Some(b'=') => {
                return Err(Error::UnsupportedQuery(
                    "content pattern must close the path".into(),
                ))
            }
            Some(&TAG_MARKER) | Some(&ATTRIBUTE_MARKER) if token.len() > 1 => labels.push(token),
            _ => {
                return Err(Error::UnsupportedQuery(format!(
                    "malformed path token {:?}",
                    String::from_utf8_lossy(token)
                )))
            }
        }
    }
    if labels.is_empty() {
        return Err(Error::UnsupportedQuery("path has no label".into()));
    }
    Ok((labels, pattern))
}

impl<'a> Navigator<'a> {
    /// Counts the nodes reached by a label path and, when the path ends
    /// with `=value`, the occurrences of `value` in their content.
    pub fn search<T: AsRef<[u8]>>(&mut self, tokens: &[T]) -> Result<SearchResult> {
        self.run_search(tokens, None)
    }

    /// Like [`search`](Self::search), also collecting each pattern hit with
    /// `context` bytes around it.
    pub fn search_snippets<T: AsRef<[u8]>>(&mut self, tokens: &[T], context: usize) -> Result<SearchResult> {
        self.run_search(tokens, Some(context))
    }

    /// Children interval of the nodes matching `labels`, `None` if empty.
    fn path_range(&mut self, labels: &[&[u8]]) -> Result<Option<RowRange>> {
        let index = self.index();
        let alphabet = index.alphabet();
        let f = index.first_rows();

        let Ok(seed) = alphabet.require(labels[0]) else {
            return Ok(None);
        };
        let (mut first, end) = (f[seed as usize] as usize, f[seed as usize + 1] as usize);
        if first >= end {
            return Ok(None);
        }
        let mut last = end - 1;

        for label in &labels[1..] {
            let Ok(code) = alphabet.require(label) else {
                return Ok(None);
            };
            let groups_before = self.rank1_before(f[code as usize] as usize)?;
            let k1 = index.alpha().rank(code, first - 1, self.stats_mut())?;
            let k2 = index.alpha().rank(code, last, self.stats_mut())?;
            if k1 == k2 {
                return Ok(None);
            }
            first = self.select1(groups_before + k1)? + 1;
            last = self.select1(groups_before + k2)?;
        }
        Ok(Some(RowRange { first, last }))
    }

    fn run_search<T: AsRef<[u8]>>(&mut self, tokens: &[T], context: Option<usize>) -> Result<SearchResult> {
        let (labels, pattern) = split_query(tokens)?;
        let Some(range) = self.path_range(&labels)? else {
            return Ok(SearchResult::default());
        };
        let path_occurrences = self.rank1(range.last)? - self.rank1_before(range.first)?;
        let mut result = SearchResult {
            range: Some(range),
            path_occurrences,
            occurrences: path_occurrences,
            ..SearchResult::default()
        };
        let Some(pattern) = pattern else {
            return Ok(result);
        };

        let index = self.index();
        result.occurrences = 0;
        let Some(content) = index.alphabet().content_code() else {
            return Ok(result);
        };
        let items_before = index.alpha().rank(content, range.first - 1, self.stats_mut())?;
        let items_through = index.alpha().rank(content, range.last, self.stats_mut())?;
        result.content_items = items_before..items_through;
        result.blocks = index.pcdata().blocks_for_items(result.content_items.clone())?;

        for block in result.blocks.clone() {
            match context {
                Some(context) => {
                    let hits = index.pcdata().display(block, pattern, context, self.stats_mut())?;
                    result.occurrences += hits.len();
                    result.snippets.extend(hits);
                }
                None => result.occurrences += index.pcdata().count(block, pattern, self.stats_mut())?,
            }
        }
        debug!(
            path_occurrences,
            occurrences = result.occurrences,
            blocks = result.blocks.len(),
            "path search"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::index::XbwtIndex;

    const LIBRARY: &[u8] = b"<lib><book id=\"1\"><author>Paolo</author><title>Paolo's tale</title></book>\
        <book id=\"2\"><author>Giovanni</author><author>Paolo</author></book>\
        <shelf><book id=\"3\"><author>Paolo and Paolo</author></book></shelf></lib>";

    fn library() -> XbwtIndex {
        let config = IndexConfig {
            block_population: 3,
            block_symbol_count: 4,
            ..IndexConfig::default()
        };
        XbwtIndex::from_xml(LIBRARY, &config).unwrap()
    }

    #[test]
    fn query_strings_split_at_markers() {
        assert_eq!(
            parse_path("<chapter<section@author=Paolo").unwrap(),
            vec![b"<chapter".to_vec(), b"<section".to_vec(), b"@author".to_vec(), b"=Paolo".to_vec()]
        );
        assert_eq!(
            parse_path("<a=x<y@z").unwrap(),
            vec![b"<a".to_vec(), b"=x<y@z".to_vec()]
        );
        assert!(matches!(parse_path("chapter"), Err(Error::UnsupportedQuery(_))));
    }

    #[test]
    fn label_paths_count_nodes() {
        let index = library();
        let mut nav = index.navigator();
        assert_eq!(nav.search(&["<book"]).unwrap().path_occurrences, 3);
        assert_eq!(nav.search(&["<lib", "<book"]).unwrap().path_occurrences, 2);
        assert_eq!(nav.search(&["<shelf", "<book", "<author"]).unwrap().path_occurrences, 1);
        assert_eq!(nav.search(&["<book", "@id"]).unwrap().path_occurrences, 3);
        assert_eq!(nav.search(&["<author"]).unwrap().path_occurrences, 4);
    }

    #[test]
    fn content_patterns_count_substrings() {
        let index = library();
        let mut nav = index.navigator();
        let result = nav.search(&["<book", "<author", "=Paolo"]).unwrap();
        assert_eq!(result.path_occurrences, 4);
        assert_eq!(result.occurrences, 4);
        assert_eq!(result.content_items.len(), 4);

        let result = nav.search(&["<lib", "<book", "<author", "=Paolo"]).unwrap();
        assert_eq!(result.occurrences, 2);
        assert_eq!(nav.search(&["<title", "=Paolo"]).unwrap().occurrences, 1);
        assert_eq!(nav.search(&["@id", "=2"]).unwrap().occurrences, 1);
        assert_eq!(nav.search(&["<author", "=Nobody"]).unwrap().occurrences, 0);
    }

    #[test]
    fn overlapping_matches_all_count() {
        let index = XbwtIndex::from_xml(b"<r><t>aaaa</t><u>aaaa</u></r>", &IndexConfig::default()).unwrap();
        let mut nav = index.navigator();
        assert_eq!(nav.search(&["<t", "=aa"]).unwrap().occurrences, 3);
        assert_eq!(nav.search(&["<r", "<t", "=aaa"]).unwrap().occurrences, 2);
        let result = nav.search_snippets(&["<t", "=aa"], 1).unwrap();
        assert_eq!(result.snippets.len(), 3);
    }

    #[test]
    fn snippets_carry_context() {
        let index = library();
        let mut nav = index.navigator();
        let result = nav.search_snippets(&["<author", "=Giovanni"], 2).unwrap();
        assert_eq!(result.occurrences, 1);
        assert_eq!(result.snippets.len(), 1);
        assert!(result.snippets[0].windows(8).any(|w| w == b"Giovanni"));
        assert!(result.snippets[0].len() <= 12);
    }

    #[test]
    fn unknown_labels_give_empty_results() {
        let index = library();
        let mut nav = index.navigator();
        let result = nav.search(&["<missing"]).unwrap();
        assert_eq!(result, SearchResult::default());
        assert_eq!(nav.search(&["<book", "<nothing"]).unwrap().occurrences, 0);
        assert_eq!(nav.search(&["<shelf", "<author"]).unwrap().range, None);
    }

    #[test]
    fn malformed_queries_are_rejected() {
        let index = library();
        let mut nav = index.navigator();
        let empty: [&str; 0] = [];
        for bad in [&["=Paolo", "<book"][..], &["=x"][..], &["<"][..], &["book"][..], &empty[..]] {
            assert!(matches!(nav.search(bad), Err(Error::UnsupportedQuery(_))), "{:?}", bad);
        }
        assert!(matches!(nav.search(&["<book", "="]), Err(Error::UnsupportedQuery(_))));
    }

    #[test]
    fn extending_a_path_never_adds_matches() {
        let index = library();
        let mut nav = index.navigator();
        let mut previous = usize::MAX;
        for path in [&["<author"][..], &["<book", "<author"][..], &["<shelf", "<book", "<author"][..]] {
            let count = nav.search(path).unwrap().path_occurrences;
            assert!(count <= previous);
            previous = count;
        }
    }
}
