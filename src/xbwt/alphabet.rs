use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::tree::{CONTENT_TOKEN, ROOT_TOKEN};

/// Sorted distinct label tokens; the code of a label is its rank.
///
/// The root token `<` is not a member. It is assigned the code
/// `len()`, one past every real label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alphabet {
    labels: Vec<Vec<u8>>,
    codes: FxHashMap<Vec<u8>, u32>,
}

impl Alphabet {
    /// Builds the alphabet from labels in any order, dropping duplicates.
    pub fn from_labels<I, L>(labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        let mut sorted: Vec<Vec<u8>> = labels
            .into_iter()
            .map(|l| l.as_ref().to_vec())
            .filter(|l| l.as_slice() != ROOT_TOKEN)
            .collect();
        sorted.sort_unstable();
        sorted.dedup();
        let codes = sorted
            .iter()
            .enumerate()
            .map(|(code, label)| (label.clone(), code as u32))
            .collect();
        Alphabet {
            labels: sorted,
            codes,
        }
    }

    /// Number of labels, the alphabet cardinality.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Code reserved for the synthetic root.
    pub fn root_code(&self) -> u32 {
        self.labels.len() as u32
    }

    pub fn code(&self, token: &[u8]) -> Option<u32> {
        if token == ROOT_TOKEN {
            return Some(self.root_code());
        }
        self.codes.get(token).copied()
    }

    /// Code of a label that must belong to the alphabet.
    pub fn require(&self, token: &[u8]) -> Result<u32> {
        self.codes
            .get(token)
            .copied()
            .ok_or_else(|| Error::symbol_not_found(token))
    }

    pub fn token(&self, code: u32) -> &[u8] {
        match self.labels.get(code as usize) {
            Some(label) => label,
            None => ROOT_TOKEN,
        }
    }

    pub fn content_code(&self) -> Option<u32> {
        self.codes.get(CONTENT_TOKEN).copied()
    }

    pub fn labels(&self) -> impl Iterator<Item = &[u8]> {
        self.labels.iter().map(|l| l.as_slice())
    }

    /// Concatenation of the NUL-terminated labels.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.labels.iter().map(|l| l.len() + 1).sum());
        for label in &self.labels {
            out.extend_from_slice(label);
            out.push(0);
        }
        out
    }

    pub fn from_bytes(bytes: &[u8], cardinality: usize) -> Result<Self> {
        let body = bytes
            .strip_suffix(&[0])
            .ok_or_else(|| Error::malformed("alphabet is not NUL-terminated"))?;
        let labels: Vec<&[u8]> = body.split(|&b| b == 0).collect();
        if labels.len() != cardinality {
            return Err(Error::malformed(format!(
                "alphabet holds {} labels, header declares {}",
                labels.len(),
                cardinality
            )));
        }
        if labels.windows(2).any(|w| w[0] >= w[1]) || labels.iter().any(|l| l.is_empty()) {
            return Err(Error::malformed("alphabet labels are not strictly sorted"));
        }
        Ok(Self::from_labels(labels))
    }
}
