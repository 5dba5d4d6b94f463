use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    /// A row, position or rank outside the valid domain.
    #[error("{what} {value} out of range (limit {limit})")]
    OutOfRange {
        what: &'static str,
        value: usize,
        limit: usize,
    },

    #[error("malformed index: {0}")]
    MalformedIndex(String),

    #[error("symbol not found in alphabet: {0}")]
    SymbolNotFound(String),

    /// Failure reported by a block codec or a full-text index.
    #[error("collaborator failure{}: {source}", block_suffix(.block))]
    DelegateFailure {
        block: Option<usize>,
        #[source]
        source: BoxError,
    },

    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error("xml parse error: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn block_suffix(block: &Option<usize>) -> String {
    match block {
        Some(b) => format!(" in block {}", b),
        None => String::new(),
    }
}

impl Error {
    pub fn out_of_range(what: &'static str, value: usize, limit: usize) -> Self {
        Error::OutOfRange { what, value, limit }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedIndex(msg.into())
    }

    pub fn delegate<E: Into<BoxError>>(source: E) -> Self {
        Error::DelegateFailure {
            block: None,
            source: source.into(),
        }
    }

    /// Attaches the originating block id to a collaborator failure.
    pub fn in_block(self, id: usize) -> Self {
        match self {
            Error::DelegateFailure { block: None, source } => Error::DelegateFailure {
                block: Some(id),
                source,
            },
            other => other,
        }
    }

    pub fn symbol_not_found(label: &[u8]) -> Self {
        Error::SymbolNotFound(String::from_utf8_lossy(label).into_owned())
    }
}
