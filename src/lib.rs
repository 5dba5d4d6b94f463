pub mod bit_vector;
pub mod bitrun;
pub mod compact;
pub mod compressor;
pub mod config;
pub mod error;
pub mod fulltext;
pub mod index;
pub mod navigation;
pub mod parser;
pub mod search;
pub mod subtree;
pub mod tree;
pub mod xbwt;

pub use compact::{compress_document, decompress_document, Layout};
pub use compressor::{BlockCodec, CodecKind};
pub use config::IndexConfig;
pub use error::{Error, Result};
pub use index::{AccessStats, IndexSummary, XbwtIndex};
pub use navigation::{Navigator, RowRange};
pub use search::{parse_path, SearchResult};
pub use subtree::Subtree;
pub use tree::{NodeKind, Tree};
