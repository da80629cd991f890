//! LanceDB-backed vector index for document chunks.
//!
//! An index directory holds two tables: `chunks` with one row per chunk and
//! its embedding, and `meta` recording the embedding model and build time.

pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use search::LanceSearchEngine;
pub use table::IndexMeta;
pub use writer::{build_index, LanceDbIndexer};
