//! kbsearch-text
//!
//! Tantivy-backed lexical index: BM25 match over chunk text, metadata and
//! filter lookups, and the vocabulary feed for spelling correction.

pub mod index;
pub mod tantivy_utils;

pub use index::{ChunkDocument, ChunkIndexWriter, TantivyChunkIndex};
