//! kbsearch-core
//!
//! Domain types, collaborator traits, error taxonomy and configuration for
//! the knowledge-base retrieval engine.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use types::{article_of, ArticleId, Candidate, ChunkId, ChunkRecord, ScoredChunk, ARTICLE_SHIFT};
