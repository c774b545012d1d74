//! kbsearch-hybrid
//!
//! The retrieval pipeline: spell correction, filter resolution, dense and
//! lexical fusion, article dedup, lexical fallback, metadata assembly and
//! cross-encoder reranking.

pub mod assemble;
pub mod dedup;
pub mod engine;
pub mod fallback;
pub mod filter;
pub mod fuzz;
pub mod normalize;
pub mod rank;
pub mod rerank;
pub mod service;
pub mod spell;

pub use engine::HybridSearchEngine;
pub use normalize::{NormalizedQuery, QueryNormalizer};
pub use service::{handle_line, handle_message, handle_request, HostMessage, HostReply, ServiceReply};
pub use spell::SymSpell;
