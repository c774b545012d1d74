use std::collections::{HashMap, HashSet};

use crate::types::{Candidate, ChunkId, ChunkRecord, FilterPredicate, SchemaCaps};

/// Turns text into fixed-size, L2-normalized vectors.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Nearest-neighbour search by inner product over normalized vectors.
pub trait VectorIndex: Send + Sync {
    /// At most `n` hits, best first. `score` is the similarity.
    fn search_vec(&self, query_vec: &[f32], n: usize) -> anyhow::Result<Vec<Candidate>>;
}

/// BM25-style keyword index that also owns chunk metadata.
///
/// Implementations must be safe to query from several threads at once.
pub trait LexicalIndex: Send + Sync {
    fn schema_caps(&self) -> SchemaCaps;
    /// At most `limit` matches, best first. Higher raw score is better.
    fn search(&self, text: &str, limit: usize) -> anyhow::Result<Vec<Candidate>>;
    /// Metadata rows for `ids`, in no particular order. Unknown ids are skipped.
    fn lookup_metadata(&self, ids: &[ChunkId], snippet_len: usize) -> anyhow::Result<Vec<ChunkRecord>>;
    /// Every chunk id satisfying `predicate`.
    fn filtered_ids(&self, predicate: &FilterPredicate) -> anyhow::Result<HashSet<ChunkId>>;
    /// Lower-cased term frequencies for the spelling dictionary.
    fn term_counts(&self, min_len: usize, max_docs: usize) -> anyhow::Result<HashMap<String, u64>>;
}

/// Cross-encoder style scorer over `(query, text)` pairs.
pub trait Reranker: Send + Sync {
    /// One score per pair, same order as the input.
    fn score(&self, pairs: &[(String, String)]) -> anyhow::Result<Vec<f32>>;
}
