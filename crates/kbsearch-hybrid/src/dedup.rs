use std::collections::HashSet;

use kbsearch_core::types::{article_of, ChunkId};

/// First (best-ranked) chunk of each article, at most `k` of them, in input order.
pub fn dedup_articles<I: IntoIterator<Item = ChunkId>>(ids: I, k: usize) -> Vec<ChunkId> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    if k == 0 { return unique; }
    for id in ids {
        if seen.insert(article_of(id)) {
            unique.push(id);
            if unique.len() == k { break; }
        }
    }
    unique
}
