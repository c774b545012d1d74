use std::collections::HashMap;

use kbsearch_core::traits::LexicalIndex;
use kbsearch_core::types::{ChunkId, ChunkRecord};
use kbsearch_core::{Error, Result};

/// Metadata rows for `ids` in exactly the order of `ids`.
///
/// One batched lookup; the store may answer in any order. Ids the store
/// does not know are dropped.
pub fn assemble<L: LexicalIndex + ?Sized>(lexical: &L, ids: &[ChunkId], snippet_len: usize) -> Result<Vec<ChunkRecord>> {
    if ids.is_empty() { return Ok(vec![]); }
    let rank: HashMap<ChunkId, usize> = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let mut rows: Vec<ChunkRecord> = lexical
        .lookup_metadata(ids, snippet_len)
        .map_err(Error::provider("metadata lookup"))?
        .into_iter()
        .filter(|r| rank.contains_key(&r.chunk_id))
        .collect();
    rows.sort_by_key(|r| rank[&r.chunk_id]);
    Ok(rows)
}
