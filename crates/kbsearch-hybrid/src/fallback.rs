use std::collections::HashSet;
use tracing::warn;

use kbsearch_core::config::RetrievalSettings;
use kbsearch_core::traits::LexicalIndex;
use kbsearch_core::types::{Candidate, ChunkId};
use kbsearch_core::{Error, Result};

use crate::rank::{restrict, sort_candidates};

/// Keyword-only ranking over the larger fallback pool, for when fusion
/// produced nothing. Not deduplicated.
pub fn lexical_fallback<L: LexicalIndex + ?Sized>(lexical: &L, query: &str, allowed: Option<&HashSet<ChunkId>>, settings: &RetrievalSettings) -> Result<Vec<ChunkId>> {
    let hits = lexical.search(query, settings.bm25_fallback).map_err(Error::provider("lexical fallback"))?;
    let mut hits: Vec<Candidate> = restrict(hits, allowed);
    sort_candidates(&mut hits);
    hits.truncate(settings.rerank_candidates);
    warn!(query, hits = hits.len(), "hybrid ranking empty, using lexical fallback");
    Ok(hits.into_iter().map(|c| c.id).collect())
}
