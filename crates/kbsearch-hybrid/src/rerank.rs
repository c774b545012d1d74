use tracing::debug;

use kbsearch_core::traits::Reranker;
use kbsearch_core::types::{ChunkRecord, ScoredChunk};
use kbsearch_core::{Error, Result};

/// Score `(query, snippet)` pairs, sort by score descending and keep `k`.
/// An empty candidate list never reaches the model.
pub fn rerank(reranker: &dyn Reranker, query: &str, records: Vec<ChunkRecord>, k: usize) -> Result<Vec<ScoredChunk>> {
    if records.is_empty() { return Ok(vec![]); }
    let pairs: Vec<(String, String)> = records.iter().map(|r| (query.to_string(), r.snippet.clone())).collect();
    let scores = reranker.score(&pairs).map_err(Error::provider("rerank"))?;
    if scores.len() != records.len() {
        return Err(Error::provider("rerank")(anyhow::anyhow!("{} scores for {} candidates", scores.len(), records.len())));
    }
    let mut scored: Vec<ScoredChunk> = records.into_iter().zip(scores).map(|(record, score)| ScoredChunk { record, score }).collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    debug!(kept = scored.len(), "reranked");
    Ok(scored)
}
