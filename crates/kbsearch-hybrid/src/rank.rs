//! Dense and lexical score fusion.

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use kbsearch_core::config::RetrievalSettings;
use kbsearch_core::traits::{Embedder, LexicalIndex, VectorIndex};
use kbsearch_core::types::{Candidate, ChunkId};
use kbsearch_core::{Error, Result};

/// Dense weight for `query`: long queries lean on the embedding, short
/// ones give keywords more say.
pub fn fusion_weight(query: &str, settings: &RetrievalSettings) -> f32 {
    if query.split_whitespace().count() > settings.short_query_max_tokens { settings.long_query_alpha } else { settings.short_query_alpha }
}

/// Min-max scale to `[0, 1]`. All-equal inputs map to `1.0`.
pub fn min_max(raw: &HashMap<ChunkId, f32>) -> HashMap<ChunkId, f32> {
    let Some(lo) = raw.values().copied().reduce(f32::min) else { return HashMap::new() };
    let hi = raw.values().copied().fold(lo, f32::max);
    if hi == lo { return raw.keys().map(|&id| (id, 1.0)).collect(); }
    raw.iter().map(|(&id, &v)| (id, (v - lo) / (hi - lo))).collect()
}

/// Keep hits in `allowed`, or everything when there is no restriction.
pub fn restrict(hits: Vec<Candidate>, allowed: Option<&HashSet<ChunkId>>) -> Vec<Candidate> {
    match allowed {
        Some(allowed) => hits.into_iter().filter(|c| allowed.contains(&c.id)).collect(),
        None => hits,
    }
}

/// Sort best first, equal scores by ascending id.
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
}

/// `alpha * dense + (1 - alpha) * minmax(lexical)` over the union of both
/// pools; an id missing from one pool scores 0 there.
pub fn fuse(dense: &[Candidate], lexical: &[Candidate], alpha: f32) -> Vec<Candidate> {
    let cos: HashMap<ChunkId, f32> = dense.iter().map(|c| (c.id, c.score)).collect();
    let bm25_raw: HashMap<ChunkId, f32> = lexical.iter().map(|c| (c.id, c.score)).collect();
    let bm25 = min_max(&bm25_raw);
    let union: BTreeMap<ChunkId, ()> = cos.keys().chain(bm25.keys()).map(|&id| (id, ())).collect();
    let mut fused: Vec<Candidate> = union
        .into_keys()
        .map(|id| Candidate::new(id, alpha * cos.get(&id).copied().unwrap_or(0.0) + (1.0 - alpha) * bm25.get(&id).copied().unwrap_or(0.0)))
        .collect();
    sort_candidates(&mut fused);
    fused
}

/// First-stage ranking: dense and lexical candidate pools fused into one list.
pub struct HybridRanker<'a, L: ?Sized, V: ?Sized> {
    pub embedder: &'a dyn Embedder,
    pub vector: &'a V,
    pub lexical: &'a L,
    pub settings: &'a RetrievalSettings,
}

impl<L: LexicalIndex + ?Sized, V: VectorIndex + ?Sized> HybridRanker<'_, L, V> {
    pub fn rank(&self, query: &str, allowed: Option<&HashSet<ChunkId>>, alpha: f32) -> Result<Vec<Candidate>> {
        if query.trim().is_empty() { return Ok(vec![]); }
        let n = self.settings.n_candidates;

        let query_vec = self
            .embedder
            .embed_batch(&[query.to_string()])
            .map_err(Error::provider("embedding"))?
            .pop()
            .ok_or_else(|| Error::Operation("embedder returned no vector".into()))?;
        let dense = restrict(self.vector.search_vec(&query_vec, n).map_err(Error::provider("vector search"))?, allowed);

        let lexical_limit = n.saturating_mul(self.settings.bm25_candidate_multiplier);
        let lexical = restrict(self.lexical.search(query, lexical_limit).map_err(Error::provider("lexical search"))?, allowed);

        let fused = fuse(&dense, &lexical, alpha);
        debug!(dense = dense.len(), lexical = lexical.len(), fused = fused.len(), alpha, "hybrid ranking");
        Ok(fused)
    }
}
