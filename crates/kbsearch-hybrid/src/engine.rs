use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use kbsearch_core::config::{RetrievalSettings, Settings};
use kbsearch_core::traits::{Embedder, LexicalIndex, Reranker, VectorIndex};
use kbsearch_core::types::{FilterCriteria, SchemaCaps, SearchRequest, SearchResponse};
use kbsearch_core::Result;
use kbsearch_text::TantivyChunkIndex;
use kbsearch_vector::LanceVectorIndex;

use crate::assemble::assemble;
use crate::dedup::dedup_articles;
use crate::fallback::lexical_fallback;
use crate::filter::resolve_filters;
use crate::normalize::QueryNormalizer;
use crate::rank::{fusion_weight, HybridRanker};
use crate::rerank::rerank;

/// Process-wide search context: indexes, models and the spelling
/// dictionary, built once at startup and read-only afterwards.
pub struct HybridSearchEngine<L, V> where L: LexicalIndex, V: VectorIndex {
    lexical: L,
    vector: V,
    embedder: Box<dyn Embedder>,
    reranker: Box<dyn Reranker>,
    normalizer: QueryNormalizer,
    caps: SchemaCaps,
    settings: RetrievalSettings,
}

impl<L, V> HybridSearchEngine<L, V> where L: LexicalIndex, V: VectorIndex {
    pub fn new(lexical: L, vector: V, embedder: Box<dyn Embedder>, reranker: Box<dyn Reranker>, normalizer: QueryNormalizer, settings: RetrievalSettings) -> Self {
        let caps = lexical.schema_caps();
        Self { lexical, vector, embedder, reranker, normalizer, caps, settings }
    }

    pub fn caps(&self) -> SchemaCaps { self.caps }

    pub fn lexical(&self) -> &L { &self.lexical }

    pub fn normalizer(&self) -> &QueryNormalizer { &self.normalizer }

    pub fn settings(&self) -> &RetrievalSettings { &self.settings }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let start = Instant::now();
        let k = request.k.filter(|&k| k > 0).unwrap_or(self.settings.top_k);
        let criteria = match &request.filters {
            Some(map) => FilterCriteria::from_map(map)?,
            None => FilterCriteria::default(),
        };

        let query = self.normalizer.normalize(&request.text);
        let allowed = resolve_filters(&criteria, self.caps, &self.lexical)?;
        let alpha = fusion_weight(&query.text, &self.settings);

        let ranker = HybridRanker { embedder: self.embedder.as_ref(), vector: &self.vector, lexical: &self.lexical, settings: &self.settings };
        let fused = ranker.rank(&query.text, allowed.as_ref(), alpha)?;
        let mut ids = dedup_articles(fused.iter().map(|c| c.id), self.settings.rerank_candidates);
        debug!(fused = fused.len(), articles = ids.len(), "deduplicated");
        if ids.is_empty() {
            ids = lexical_fallback(&self.lexical, &query.text, allowed.as_ref(), &self.settings)?;
        }

        let records = assemble(&self.lexical, &ids, self.settings.snippet_len)?;
        let results = rerank(self.reranker.as_ref(), &query.text, records, k)?;
        info!(query = %query.text, k, results = results.len(), elapsed_ms = start.elapsed().as_millis() as u64, "search complete");
        Ok(SearchResponse { corrected: query.corrected, results })
    }
}

impl HybridSearchEngine<TantivyChunkIndex, LanceVectorIndex> {
    /// Open indexes and models under the active model's index directory.
    /// Any failure here means the process cannot serve.
    pub fn open(base: &Path, settings: &Settings) -> anyhow::Result<Self> {
        let index_dir = settings.index_dir(base);
        info!(path = %index_dir.display(), alias = %settings.models.alias, "opening search engine");
        let lexical = TantivyChunkIndex::open(&index_dir.join("tantivy"))?;
        let vector = LanceVectorIndex::open(&index_dir.join("lancedb"), &settings.vector)?;
        let embedder = kbsearch_embed::get_default_embedder(base, &settings.models)?;
        let reranker = kbsearch_embed::get_default_reranker(base, &settings.models)?;
        let normalizer = QueryNormalizer::from_lexical(&lexical, &settings.spelling);
        Ok(Self::new(lexical, vector, embedder, reranker, normalizer, settings.retrieval.clone()))
    }
}
