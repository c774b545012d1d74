use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use serde_json::json;

use kbsearch_core::config::{RetrievalSettings, SpellingSettings};
use kbsearch_core::traits::{LexicalIndex, Reranker, VectorIndex};
use kbsearch_core::types::{article_of, Candidate, ChunkId, ChunkRecord, FieldMatch, FilterPredicate, SchemaCaps, SearchRequest};
use kbsearch_embed::{FakeEmbedder, OverlapReranker};
use kbsearch_hybrid::assemble::assemble;
use kbsearch_hybrid::{handle_line, handle_message, handle_request, HostMessage, HostReply, HybridSearchEngine, QueryNormalizer};

struct Doc { id: ChunkId, product: &'static str, text: &'static str }

const CORPUS: &[Doc] = &[
    Doc { id: 0x100, product: "Mail", text: "To reset your password open the account settings page" },
    Doc { id: 0x101, product: "Mail", text: "Password reset links expire after one hour" },
    Doc { id: 0x102, product: "Mail", text: "Reset the password of a shared mailbox from the admin panel" },
    Doc { id: 0x200, product: "Chat", text: "Invoices are generated on the first day of each month" },
    Doc { id: 0x300, product: "Chat", text: "Enable two factor authentication for every agent account" },
    Doc { id: 0x400, product: "Mail", text: "Export conversations as a spreadsheet from reports" },
];

/// In-memory lexical store that records every `search` limit it sees.
#[derive(Default)]
struct SpyLexical {
    search_limits: Mutex<Vec<usize>>,
    filter_calls: AtomicUsize,
}

impl SpyLexical {
    fn limits(&self) -> Vec<usize> { self.search_limits.lock().unwrap().clone() }
}

fn words(text: &str) -> Vec<String> { text.split_whitespace().map(str::to_lowercase).collect() }

impl LexicalIndex for SpyLexical {
    fn schema_caps(&self) -> SchemaCaps { SchemaCaps::default() }

    fn search(&self, text: &str, limit: usize) -> Result<Vec<Candidate>> {
        self.search_limits.lock().unwrap().push(limit);
        let query = words(text);
        let mut hits: Vec<Candidate> = CORPUS
            .iter()
            .map(|d| { let doc = words(d.text); Candidate::new(d.id, query.iter().filter(|q| doc.contains(*q)).count() as f32) })
            .filter(|c| c.score > 0.0)
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    fn lookup_metadata(&self, ids: &[ChunkId], snippet_len: usize) -> Result<Vec<ChunkRecord>> {
        // Deliberately answer in reverse id order.
        let mut rows: Vec<ChunkRecord> = CORPUS
            .iter()
            .filter(|d| ids.contains(&d.id))
            .map(|d| ChunkRecord {
                chunk_id: d.id,
                title: format!("Article {}", article_of(d.id)),
                url: format!("https://kb.example.com/{}", article_of(d.id)),
                product: d.product.to_string(),
                category: "General".into(),
                internal: None,
                status: None,
                snippet: d.text.chars().take(snippet_len).collect(),
            })
            .collect();
        rows.sort_by(|a, b| b.chunk_id.cmp(&a.chunk_id));
        Ok(rows)
    }

    fn filtered_ids(&self, predicate: &FilterPredicate) -> Result<HashSet<ChunkId>> {
        self.filter_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CORPUS
            .iter()
            .filter(|d| predicate.clauses.iter().all(|c| match c {
                FieldMatch::Product(p) => d.product.to_lowercase() == *p,
                FieldMatch::Category(c) => c == "general",
                _ => false,
            }))
            .map(|d| d.id)
            .collect())
    }

    fn term_counts(&self, min_len: usize, _max_docs: usize) -> Result<HashMap<String, u64>> {
        let mut counts = HashMap::new();
        for d in CORPUS {
            for w in words(d.text).into_iter().filter(|w| w.chars().count() >= min_len) { *counts.entry(w).or_insert(0) += 1; }
        }
        Ok(counts)
    }
}

/// Fixed nearest-neighbour answer, best first.
struct FixedVector(Vec<Candidate>);

impl FixedVector {
    fn everything() -> Self {
        Self(CORPUS.iter().enumerate().map(|(i, d)| Candidate::new(d.id, 0.9 - i as f32 * 0.1)).collect())
    }
}

impl VectorIndex for FixedVector {
    fn search_vec(&self, _query_vec: &[f32], n: usize) -> Result<Vec<Candidate>> { Ok(self.0.iter().take(n).copied().collect()) }
}

/// Overlap scoring that counts invocations; `drop_one` returns one score too few.
struct CountingReranker { calls: Arc<AtomicUsize>, drop_one: bool }

impl Reranker for CountingReranker {
    fn score(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut scores = OverlapReranker.score(pairs)?;
        if self.drop_one { scores.pop(); }
        Ok(scores)
    }
}

struct FailingVector;

impl VectorIndex for FailingVector {
    fn search_vec(&self, _query_vec: &[f32], _n: usize) -> Result<Vec<Candidate>> { Err(anyhow!("ann backend unavailable")) }
}

fn engine_with<V: VectorIndex>(lexical: SpyLexical, vector: V, reranker: Box<dyn Reranker>, settings: RetrievalSettings) -> HybridSearchEngine<SpyLexical, V> {
    let normalizer = QueryNormalizer::from_lexical(&lexical, &SpellingSettings::default());
    HybridSearchEngine::new(lexical, vector, Box::new(FakeEmbedder::new(32)), reranker, normalizer, settings)
}

fn engine() -> HybridSearchEngine<SpyLexical, FixedVector> {
    engine_with(SpyLexical::default(), FixedVector::everything(), Box::new(OverlapReranker), RetrievalSettings::default())
}

fn request(text: &str, k: Option<usize>, filters: Option<serde_json::Value>) -> SearchRequest {
    let filters = filters.map(|v| serde_json::from_value::<BTreeMap<String, serde_json::Value>>(v).unwrap());
    SearchRequest { text: text.into(), k, filters }
}

#[test]
fn well_formed_query_returns_deduplicated_ranked_results() {
    let engine = engine();
    let response = engine.search(&request("how do I reset password", Some(5), Some(json!({})))).expect("search");
    assert_eq!(response.corrected, None);
    assert!(!response.results.is_empty());
    assert!(response.results.len() <= 5);
    assert!(response.results.windows(2).all(|w| w[0].score >= w[1].score));
    let articles: HashSet<_> = response.results.iter().map(|r| article_of(r.record.chunk_id)).collect();
    assert_eq!(articles.len(), response.results.len());
}

#[test]
fn misspelled_query_is_corrected_through_dictionary() {
    let engine = engine();
    let response = engine.search(&request("pasword rset", None, None)).expect("search");
    assert_eq!(response.corrected.as_deref(), Some("password reset"));
    assert!(!response.results.is_empty());
    assert_eq!(article_of(response.results[0].record.chunk_id), 1);
}

#[test]
fn fallback_not_invoked_when_hybrid_has_hits() {
    let engine = engine();
    engine.search(&request("reset password", Some(3), None)).expect("search");
    let limits = engine_lexical_limits(&engine);
    let settings = RetrievalSettings::default();
    assert_eq!(limits, vec![settings.n_candidates * settings.bm25_candidate_multiplier]);
    assert!(!limits.contains(&settings.bm25_fallback));
}

#[test]
fn empty_pools_fall_back_and_return_empty_list() {
    let calls = Arc::new(AtomicUsize::new(0));
    let reranker = CountingReranker { calls: calls.clone(), drop_one: false };
    let engine = engine_with(SpyLexical::default(), FixedVector::everything(), Box::new(reranker), RetrievalSettings::default());
    let response = engine.search(&request("reset password", None, Some(json!({"product": "Nonexistent"})))).expect("no error");
    assert!(response.results.is_empty());
    assert!(engine_lexical_limits(&engine).contains(&RetrievalSettings::default().bm25_fallback));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "reranker is skipped for an empty candidate list");
}

#[test]
fn fallback_recovers_allowed_chunks_outside_hybrid_pool() {
    let settings = RetrievalSettings { n_candidates: 1, bm25_candidate_multiplier: 1, ..RetrievalSettings::default() };
    let vector = FixedVector(vec![Candidate::new(0x100, 0.9)]);
    let engine = engine_with(SpyLexical::default(), vector, Box::new(OverlapReranker), settings);
    let response = engine.search(&request("account password", None, Some(json!({"product": " chat "})))).expect("search");
    let ids: Vec<_> = response.results.iter().map(|r| r.record.chunk_id).collect();
    assert_eq!(ids, vec![0x300]);
    assert_eq!(engine_lexical_limits(&engine), vec![1, 400]);
}

#[test]
fn filters_restrict_results() {
    let engine = engine();
    let response = engine.search(&request("reset password account", Some(10), Some(json!({"product": "CHAT"})))).expect("search");
    assert!(response.results.iter().all(|r| r.record.product == "Chat"));
    assert!(!response.results.is_empty());
}

#[test]
fn unrecognized_or_unsupported_filter_keys_mean_no_restriction() {
    let engine = engine();
    let response = engine.search(&request("reset password", None, Some(json!({"color": "blue", "status": "published", "internal": true})))).expect("search");
    assert!(!response.results.is_empty());
    assert_eq!(engine_filter_calls(&engine), 0);
}

#[test]
fn empty_query_yields_empty_results() {
    let engine = engine();
    let response = engine.search(&request("", None, None)).expect("search");
    assert!(response.results.is_empty());
    assert_eq!(response.corrected, None);
}

#[test]
fn k_defaults_and_truncates() {
    let engine = engine();
    let all = engine.search(&request("reset password account", Some(0), None)).expect("search");
    assert!(all.results.len() > 1 && all.results.len() <= 10);
    let one = engine.search(&request("reset password account", Some(1), None)).expect("search");
    assert_eq!(one.results.len(), 1);
}

#[test]
fn results_carry_metadata_and_bounded_snippets() {
    let settings = RetrievalSettings { snippet_len: 12, ..RetrievalSettings::default() };
    let engine = engine_with(SpyLexical::default(), FixedVector::everything(), Box::new(OverlapReranker), settings);
    let response = engine.search(&request("invoices month", None, None)).expect("search");
    assert!(response.results.iter().all(|r| r.record.snippet.chars().count() <= 12));
    let json = serde_json::to_value(&response).unwrap();
    let first = &json["results"][0];
    for key in ["chunk_id", "title", "url", "product", "category", "snippet", "score"] { assert!(first.get(key).is_some(), "missing {key}"); }
    assert!(first.get("status").is_none());
}

#[test]
fn assembler_restores_rank_order() {
    let lexical = SpyLexical::default();
    let rows = assemble(&lexical, &[0x300, 0x100, 0x200, 0x999], 160).expect("assemble");
    assert_eq!(rows.iter().map(|r| r.chunk_id).collect::<Vec<_>>(), vec![0x300, 0x100, 0x200]);
}

#[test]
fn provider_failure_becomes_structured_reply() {
    let engine = engine_with(SpyLexical::default(), FailingVector, Box::new(OverlapReranker), RetrievalSettings::default());
    let reply = handle_request(&engine, &request("reset password", None, None));
    assert!(!reply.success);
    assert!(reply.error.as_deref().unwrap_or_default().contains("ann backend unavailable"));
    // An empty query never reaches the vector index, so the same engine still answers.
    assert!(handle_request(&engine, &request("", None, None)).success);
}

#[test]
fn malformed_filter_value_is_reported() {
    let engine = engine();
    let reply = handle_request(&engine, &request("reset password", None, Some(json!({"product": 7}))));
    assert!(!reply.success);
    assert!(reply.error.unwrap().contains("product"));
}

#[test]
fn reranker_score_count_mismatch_is_an_error() {
    let reranker = CountingReranker { calls: Arc::new(AtomicUsize::new(0)), drop_one: true };
    let engine = engine_with(SpyLexical::default(), FixedVector::everything(), Box::new(reranker), RetrievalSettings::default());
    assert!(engine.search(&request("reset password", None, None)).is_err());
}

#[test]
fn tagged_message_round_trip() {
    let engine = engine();
    let message: HostMessage = serde_json::from_value(json!({"type": "query", "text": "reset password", "k": 2})).unwrap();
    let HostReply::Results(reply) = handle_message(&engine, &message);
    assert!(reply.success);
    assert!(reply.elapsed_ms.is_some());
    let json = serde_json::to_value(HostReply::Results(reply)).unwrap();
    assert_eq!(json["type"], "results");
    assert_eq!(json["success"], true);
    assert!(json["results"].as_array().unwrap().len() <= 2);
    assert!(json.get("corrected").is_some());
}

#[test]
fn every_non_blank_line_gets_exactly_one_reply() {
    let engine = engine();
    assert!(handle_line(&engine, "").is_none());
    assert!(handle_line(&engine, "   ").is_none());

    for line in [
        r#"{"type":"query","text":"x","k":-1}"#,
        r#"{"type":"query"}"#,
        r#"{"type":"query","text":42}"#,
        r#"{"type":"ping"}"#,
        "not json",
    ] {
        let Some(HostReply::Results(reply)) = handle_line(&engine, line) else { panic!("no reply for {line}") };
        assert!(!reply.success, "{line}");
        assert!(reply.error.as_deref().unwrap_or_default().starts_with("Invalid message"), "{line}");
        let json = serde_json::to_value(HostReply::Results(reply)).unwrap();
        assert_eq!(json["type"], "results");
        assert_eq!(json["success"], false);
    }

    let Some(HostReply::Results(reply)) = handle_line(&engine, r#"{"type":"query","text":"reset password","k":2}"#) else { panic!("no reply") };
    assert!(reply.success);
    assert_eq!(engine_lexical_limits(&engine).len(), 1, "malformed lines never reach the pipeline");
}

#[test]
fn concurrent_requests_share_one_engine() {
    let engine = engine();
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = &engine;
                s.spawn(move || {
                    let text = if i % 2 == 0 { "reset password" } else { "pasword rset" };
                    engine.search(&request(text, Some(3), None)).expect("search").results.len()
                })
            })
            .collect();
        for h in handles { assert!(h.join().unwrap() > 0); }
    });
    assert_eq!(engine_lexical_limits(&engine).len(), 8);
}

fn engine_lexical_limits<V: VectorIndex>(engine: &HybridSearchEngine<SpyLexical, V>) -> Vec<usize> { engine.lexical().limits() }

fn engine_filter_calls<V: VectorIndex>(engine: &HybridSearchEngine<SpyLexical, V>) -> usize { engine.lexical().filter_calls.load(Ordering::SeqCst) }
