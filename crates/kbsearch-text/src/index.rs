use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::query::{AllQuery, BooleanQuery, Query, QueryParser, TermQuery, TermSetQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{DocAddress, Index, IndexReader, IndexWriter, Searcher, TantivyDocument, Term};
use tracing::{debug, info};

use kbsearch_core::traits::LexicalIndex;
use kbsearch_core::types::{Candidate, ChunkId, ChunkRecord, FieldMatch, FilterPredicate, SchemaCaps};

use crate::tantivy_utils::{build_schema, filter_key, register_tokenizer, ChunkFields};

static TOKEN_RE: LazyLock<regex::Regex> = LazyLock::new(|| regex::Regex::new(r"[A-Za-z0-9']+").expect("valid token regex"));

/// Per-segment `chunk_id` fast-field columns, indexed by segment ordinal.
fn chunk_id_columns(searcher: &Searcher) -> Result<Vec<tantivy::columnar::Column<u64>>> {
	let mut columns = Vec::with_capacity(searcher.segment_readers().len());
	for segment_reader in searcher.segment_readers() { columns.push(segment_reader.fast_fields().u64("chunk_id")?); }
	Ok(columns)
}

/// One chunk as written into the index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDocument {
	pub chunk_id: ChunkId,
	pub title: String,
	pub url: String,
	pub product: String,
	pub category: String,
	#[serde(default)]
	pub internal: Option<bool>,
	#[serde(default)]
	pub status: Option<String>,
	pub text: String,
}

/// Builds a fresh chunk index. Corpus tooling and test fixtures use this;
/// the serving path only reads.
pub struct ChunkIndexWriter {
	writer: IndexWriter,
	fields: ChunkFields,
}

impl ChunkIndexWriter {
	pub fn create(index_dir: PathBuf, caps: SchemaCaps) -> Result<Self> {
		let schema = build_schema(caps);
		if index_dir.exists() { std::fs::remove_dir_all(&index_dir)?; }
		std::fs::create_dir_all(&index_dir)?;
		let index = Index::create_in_dir(&index_dir, schema.clone())?;
		register_tokenizer(&index);
		let fields = ChunkFields::resolve(&schema)?;
		let writer = index.writer(50_000_000)?;
		Ok(Self { writer, fields })
	}

	pub fn add(&mut self, chunk: &ChunkDocument) -> Result<()> {
		let f = &self.fields;
		let mut doc = TantivyDocument::default();
		doc.add_u64(f.chunk_id, chunk.chunk_id);
		doc.add_text(f.title, &chunk.title);
		doc.add_text(f.url, &chunk.url);
		doc.add_text(f.product, &chunk.product);
		doc.add_text(f.product_key, filter_key(&chunk.product));
		doc.add_text(f.category, &chunk.category);
		doc.add_text(f.category_key, filter_key(&chunk.category));
		if let (Some((stored, key)), Some(status)) = (f.status, chunk.status.as_deref()) {
			doc.add_text(stored, status);
			doc.add_text(key, filter_key(status));
		}
		if let Some((stored, key)) = f.internal {
			if let Some(internal) = chunk.internal {
				doc.add_i64(stored, i64::from(internal));
			}
			doc.add_i64(key, chunk.internal.map(i64::from).unwrap_or(0));
		}
		doc.add_text(f.text, &chunk.text);
		self.writer.add_document(doc)?;
		Ok(())
	}

	pub fn commit(mut self) -> Result<()> {
		self.writer.commit()?;
		self.writer.wait_merging_threads()?;
		Ok(())
	}
}

/// Read-only chunk index used at query time.
///
/// Every call leases its own searcher from the reader's pool, so concurrent
/// requests never share a cursor.
pub struct TantivyChunkIndex {
	index: Index,
	reader: IndexReader,
	fields: ChunkFields,
}

impl TantivyChunkIndex {
	pub fn open(index_dir: &Path) -> Result<Self> {
		let index = Index::open_in_dir(index_dir).map_err(|e| anyhow!("Failed to open lexical index at {}: {}", index_dir.display(), e))?;
		register_tokenizer(&index);
		let fields = ChunkFields::resolve(&index.schema())?;
		let reader = index.reader()?;
		let caps = fields.caps();
		info!(path = %index_dir.display(), docs = reader.searcher().num_docs(), has_status = caps.has_status, has_internal = caps.has_internal, "lexical index opened");
		Ok(Self { index, reader, fields })
	}

	fn clause_query(&self, clause: &FieldMatch) -> Result<Box<dyn Query>> {
		let f = &self.fields;
		let term = match clause {
			FieldMatch::Product(v) => Term::from_field_text(f.product_key, v),
			FieldMatch::Category(v) => Term::from_field_text(f.category_key, v),
			FieldMatch::Status(v) => {
				let (_, key) = f.status.ok_or_else(|| anyhow!("index has no status column"))?;
				Term::from_field_text(key, v)
			}
			FieldMatch::Internal(v) => {
				let (_, key) = f.internal.ok_or_else(|| anyhow!("index has no internal column"))?;
				Term::from_field_i64(key, *v)
			}
		};
		Ok(Box::new(TermQuery::new(term, IndexRecordOption::Basic)))
	}

	fn chunk_ids_of(&self, searcher: &Searcher, addrs: HashSet<DocAddress>) -> Result<HashSet<ChunkId>> {
		let columns = chunk_id_columns(searcher)?;
		Ok(addrs.into_iter().filter_map(|addr| columns[addr.segment_ord as usize].first(addr.doc_id)).collect())
	}

	fn record_from(&self, doc: &TantivyDocument, snippet_len: usize) -> Option<ChunkRecord> {
		let f = &self.fields;
		let text = |field| doc.get_first(field).and_then(|v| v.as_str()).unwrap_or("").to_string();
		let chunk_id = doc.get_first(f.chunk_id).and_then(|v| v.as_u64())?;
		let body = doc.get_first(f.text).and_then(|v| v.as_str()).unwrap_or("");
		Some(ChunkRecord {
			chunk_id,
			title: text(f.title),
			url: text(f.url),
			product: text(f.product),
			category: text(f.category),
			internal: f.internal.and_then(|(stored, _)| doc.get_first(stored).and_then(|v| v.as_i64())).map(|v| v != 0),
			status: f.status.and_then(|(stored, _)| doc.get_first(stored).and_then(|v| v.as_str()).map(str::to_string)),
			snippet: body.chars().take(snippet_len).collect(),
		})
	}
}

impl LexicalIndex for TantivyChunkIndex {
	fn schema_caps(&self) -> SchemaCaps { self.fields.caps() }

	fn search(&self, text: &str, limit: usize) -> Result<Vec<Candidate>> {
		if text.trim().is_empty() || limit == 0 { return Ok(vec![]); }
		let searcher = self.reader.searcher();
		let mut qp = QueryParser::for_index(&self.index, vec![self.fields.text]);
		qp.set_conjunction_by_default();
		let (query, errors) = qp.parse_query_lenient(text);
		if !errors.is_empty() { debug!(?errors, "lenient query parse dropped parts of the query"); }
		let top_docs = searcher.search(query.as_ref(), &TopDocs::with_limit(limit))?;
		let columns = chunk_id_columns(&searcher)?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			if let Some(id) = columns[addr.segment_ord as usize].first(addr.doc_id) { hits.push(Candidate::new(id, score)); }
		}
		Ok(hits)
	}

	fn lookup_metadata(&self, ids: &[ChunkId], snippet_len: usize) -> Result<Vec<ChunkRecord>> {
		if ids.is_empty() { return Ok(vec![]); }
		let searcher = self.reader.searcher();
		let terms = ids.iter().map(|&id| Term::from_field_u64(self.fields.chunk_id, id));
		let query = TermSetQuery::new(terms);
		let addrs = searcher.search(&query, &DocSetCollector)?;
		let mut rows = Vec::with_capacity(addrs.len());
		for addr in addrs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			if let Some(record) = self.record_from(&doc, snippet_len) { rows.push(record); }
		}
		Ok(rows)
	}

	fn filtered_ids(&self, predicate: &FilterPredicate) -> Result<HashSet<ChunkId>> {
		let searcher = self.reader.searcher();
		let mut clauses = predicate.clauses.iter().map(|c| self.clause_query(c)).collect::<Result<Vec<_>>>()?;
		let query: Box<dyn Query> = match clauses.len() {
			0 => Box::new(AllQuery),
			1 => clauses.remove(0),
			_ => Box::new(BooleanQuery::intersection(clauses)),
		};
		let addrs = searcher.search(query.as_ref(), &DocSetCollector)?;
		self.chunk_ids_of(&searcher, addrs)
	}

	fn term_counts(&self, min_len: usize, max_docs: usize) -> Result<HashMap<String, u64>> {
		let searcher = self.reader.searcher();
		let mut counts: HashMap<String, u64> = HashMap::new();

		// Index vocabulary: one entry per distinct term.
		let mut dictionary_terms: HashSet<String> = HashSet::new();
		for segment_reader in searcher.segment_readers() {
			let inverted = segment_reader.inverted_index(self.fields.text)?;
			let mut stream = inverted.terms().stream()?;
			while stream.advance() {
				if let Ok(term) = std::str::from_utf8(stream.key()) {
					if term.chars().count() >= min_len { dictionary_terms.insert(term.to_lowercase()); }
				}
			}
		}
		for term in dictionary_terms { *counts.entry(term).or_default() += 1; }

		// Raw tokens keep the words the analyzer drops.
		let mut seen_docs = 0usize;
		'segments: for segment_reader in searcher.segment_readers() {
			let store = segment_reader.get_store_reader(64)?;
			for doc in store.iter::<TantivyDocument>(segment_reader.alive_bitset()) {
				if seen_docs >= max_docs { break 'segments; }
				seen_docs += 1;
				let doc = doc?;
				let Some(body) = doc.get_first(self.fields.text).and_then(|v| v.as_str()) else { continue };
				let lowered = body.to_lowercase();
				for token in TOKEN_RE.find_iter(&lowered) {
					let token = token.as_str();
					if token.chars().count() >= min_len { *counts.entry(token.to_string()).or_default() += 1; }
				}
			}
		}
		debug!(terms = counts.len(), docs = seen_docs, "collected vocabulary");
		Ok(counts)
	}
}
