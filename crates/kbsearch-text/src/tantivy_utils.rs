use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, INDEXED, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

use kbsearch_core::types::SchemaCaps;

pub const TEXT_TOKENIZER: &str = "text_with_stopwords";

pub fn build_schema(caps: SchemaCaps) -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_u64_field("chunk_id", INDEXED | STORED | FAST);
	schema_builder.add_text_field("title", STORED);
	schema_builder.add_text_field("url", STORED);
	schema_builder.add_text_field("product", STORED);
	schema_builder.add_text_field("product_key", STRING);
	schema_builder.add_text_field("category", STORED);
	schema_builder.add_text_field("category_key", STRING);
	if caps.has_status {
		schema_builder.add_text_field("status", STORED);
		schema_builder.add_text_field("status_key", STRING);
	}
	if caps.has_internal {
		schema_builder.add_i64_field("internal", STORED);
		schema_builder.add_i64_field("internal_key", INDEXED);
	}
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TEXT_TOKENIZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();
	schema_builder.add_text_field("text", text_options);
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	let stop_words = vec![
		"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
	];
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(TEXT_TOKENIZER, tokenizer);
}

/// Resolved field handles of a chunk index.
#[derive(Debug, Clone, Copy)]
pub struct ChunkFields {
	pub chunk_id: Field,
	pub title: Field,
	pub url: Field,
	pub product: Field,
	pub product_key: Field,
	pub category: Field,
	pub category_key: Field,
	/// `(stored, key)` pair, present only when the schema has the column.
	pub status: Option<(Field, Field)>,
	pub internal: Option<(Field, Field)>,
	pub text: Field,
}

impl ChunkFields {
	pub fn resolve(schema: &Schema) -> tantivy::Result<Self> {
		let optional = |stored: &str, key: &str| -> Option<(Field, Field)> {
			Some((schema.get_field(stored).ok()?, schema.get_field(key).ok()?))
		};
		Ok(Self {
			chunk_id: schema.get_field("chunk_id")?,
			title: schema.get_field("title")?,
			url: schema.get_field("url")?,
			product: schema.get_field("product")?,
			product_key: schema.get_field("product_key")?,
			category: schema.get_field("category")?,
			category_key: schema.get_field("category_key")?,
			status: optional("status", "status_key"),
			internal: optional("internal", "internal_key"),
			text: schema.get_field("text")?,
		})
	}

	pub fn caps(&self) -> SchemaCaps {
		SchemaCaps { has_status: self.status.is_some(), has_internal: self.internal.is_some() }
	}
}

/// Canonical form of a filterable string value.
pub fn filter_key(value: &str) -> String {
	value.trim().to_lowercase()
}
