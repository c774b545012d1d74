//! Domain types shared by the lexical, vector and hybrid crates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Globally unique chunk identifier.
///
/// The high-order bits identify the owning article, the low
/// [`ARTICLE_SHIFT`] bits the chunk's position inside it.
pub type ChunkId = u64;

/// Identifier of the source article a chunk belongs to.
pub type ArticleId = u64;

/// Number of low-order chunk id bits reserved for the chunk position.
pub const ARTICLE_SHIFT: u32 = 8;

/// Article key of a chunk. Deduplication happens at this granularity.
pub fn article_of(chunk_id: ChunkId) -> ArticleId {
    chunk_id >> ARTICLE_SHIFT
}

/// A `(chunk_id, score)` pair produced by one ranking stage.
///
/// Score semantics depend on the producing stage and are never compared
/// across stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: ChunkId,
    pub score: f32,
}

impl Candidate {
    pub fn new(id: ChunkId, score: f32) -> Self {
        Self { id, score }
    }
}

/// Display metadata of a chunk as returned by the lexical store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: ChunkId,
    pub title: String,
    pub url: String,
    pub product: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub snippet: String,
}

/// A chunk record with its final (reranker) relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    #[serde(flatten)]
    pub record: ChunkRecord,
    pub score: f32,
}

/// Optional columns the lexical store may or may not carry.
///
/// Resolved once when the index is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaCaps {
    pub has_status: bool,
    pub has_internal: bool,
}

/// Inbound search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub text: String,
    #[serde(default)]
    pub k: Option<usize>,
    /// Raw filter mapping; values are strings or booleans.
    #[serde(default)]
    pub filters: Option<BTreeMap<String, serde_json::Value>>,
}

/// Outbound search response, results ordered by descending score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Corrected query text, `None` when it equals the raw query text.
    pub corrected: Option<String>,
    pub results: Vec<ScoredChunk>,
}

/// Typed filter criteria. Every field is an optional equality predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub product: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub internal: Option<i64>,
}

impl FilterCriteria {
    /// Parse the raw request mapping. Unknown keys are ignored; a value of
    /// the wrong shape for a known key is an error.
    pub fn from_map(map: &BTreeMap<String, serde_json::Value>) -> crate::error::Result<Self> {
        let mut criteria = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "product" => criteria.product = Some(expect_text(key, value)?),
                "category" => criteria.category = Some(expect_text(key, value)?),
                "status" => criteria.status = Some(expect_text(key, value)?),
                "internal" => criteria.internal = Some(coerce_flag(key, value)?),
                _ => {}
            }
        }
        Ok(criteria)
    }

    pub fn is_empty(&self) -> bool {
        self.product.is_none() && self.category.is_none() && self.status.is_none() && self.internal.is_none()
    }
}

fn expect_text(key: &str, value: &serde_json::Value) -> crate::error::Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| crate::error::Error::InvalidFilter { key: key.to_string(), reason: format!("expected a string, got {value}") })
}

fn coerce_flag(key: &str, value: &serde_json::Value) -> crate::error::Result<i64> {
    use serde_json::Value;
    let invalid = || crate::error::Error::InvalidFilter { key: key.to_string(), reason: format!("expected a boolean or integer, got {value}") };
    match value {
        Value::Bool(b) => Ok(i64::from(*b)),
        // Whole or fractional numbers truncate toward zero.
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)).ok_or_else(invalid),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// One equality clause understood by the lexical store.
///
/// String values are already lower-cased and trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMatch {
    Product(String),
    Category(String),
    Status(String),
    /// Missing values compare as `0`.
    Internal(i64),
}

/// AND-combination of field clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPredicate {
    pub clauses: Vec<FieldMatch>,
}

impl FilterPredicate {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}
