use std::collections::HashSet;
use tracing::debug;

use kbsearch_core::traits::LexicalIndex;
use kbsearch_core::types::{ChunkId, FieldMatch, FilterCriteria, FilterPredicate, SchemaCaps};
use kbsearch_core::{Error, Result};

/// Translate criteria into store clauses, dropping fields the schema lacks.
pub fn build_predicate(criteria: &FilterCriteria, caps: SchemaCaps) -> FilterPredicate {
    let key = |v: &str| v.trim().to_lowercase();
    let mut clauses = Vec::new();
    if let Some(v) = &criteria.product { clauses.push(FieldMatch::Product(key(v))); }
    if let Some(v) = &criteria.category { clauses.push(FieldMatch::Category(key(v))); }
    if let Some(v) = criteria.status.as_deref().filter(|_| caps.has_status) { clauses.push(FieldMatch::Status(key(v))); }
    if let Some(v) = criteria.internal.filter(|_| caps.has_internal) { clauses.push(FieldMatch::Internal(v)); }
    FilterPredicate { clauses }
}

/// Allow-set for `criteria`, or `None` when nothing restricts the search.
///
/// `Some(empty)` is a real answer: no chunk satisfies the filters.
pub fn resolve_filters<L: LexicalIndex + ?Sized>(criteria: &FilterCriteria, caps: SchemaCaps, lexical: &L) -> Result<Option<HashSet<ChunkId>>> {
    let predicate = build_predicate(criteria, caps);
    if predicate.is_empty() { return Ok(None); }
    let allowed = lexical.filtered_ids(&predicate).map_err(Error::provider("filter lookup"))?;
    debug!(clauses = predicate.clauses.len(), allowed = allowed.len(), "filters resolved");
    Ok(Some(allowed))
}
