use std::path::Path;

use kbsearch_core::traits::LexicalIndex;
use kbsearch_core::types::{FieldMatch, FilterPredicate, SchemaCaps};
use kbsearch_text::{ChunkDocument, ChunkIndexWriter, TantivyChunkIndex};
use tempfile::TempDir;

fn chunk(chunk_id: u64, product: &str, category: &str, internal: Option<bool>, status: Option<&str>, text: &str) -> ChunkDocument {
    ChunkDocument {
        chunk_id,
        title: format!("Article {}", chunk_id >> 8),
        url: format!("https://kb.example.com/{}", chunk_id >> 8),
        product: product.to_string(),
        category: category.to_string(),
        internal,
        status: status.map(str::to_string),
        text: text.to_string(),
    }
}

fn build(dir: &Path, caps: SchemaCaps) -> TantivyChunkIndex {
    let mut writer = ChunkIndexWriter::create(dir.to_path_buf(), caps).expect("writer");
    for c in [
        chunk(0x100, "Mail", "Accounts", Some(false), Some("published"), "To reset your password open the account settings page."),
        chunk(0x101, "Mail", "Accounts", Some(false), Some("published"), "Password reset links sent from support expire after one hour."),
        chunk(0x200, "Chat", "Billing", Some(true), Some("draft"), "Invoices are generated on the first day of each month."),
        chunk(0x300, " chat ", "Accounts", None, None, "Two factor authentication protects your account password."),
    ] {
        writer.add(&c).expect("add");
    }
    writer.commit().expect("commit");
    TantivyChunkIndex::open(dir).expect("open")
}

#[test]
fn bm25_match_ranks_and_limits() {
    let tmp = TempDir::new().unwrap();
    let index = build(tmp.path(), SchemaCaps { has_status: true, has_internal: true });

    let hits = index.search("password reset", 10).expect("search");
    let ids: Vec<u64> = hits.iter().map(|h| h.id).collect();
    assert!(ids.contains(&0x100) && ids.contains(&0x101), "{ids:?}");
    assert!(!ids.contains(&0x200));
    for pair in hits.windows(2) { assert!(pair[0].score >= pair[1].score); }

    assert_eq!(index.search("password", 1).unwrap().len(), 1);
    assert!(index.search("", 10).unwrap().is_empty());
    assert!(index.search("password", 0).unwrap().is_empty());
}

#[test]
fn metadata_lookup_returns_requested_rows() {
    let tmp = TempDir::new().unwrap();
    let index = build(tmp.path(), SchemaCaps { has_status: true, has_internal: true });

    let mut rows = index.lookup_metadata(&[0x200, 0x100, 0x999], 12).expect("lookup");
    rows.sort_by_key(|r| r.chunk_id);
    assert_eq!(rows.len(), 2, "unknown ids are skipped");
    assert_eq!(rows[0].chunk_id, 0x100);
    assert_eq!(rows[0].snippet, "To reset you");
    assert_eq!(rows[0].internal, Some(false));
    assert_eq!(rows[1].status.as_deref(), Some("draft"));
    assert_eq!(rows[1].internal, Some(true));
}

#[test]
fn filters_are_case_insensitive_and_anded() {
    let tmp = TempDir::new().unwrap();
    let index = build(tmp.path(), SchemaCaps { has_status: true, has_internal: true });

    let chat = FilterPredicate { clauses: vec![FieldMatch::Product("chat".into())] };
    let ids = index.filtered_ids(&chat).unwrap();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&0x200) && ids.contains(&0x300));

    let chat_accounts = FilterPredicate { clauses: vec![FieldMatch::Product("chat".into()), FieldMatch::Category("accounts".into())] };
    assert_eq!(index.filtered_ids(&chat_accounts).unwrap().into_iter().collect::<Vec<_>>(), vec![0x300]);

    // a missing internal flag counts as 0
    let public = FilterPredicate { clauses: vec![FieldMatch::Internal(0)] };
    assert_eq!(index.filtered_ids(&public).unwrap().len(), 3);

    let none = FilterPredicate { clauses: vec![FieldMatch::Status("archived".into())] };
    assert!(index.filtered_ids(&none).unwrap().is_empty());
}

#[test]
fn schema_caps_follow_the_index() {
    let tmp = TempDir::new().unwrap();
    let index = build(tmp.path(), SchemaCaps::default());
    assert_eq!(index.schema_caps(), SchemaCaps::default());
    let rows = index.lookup_metadata(&[0x100], 160).unwrap();
    assert_eq!(rows[0].status, None);
    assert_eq!(rows[0].internal, None);
    assert!(index.filtered_ids(&FilterPredicate { clauses: vec![FieldMatch::Status("draft".into())] }).is_err());
}

#[test]
fn term_counts_merge_dictionary_and_raw_tokens() {
    let tmp = TempDir::new().unwrap();
    let index = build(tmp.path(), SchemaCaps::default());
    let counts = index.term_counts(4, 100).expect("vocab");
    // one dictionary entry plus three raw occurrences
    assert_eq!(counts.get("password"), Some(&4));
    // stop words never reach the term dictionary but still appear raw
    assert_eq!(counts.get("from"), Some(&1));
    assert_eq!(counts.get("your"), Some(&3));
    assert!(!counts.contains_key("two"), "short tokens are skipped");
}
