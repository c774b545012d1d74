//! Query tokenization and spelling correction.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use kbsearch_core::config::SpellingSettings;
use kbsearch_core::traits::LexicalIndex;

use crate::fuzz::weighted_ratio;
use crate::spell::SymSpell;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z0-9']+").expect("valid token regex"));
static ISATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^([a-z]+)isation$").expect("valid suffix regex"));

/// Result of normalizing one raw query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    /// Tokens re-joined with single spaces, corrections applied.
    pub text: String,
    /// `Some(text)` only when it differs from the raw input.
    pub corrected: Option<String>,
}

/// Spell-corrects queries against the corpus vocabulary.
///
/// Immutable after construction and shared by all requests.
#[derive(Debug, Clone)]
pub struct QueryNormalizer {
    dictionary: SymSpell,
    min_token_len: usize,
    fuzzy_min_score: f64,
}

impl QueryNormalizer {
    pub fn new(dictionary: SymSpell, settings: &SpellingSettings) -> Self {
        Self { dictionary, min_token_len: settings.min_term_len, fuzzy_min_score: f64::from(settings.fuzzy_min_score) }
    }

    pub fn from_counts(counts: HashMap<String, u64>, settings: &SpellingSettings) -> Self {
        let dictionary = SymSpell::from_counts(settings.max_edit_distance, settings.prefix_length, counts);
        Self::new(dictionary, settings)
    }

    /// Build the vocabulary from the lexical index. An unreadable vocabulary
    /// leaves the corrector with an empty dictionary rather than failing.
    pub fn from_lexical<L: LexicalIndex + ?Sized>(lexical: &L, settings: &SpellingSettings) -> Self {
        let counts = match lexical.term_counts(settings.min_term_len, settings.vocab_max_docs) {
            Ok(counts) => counts,
            Err(e) => {
                warn!(error = %e, "vocabulary unavailable, spelling correction limited to suffix rules");
                HashMap::new()
            }
        };
        let normalizer = Self::from_counts(counts, settings);
        info!(terms = normalizer.dictionary.len(), "spelling dictionary built");
        normalizer
    }

    pub fn vocabulary_size(&self) -> usize { self.dictionary.len() }

    pub fn normalize(&self, raw: &str) -> NormalizedQuery {
        let text = TOKEN_RE.find_iter(raw).map(|m| self.correct_token(m.as_str())).collect::<Vec<_>>().join(" ");
        let corrected = (text != raw).then(|| text.clone());
        if corrected.is_some() { debug!(raw, corrected = %text, "query normalized"); }
        NormalizedQuery { text, corrected }
    }

    /// Correct a single token. Short, known and acronym tokens pass through.
    pub fn correct_token(&self, token: &str) -> String {
        if token.chars().count() < self.min_token_len || self.dictionary.contains(token) || is_acronym(token) {
            return token.to_string();
        }
        if let Some(caps) = ISATION_RE.captures(token) {
            return format!("{}ization", &caps[1]);
        }
        let lowered = token.to_lowercase();
        if let Some(suggestion) = self.dictionary.lookup_top(&lowered) {
            return suggestion.term;
        }
        self.fuzzy_match(&lowered).unwrap_or_else(|| token.to_string())
    }

    /// Closest vocabulary term on a 0-100 similarity scale, if above the
    /// acceptance threshold. Ties keep the lexicographically first term.
    fn fuzzy_match(&self, token: &str) -> Option<String> {
        let mut best: Option<(f64, &str)> = None;
        for term in self.dictionary.terms() {
            let score = weighted_ratio(token, term);
            if best.is_none_or(|(s, _)| score > s) { best = Some((score, term)); }
        }
        best.filter(|(score, _)| *score >= self.fuzzy_min_score).map(|(_, term)| term.to_string())
    }
}

/// At least one letter, and no lower-case letters.
fn is_acronym(token: &str) -> bool {
    token.chars().any(char::is_alphabetic) && !token.chars().any(char::is_lowercase)
}
