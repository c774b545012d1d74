//! Symmetric-delete spelling dictionary.
//!
//! Every dictionary term contributes all strings reachable from its prefix by
//! up to `max_edit_distance` deletions. A lookup generates the deletions of
//! the input prefix and verifies each hit with the optimal string alignment
//! distance, so only a handful of full distance computations run per token.

use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub term: String,
    pub distance: usize,
    pub count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SymSpell {
    max_edit_distance: usize,
    prefix_length: usize,
    words: BTreeMap<String, u64>,
    deletes: HashMap<String, Vec<String>>,
}

impl SymSpell {
    pub fn new(max_edit_distance: usize, prefix_length: usize) -> Self {
        Self { max_edit_distance, prefix_length: prefix_length.max(1), words: BTreeMap::new(), deletes: HashMap::new() }
    }

    /// Build from `(term, frequency)` pairs. Repeated terms accumulate.
    pub fn from_counts<I, S>(max_edit_distance: usize, prefix_length: usize, counts: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut dict = Self::new(max_edit_distance, prefix_length);
        for (term, count) in counts { dict.add(term.into(), count); }
        dict
    }

    pub fn add(&mut self, term: String, count: u64) {
        if term.is_empty() { return; }
        if let Some(existing) = self.words.get_mut(&term) {
            *existing = existing.saturating_add(count);
            return;
        }
        for delete in self.edits(prefix(&term, self.prefix_length)) {
            self.deletes.entry(delete).or_default().push(term.clone());
        }
        self.words.insert(term, count);
    }

    pub fn len(&self) -> usize { self.words.len() }

    pub fn is_empty(&self) -> bool { self.words.is_empty() }

    pub fn contains(&self, term: &str) -> bool { self.words.contains_key(term) }

    /// Terms in lexicographic order.
    pub fn terms(&self) -> impl Iterator<Item = &str> { self.words.keys().map(String::as_str) }

    /// Single best suggestion: smallest distance, then highest frequency,
    /// then lexicographically smallest term.
    pub fn lookup_top(&self, input: &str) -> Option<Suggestion> {
        if let Some(&count) = self.words.get(input) {
            return Some(Suggestion { term: input.to_string(), distance: 0, count });
        }
        let input_len = input.chars().count();
        let mut checked: HashSet<&str> = HashSet::new();
        let mut best: Option<Suggestion> = None;
        for candidate in self.edits(prefix(input, self.prefix_length)) {
            let Some(terms) = self.deletes.get(&candidate) else { continue };
            for term in terms {
                if !checked.insert(term.as_str()) { continue; }
                if term.chars().count().abs_diff(input_len) > self.max_edit_distance { continue; }
                let distance = strsim::osa_distance(input, term);
                if distance > self.max_edit_distance { continue; }
                let count = self.words.get(term).copied().unwrap_or_default();
                let better = match &best {
                    None => true,
                    Some(b) => (distance, std::cmp::Reverse(count), term.as_str()) < (b.distance, std::cmp::Reverse(b.count), b.term.as_str()),
                };
                if better { best = Some(Suggestion { term: term.clone(), distance, count }); }
            }
        }
        best
    }

    /// `word` plus every string obtained by deleting up to
    /// `max_edit_distance` characters from it.
    fn edits(&self, word: &str) -> HashSet<String> {
        let mut out = HashSet::new();
        out.insert(word.to_string());
        let mut frontier = vec![word.to_string()];
        for _ in 0..self.max_edit_distance {
            let mut next = Vec::new();
            for w in &frontier {
                let chars: Vec<char> = w.chars().collect();
                if chars.len() <= 1 { continue; }
                for i in 0..chars.len() {
                    let delete: String = chars.iter().enumerate().filter(|(j, _)| *j != i).map(|(_, c)| *c).collect();
                    if out.insert(delete.clone()) { next.push(delete); }
                }
            }
            frontier = next;
        }
        out
    }
}

fn prefix(word: &str, len: usize) -> &str {
    match word.char_indices().nth(len) {
        Some((idx, _)) => &word[..idx],
        None => word,
    }
}
