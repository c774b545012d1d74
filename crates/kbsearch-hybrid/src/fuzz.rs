//! Weighted fuzzy string similarity on a 0-100 scale.
//!
//! `weighted_ratio` blends the plain indel ratio with substring and
//! token-order-insensitive variants, scaling the looser variants down so an
//! exact match always wins.

use std::collections::BTreeSet;

const TOKEN_SCALE: f64 = 0.95;

/// `100 * 2 * lcs / (len_a + len_b)`. Two empty strings are identical.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    chars_ratio(&a, &b)
}

fn chars_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 { return 100.0; }
    200.0 * lcs_len(a, b) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb { prev[j] + 1 } else { prev[j + 1].max(cur[j]) };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Best `ratio` of the shorter string against any equally long window of
/// the longer one, windows clipped at either end included.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() { return if long.is_empty() { 100.0 } else { 0.0 }; }
    let m = short.len() as isize;
    let mut best = 0f64;
    for start in (1 - m)..long.len() as isize {
        let lo = start.max(0) as usize;
        let hi = ((start + m) as usize).min(long.len());
        best = best.max(chars_ratio(&short, &long[lo..hi]));
        if best >= 100.0 { break; }
    }
    best
}

fn tokens(s: &str) -> BTreeSet<&str> { s.split_whitespace().collect() }

fn sorted_join(s: &str) -> String {
    let mut words: Vec<&str> = s.split_whitespace().collect();
    words.sort_unstable();
    words.join(" ")
}

fn join(words: &BTreeSet<&str>) -> String { words.iter().copied().collect::<Vec<_>>().join(" ") }

pub fn token_sort_ratio(a: &str, b: &str) -> f64 { ratio(&sorted_join(a), &sorted_join(b)) }

/// Compares the shared words against each side's shared-plus-remaining words.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let (ta, tb) = (tokens(a), tokens(b));
    if ta.is_empty() || tb.is_empty() { return 0.0; }
    let common: BTreeSet<&str> = ta.intersection(&tb).copied().collect();
    let only_a: BTreeSet<&str> = ta.difference(&tb).copied().collect();
    let only_b: BTreeSet<&str> = tb.difference(&ta).copied().collect();
    if !common.is_empty() && (only_a.is_empty() || only_b.is_empty()) { return 100.0; }
    let sect = join(&common);
    let with = |rest: &BTreeSet<&str>| if sect.is_empty() { join(rest) } else { format!("{} {}", sect, join(rest)) };
    let (sect_a, sect_b) = (with(&only_a), with(&only_b));
    let mut best = ratio(&sect_a, &sect_b);
    if !sect.is_empty() { best = best.max(ratio(&sect, &sect_a)).max(ratio(&sect, &sect_b)); }
    best
}

pub fn partial_token_ratio(a: &str, b: &str) -> f64 {
    let (ta, tb) = (tokens(a), tokens(b));
    if ta.is_empty() || tb.is_empty() { return 0.0; }
    if ta.intersection(&tb).next().is_some() { return 100.0; }
    partial_ratio(&sorted_join(a), &sorted_join(b))
}

/// Similar lengths compare whole strings; once one side is at least 1.5x
/// longer, substring matches count at 0.9 (0.6 from 8x).
pub fn weighted_ratio(a: &str, b: &str) -> f64 {
    let (la, lb) = (a.chars().count(), b.chars().count());
    if la == 0 || lb == 0 { return 0.0; }
    let len_ratio = la.max(lb) as f64 / la.min(lb) as f64;
    let base = ratio(a, b);
    if len_ratio < 1.5 {
        return base.max(token_sort_ratio(a, b).max(token_set_ratio(a, b)) * TOKEN_SCALE);
    }
    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    base.max(partial_ratio(a, b) * partial_scale).max(partial_token_ratio(a, b) * TOKEN_SCALE * partial_scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool { (a - b).abs() < 1e-9 }

    #[test]
    fn ratio_counts_common_subsequence() {
        assert!(close(ratio("password", "password"), 100.0));
        assert!(close(ratio("pass", "password"), 200.0 * 4.0 / 12.0));
        assert!(close(ratio("abc", "xyz"), 0.0));
        assert!(close(ratio("", ""), 100.0));
    }

    #[test]
    fn partial_ratio_finds_best_window() {
        assert!(close(partial_ratio("pass", "password"), 100.0));
        assert!(close(partial_ratio("word", "password"), 100.0));
        // Best window is clipped at the start: "xsw" against "sw".
        assert!(close(partial_ratio("xsw", "swap"), 200.0 * 2.0 / 5.0));
    }

    #[test]
    fn prefix_scores_ninety() {
        assert!(close(weighted_ratio("pass", "password"), 90.0));
    }

    #[test]
    fn very_uneven_lengths_scale_down() {
        assert!(close(weighted_ratio("ab", "xxxxxxxxxxxxxxab"), 60.0));
    }

    #[test]
    fn token_order_is_ignored_at_similar_lengths() {
        assert!(close(weighted_ratio("reset password", "password reset"), 95.0));
        assert!(close(token_set_ratio("reset password now", "password reset"), 100.0));
        assert!(close(weighted_ratio("same", "same"), 100.0));
        assert_eq!(weighted_ratio("", "x"), 0.0);
    }
}
