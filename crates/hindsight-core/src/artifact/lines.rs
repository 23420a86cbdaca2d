//! Line-level comparison helpers shared by validation and supersession.
//!
//! A line is non-trivial when, after trimming, it has more than
//! `min_line_chars` characters. Braces, blank lines and short keywords never
//! count as evidence on their own.

use std::collections::HashSet;

/// Distinct non-trivial trimmed lines of `text`, in first-seen order.
pub fn significant_lines(text: &str, min_line_chars: usize) -> Vec<&str> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > min_line_chars)
        .filter(|line| seen.insert(*line))
        .collect()
}

/// Fraction of the snippet's non-trivial lines still present in `content`.
///
/// Returns `None` when the snippet has no non-trivial lines.
pub fn line_persistence_ratio(snippet: &str, content: &str, min_line_chars: usize) -> Option<f64> {
    let wanted = significant_lines(snippet, min_line_chars);
    if wanted.is_empty() {
        return None;
    }
    let present: HashSet<&str> = content.lines().map(str::trim).collect();
    let kept = wanted.iter().filter(|line| present.contains(*line)).count();
    Some(kept as f64 / wanted.len() as f64)
}

/// Number of distinct non-trivial lines the two texts have in common.
pub fn shared_line_count(a: &str, b: &str, min_line_chars: usize) -> usize {
    let left: HashSet<&str> = significant_lines(a, min_line_chars).into_iter().collect();
    significant_lines(b, min_line_chars)
        .into_iter()
        .filter(|line| left.contains(line))
        .count()
}
