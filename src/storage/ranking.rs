//! Row ordering rules per backend, for stores that rank in-process

use super::NameRow;
use crate::cache::normalize_key_query;
use std::cmp::Ordering;

fn name_len(row: &NameRow) -> usize {
    row.name.chars().count()
}

/// Pattern match: exact match, then prefix match, then inner match; ties by
/// ascending length, descending popularity, name.
pub(crate) fn pattern_order(needle: &str) -> impl Fn(&NameRow, &NameRow) -> Ordering + '_ {
    move |a, b| {
        match_bucket(a, needle)
            .cmp(&match_bucket(b, needle))
            .then_with(|| name_len(a).cmp(&name_len(b)))
            .then_with(|| b.popularity.cmp(&a.popularity))
            .then_with(|| a.name.cmp(&b.name))
    }
}

/// `needle` must already be folded with [`normalize_key_query`]
fn match_bucket(row: &NameRow, needle: &str) -> u8 {
    let name = normalize_key_query(&row.name);
    if name == needle {
        0
    } else if name.starts_with(needle) {
        1
    } else {
        2
    }
}

/// Inverted index: ascending bm25 score (lower is better), descending
/// popularity, ascending length, name.
pub(crate) fn index_order(a: &NameRow, b: &NameRow) -> Ordering {
    score_of(a)
        .total_cmp(&score_of(b))
        .then_with(|| b.popularity.cmp(&a.popularity))
        .then_with(|| name_len(a).cmp(&name_len(b)))
        .then_with(|| a.name.cmp(&b.name))
}

/// Commercial text: descending score, ascending length, name. Popularity is
/// not consulted.
pub(crate) fn text_order(a: &NameRow, b: &NameRow) -> Ordering {
    score_of(b)
        .total_cmp(&score_of(a))
        .then_with(|| name_len(a).cmp(&name_len(b)))
        .then_with(|| a.name.cmp(&b.name))
}

/// Global popularity: descending popularity, ascending length, name
pub(crate) fn popularity_order(a: &NameRow, b: &NameRow) -> Ordering {
    b.popularity
        .cmp(&a.popularity)
        .then_with(|| name_len(a).cmp(&name_len(b)))
        .then_with(|| a.name.cmp(&b.name))
}

fn score_of(row: &NameRow) -> f64 {
    row.score.unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, popularity: i64, score: Option<f64>) -> NameRow {
        NameRow {
            id: 0,
            name: name.to_string(),
            popularity,
            score,
        }
    }

    fn names(rows: &[NameRow]) -> Vec<&str> {
        rows.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_pattern_order_exact_first() {
        let mut rows = vec![row("Micro", 0, None), row("Micr", 0, None), row("AMicr", 99, None)];
        rows.sort_by(pattern_order("micr"));
        assert_eq!(names(&rows), vec!["Micr", "Micro", "AMicr"]);
    }

    #[test]
    fn test_pattern_order_length_then_popularity() {
        let mut rows = vec![
            row("MicroX", 10, None),
            row("Microscope", 500, None),
            row("MicroY", 50, None),
        ];
        rows.sort_by(pattern_order("micr"));
        assert_eq!(names(&rows), vec!["MicroY", "MicroX", "Microscope"]);
    }

    #[test]
    fn test_index_order() {
        let mut rows = vec![
            row("Bob", 1, Some(-0.5)),
            row("Alice", 1, Some(-1.0)),
            row("Carol", 9, Some(-0.5)),
        ];
        rows.sort_by(index_order);
        assert_eq!(names(&rows), vec!["Alice", "Carol", "Bob"]);
    }

    #[test]
    fn test_text_order_ignores_popularity() {
        let mut rows = vec![
            row("Zed", 100, Some(80.0)),
            row("Amy", 0, Some(80.0)),
            row("Longer", 0, Some(90.0)),
        ];
        rows.sort_by(text_order);
        assert_eq!(names(&rows), vec!["Longer", "Amy", "Zed"]);
    }
}
