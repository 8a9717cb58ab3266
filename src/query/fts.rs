//! FTS5 `MATCH` expressions for the inverted-index backend

use super::{collapse_whitespace, MatchExpr};
use crate::suggest::Mode;
use once_cell::sync::Lazy;
use regex::Regex;

/// Characters with meaning in the FTS5 query grammar: phrase quotes, grouping,
/// column filters, boosts, negation, NEAR/prefix markers.
static FTS_OPERATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["'()<>~^:+*{}\[\],\-]"#).expect("FTS operator pattern is valid")
});

/// A single term of an index match expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTerm {
    pub text: String,
    pub prefix: bool,
}

/// Strip FTS5 operator characters and normalize whitespace
pub fn sanitize_index_query(raw: &str) -> String {
    collapse_whitespace(&FTS_OPERATORS.replace_all(raw, " "))
}

/// Build an FTS5 match expression.
///
/// Every term but the last must match exactly; the last is a prefix term.
/// FTS5 has no infix or fuzzy operator, so CONTAINS and FUZZY produce the same
/// expression as PREFIX. Terms are quoted so that bare words such as `NOT` or
/// `NEAR` are never read as operators.
pub fn build_index_match(raw: &str, _mode: Mode) -> MatchExpr {
    let cleaned = sanitize_index_query(raw);
    if cleaned.is_empty() {
        return MatchExpr::Nothing;
    }

    let terms: Vec<&str> = cleaned.split(' ').collect();
    let last = terms.len() - 1;
    let clauses: Vec<String> = terms
        .iter()
        .enumerate()
        .map(|(i, term)| {
            if i == last {
                format!("\"{}\"*", term)
            } else {
                format!("\"{}\"", term)
            }
        })
        .collect();

    MatchExpr::Expr(clauses.join(" AND "))
}

/// Parse an expression produced by [`build_index_match`].
///
/// Returns `None` for anything outside that grammar, including the reserved
/// match-nothing token.
pub fn parse_index_match(expr: &str) -> Option<Vec<IndexTerm>> {
    let mut terms = Vec::new();
    for clause in expr.split(" AND ") {
        let (body, prefix) = match clause.strip_suffix('*') {
            Some(body) => (body, true),
            None => (clause, false),
        };
        let text = body.strip_prefix('"')?.strip_suffix('"')?;
        if text.is_empty() || text.contains('"') {
            return None;
        }
        terms.push(IndexTerm {
            text: text.to_string(),
            prefix,
        });
    }
    Some(terms)
}
