//! Oracle Text `CONTAINS` expressions for the commercial-text backend

use super::MatchExpr;
use crate::suggest::Mode;
use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum similarity (0-100) passed to `fuzzy()`
pub const FUZZY_SIMILARITY: u32 = 70;

/// Maximum number of expansions passed to `fuzzy()`
pub const FUZZY_NUMRESULTS: u32 = 200;

/// Quotes, braces, brackets, boolean operators, wildcards, escapes and
/// punctuation that the CONTAINS grammar interprets.
static TEXT_OPERATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["'{}\[\]()|&!~*?:;,.<>+=%$_\\\-]"#).expect("text operator pattern is valid")
});

/// Reserved words the CONTAINS grammar reads as operators
const RESERVED_WORDS: &[&str] = &[
    "about", "accum", "and", "fuzzy", "minus", "near", "not", "or", "within",
];

/// A single term of a commercial-text expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextTerm {
    Exact(String),
    Prefix(String),
    Infix(String),
    Fuzzy { term: String, similarity: u32 },
}

/// Strip CONTAINS operators and reserved words, normalize whitespace
pub fn sanitize_text_query(raw: &str) -> String {
    let stripped = TEXT_OPERATORS.replace_all(raw, " ");
    stripped
        .split_whitespace()
        .filter(|word| !RESERVED_WORDS.contains(&word.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build a CONTAINS expression.
///
/// - PREFIX: `a AND b%` (only the last term is a wildcard)
/// - CONTAINS: `%a% AND %b%`
/// - FUZZY: `fuzzy(a,70,200,weight) AND fuzzy(b,70,200,weight)`
///
/// Input that sanitizes to nothing yields [`MatchExpr::Nothing`] rather than a
/// bare wildcard that would match every row.
pub fn build_text_expr(raw: &str, mode: Mode) -> MatchExpr {
    let cleaned = sanitize_text_query(raw);
    if cleaned.is_empty() {
        return MatchExpr::Nothing;
    }

    let terms: Vec<&str> = cleaned.split(' ').collect();
    let last = terms.len() - 1;
    let parts: Vec<String> = match mode {
        Mode::Prefix => terms
            .iter()
            .enumerate()
            .map(|(i, t)| {
                if i == last {
                    format!("{}%", t)
                } else {
                    t.to_string()
                }
            })
            .collect(),
        Mode::Contains => terms.iter().map(|t| format!("%{}%", t)).collect(),
        Mode::Fuzzy => terms
            .iter()
            .map(|t| format!("fuzzy({},{},{},weight)", t, FUZZY_SIMILARITY, FUZZY_NUMRESULTS))
            .collect(),
    };

    MatchExpr::Expr(parts.join(" AND "))
}

/// Parse an expression produced by [`build_text_expr`]
pub fn parse_text_expr(expr: &str) -> Option<Vec<TextTerm>> {
    expr.split(" AND ").map(parse_clause).collect()
}

fn parse_clause(clause: &str) -> Option<TextTerm> {
    if let Some(args) = clause
        .strip_prefix("fuzzy(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let mut fields = args.split(',');
        let term = fields.next().filter(|t| is_plain_term(t))?;
        let similarity = fields.next()?.trim().parse().ok()?;
        return Some(TextTerm::Fuzzy {
            term: term.to_string(),
            similarity,
        });
    }

    let term = match (clause.strip_prefix('%'), clause.strip_suffix('%')) {
        (Some(_), Some(_)) if clause.len() > 2 => {
            TextTerm::Infix(clause[1..clause.len() - 1].to_string())
        }
        (None, Some(body)) => TextTerm::Prefix(body.to_string()),
        (None, None) => TextTerm::Exact(clause.to_string()),
        _ => return None,
    };

    let plain = match &term {
        TextTerm::Exact(t) | TextTerm::Prefix(t) | TextTerm::Infix(t) => is_plain_term(t),
        TextTerm::Fuzzy { .. } => false,
    };
    plain.then_some(term)
}

fn is_plain_term(t: &str) -> bool {
    !t.is_empty() && !TEXT_OPERATORS.is_match(t) && !t.contains(char::is_whitespace)
}
