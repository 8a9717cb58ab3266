//! Query sanitization and backend-native match expressions
//!
//! Each backend speaks its own query grammar:
//! - pattern matching: `LIKE` patterns with `%`/`_` wildcards
//! - inverted index: FTS5 `MATCH` expressions (`"term"`, `"term"*`, `AND`)
//! - commercial text: Oracle Text `CONTAINS` expressions (`term%`, `%term%`, `fuzzy(...)`)
//!
//! User input is stripped of each grammar's operator characters before an
//! expression is rebuilt from plain terms. Every builder is total: any input
//! string yields a well-formed expression, or [`MatchExpr::Nothing`].

mod fts;
mod pattern;
mod text;

pub use fts::{build_index_match, parse_index_match, sanitize_index_query, IndexTerm};
pub use pattern::{build_pattern_query, escape_like, PatternQuery, LIKE_ESCAPE};
pub use text::{
    build_text_expr, parse_text_expr, sanitize_text_query, TextTerm, FUZZY_NUMRESULTS,
    FUZZY_SIMILARITY,
};

use std::fmt;

/// Reserved token for an expression that must not match anything
pub const MATCH_NOTHING: &str = "<match-nothing>";

/// A backend match expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchExpr {
    Expr(String),
    /// Sanitization left no usable terms
    Nothing,
}

impl MatchExpr {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Expr(expr) => expr,
            Self::Nothing => MATCH_NOTHING,
        }
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Self::Nothing)
    }
}

impl fmt::Display for MatchExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
