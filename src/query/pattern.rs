//! `LIKE` patterns for the pattern-match backend

use crate::suggest::Mode;

/// Escape character declared in every `LIKE ... ESCAPE` clause
pub const LIKE_ESCAPE: char = '\\';

/// Pattern-match query derived from the user's input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternQuery {
    /// The query text with wildcards left unescaped, for exact comparison
    pub needle: String,
    /// Filter pattern for the requested mode
    pub pattern: String,
    /// `needle%`, used to rank prefix matches ahead of inner matches
    pub prefix_pattern: String,
    pub mode: Mode,
}

/// Escape `LIKE` metacharacters so user input only matches literally
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Build the pattern for `query` under `mode`.
///
/// PREFIX matches `query%`; CONTAINS and FUZZY both match `%query%` since
/// plain pattern matching has no fuzzy operator.
pub fn build_pattern_query(query: &str, mode: Mode) -> PatternQuery {
    let needle = query.trim().to_string();
    let escaped = escape_like(&needle);
    let prefix_pattern = format!("{}%", escaped);
    let pattern = match mode {
        Mode::Prefix => prefix_pattern.clone(),
        Mode::Contains | Mode::Fuzzy => format!("%{}%", escaped),
    };

    PatternQuery {
        needle,
        pattern,
        prefix_pattern,
        mode,
    }
}
