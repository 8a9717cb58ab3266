//! Suggestion data model: results, match modes and backend identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single type-ahead suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    value: String,
    score: Option<f64>,
}

impl Suggestion {
    /// Create an unranked suggestion
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            score: None,
        }
    }

    /// Create a suggestion carrying a backend-native relevance score
    pub fn scored(value: impl Into<String>, score: Option<f64>) -> Self {
        Self {
            value: value.into(),
            score,
        }
    }

    /// Display string
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Backend-native relevance, present only for ranked backends
    pub fn score(&self) -> Option<f64> {
        self.score
    }
}

/// Matching semantics requested by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    #[default]
    Prefix,
    Contains,
    Fuzzy,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prefix => "PREFIX",
            Self::Contains => "CONTAINS",
            Self::Fuzzy => "FUZZY",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PREFIX" => Ok(Self::Prefix),
            "CONTAINS" => Ok(Self::Contains),
            "FUZZY" => Ok(Self::Fuzzy),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// Backend selected once at startup to answer every suggestion query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Engine {
    /// Case-insensitive LIKE pattern matching
    #[default]
    #[serde(rename = "pattern-match", alias = "sqlite-like", alias = "like")]
    PatternMatch,
    /// Inverted index with bm25 relevance (SQLite FTS5)
    #[serde(rename = "inverted-index", alias = "sqlite-fts", alias = "fts5")]
    InvertedIndex,
    /// Commercial text-search engine (Oracle Text CONTAINS grammar)
    #[serde(rename = "commercial-text", alias = "oracle-text")]
    CommercialText,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PatternMatch => "pattern-match",
            Self::InvertedIndex => "inverted-index",
            Self::CommercialText => "commercial-text",
        }
    }

    /// All selectable engines
    pub fn all() -> [Engine; 3] {
        [Self::PatternMatch, Self::InvertedIndex, Self::CommercialText]
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pattern-match" | "sqlite-like" | "like" => Ok(Self::PatternMatch),
            "inverted-index" | "sqlite-fts" | "fts5" => Ok(Self::InvertedIndex),
            "commercial-text" | "oracle-text" => Ok(Self::CommercialText),
            other => Err(format!("unknown engine '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("prefix".parse::<Mode>().unwrap(), Mode::Prefix);
        assert_eq!("Contains".parse::<Mode>().unwrap(), Mode::Contains);
        assert_eq!(" FUZZY ".parse::<Mode>().unwrap(), Mode::Fuzzy);
        assert!("regex".parse::<Mode>().is_err());
        assert_eq!(Mode::default(), Mode::Prefix);
    }

    #[test]
    fn test_engine_aliases() {
        assert_eq!("sqlite-like".parse::<Engine>().unwrap(), Engine::PatternMatch);
        assert_eq!("sqlite-fts".parse::<Engine>().unwrap(), Engine::InvertedIndex);
        assert_eq!("oracle-text".parse::<Engine>().unwrap(), Engine::CommercialText);
        assert!("elastic".parse::<Engine>().is_err());

        let engine: Engine = serde_yaml::from_str("sqlite-fts").unwrap();
        assert_eq!(engine, Engine::InvertedIndex);
        assert_eq!(serde_json::to_string(&engine).unwrap(), "\"inverted-index\"");
    }

    #[test]
    fn test_suggestion_serializes_null_score() {
        let json = serde_json::to_value(Suggestion::new("Microsoft")).unwrap();
        assert_eq!(json, serde_json::json!({"value": "Microsoft", "score": null}));

        let scored = Suggestion::scored("Microtek", Some(-1.5));
        assert_eq!(scored.value(), "Microtek");
        assert_eq!(scored.score(), Some(-1.5));
    }
}
