//! In-memory [`SuggestStore`] for tests and database-less deployments.
//!
//! Evaluates all three expression grammars by brute force over the corpus.
//! Names are split into lowercase alphanumeric words; index and text terms
//! match against those words the way the real engines' tokenizers do.

use super::ranking::{index_order, pattern_order, popularity_order, text_order};
use super::{BackendQuery, NameRow, SelectionTarget, SuggestStore};
use crate::cache::normalize_key_query;
use crate::error::StorageError;
use crate::query::{parse_index_match, parse_text_expr, IndexTerm, PatternQuery, TextTerm};
use crate::suggest::Mode;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Person {
    id: i64,
    name: String,
    popularity: i64,
}

impl Person {
    fn row(&self, score: Option<f64>) -> NameRow {
        NameRow {
            id: self.id,
            name: self.name.clone(),
            popularity: self.popularity,
            score,
        }
    }
}

/// In-memory corpus store
pub struct MemoryStore {
    people: RwLock<Vec<Person>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            people: RwLock::new(Vec::new()),
        }
    }

    /// Build a store from `(name, popularity)` pairs, assigning ids from 1
    pub fn with_people<I, S>(people: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let people = people
            .into_iter()
            .enumerate()
            .map(|(i, (name, popularity))| Person {
                id: i as i64 + 1,
                name: name.into(),
                popularity,
            })
            .collect();
        Self {
            people: RwLock::new(people),
        }
    }

    /// Current popularity of a record
    pub fn popularity(&self, id: i64) -> Option<i64> {
        self.people
            .read()
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.popularity)
    }

    fn pattern_match(&self, query: &PatternQuery) -> Vec<NameRow> {
        let needle = normalize_key_query(&query.needle);
        let people = self.people.read();
        let mut rows: Vec<NameRow> = people
            .iter()
            .filter(|p| {
                let name = normalize_key_query(&p.name);
                match query.mode {
                    Mode::Prefix => name.starts_with(&needle),
                    Mode::Contains | Mode::Fuzzy => name.contains(&needle),
                }
            })
            .map(|p| p.row(None))
            .collect();
        rows.sort_by(pattern_order(&needle));
        rows
    }

    fn index_match(&self, expr: &str) -> Result<Vec<NameRow>, StorageError> {
        let terms = parse_index_match(expr)
            .ok_or_else(|| StorageError::Syntax(format!("malformed match expression: {}", expr)))?;
        // a quoted term with no indexable characters matches no row
        let Some(terms) = expand_index_terms(&terms) else {
            return Ok(Vec::new());
        };

        let people = self.people.read();
        let mut rows: Vec<NameRow> = people
            .iter()
            .filter_map(|p| {
                let words = tokenize(&p.name);
                let all_match = terms.iter().all(|term| {
                    words.iter().any(|w| {
                        if term.prefix {
                            w.starts_with(&term.text)
                        } else {
                            *w == term.text
                        }
                    })
                });
                // shorter names score better, like bm25's length normalization
                all_match.then(|| p.row(Some(-(terms.len() as f64) / words.len() as f64)))
            })
            .collect();
        rows.sort_by(index_order);
        Ok(rows)
    }

    fn text_match(&self, expr: &str) -> Result<Vec<NameRow>, StorageError> {
        let terms = parse_text_expr(expr)
            .ok_or_else(|| StorageError::Syntax(format!("malformed text expression: {}", expr)))?;

        let people = self.people.read();
        let mut rows: Vec<NameRow> = people
            .iter()
            .filter_map(|p| {
                let words = tokenize(&p.name);
                // AND takes the weakest operand's score
                let mut score = f64::MAX;
                for term in &terms {
                    score = score.min(text_term_score(term, &words)?);
                }
                Some(p.row(Some(score)))
            })
            .collect();
        rows.sort_by(text_order);
        Ok(rows)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Split quoted terms into words; the prefix flag stays on the last word.
/// `None` when some term has no words at all.
fn expand_index_terms(terms: &[IndexTerm]) -> Option<Vec<IndexTerm>> {
    let mut out = Vec::new();
    for term in terms {
        let words = tokenize(&term.text);
        if words.is_empty() {
            return None;
        }
        let last = words.len().saturating_sub(1);
        out.extend(words.into_iter().enumerate().map(|(i, text)| IndexTerm {
            text,
            prefix: term.prefix && i == last,
        }));
    }
    Some(out)
}

/// Score of one text term against a name's words, `None` when it does not match
fn text_term_score(term: &TextTerm, words: &[String]) -> Option<f64> {
    match term {
        TextTerm::Exact(t) => {
            let t = t.to_lowercase();
            words.iter().any(|w| *w == t).then_some(100.0)
        }
        TextTerm::Prefix(t) => {
            let t = t.to_lowercase();
            words.iter().any(|w| w.starts_with(&t)).then_some(90.0)
        }
        TextTerm::Infix(t) => {
            let t = t.to_lowercase();
            words.iter().any(|w| w.contains(&t)).then_some(80.0)
        }
        TextTerm::Fuzzy { term, similarity } => {
            let t = term.to_lowercase();
            let best = words
                .iter()
                .map(|w| strsim::normalized_levenshtein(w, &t) * 100.0)
                .fold(0.0_f64, f64::max);
            (best >= f64::from(*similarity)).then_some(best.round())
        }
    }
}

#[async_trait]
impl SuggestStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn query(&self, query: &BackendQuery, limit: usize) -> Result<Vec<NameRow>, StorageError> {
        let mut rows = match query {
            BackendQuery::Pattern(q) => self.pattern_match(q),
            BackendQuery::Index(expr) => self.index_match(expr)?,
            BackendQuery::Text(expr) => self.text_match(expr)?,
        };
        rows.truncate(limit);
        Ok(rows)
    }

    async fn top_popular(&self, limit: usize) -> Result<Vec<NameRow>, StorageError> {
        let mut rows: Vec<NameRow> = self.people.read().iter().map(|p| p.row(None)).collect();
        rows.sort_by(popularity_order);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn increment_popularity(&self, target: &SelectionTarget) -> Result<u64, StorageError> {
        let mut people = self.people.write();
        let mut updated = 0;
        for person in people.iter_mut() {
            let hit = match target {
                SelectionTarget::Id(id) => person.id == *id,
                SelectionTarget::Name(name) => normalize_key_query(&person.name) == normalize_key_query(name),
            };
            if hit {
                person.popularity += 1;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn hot_prefixes(&self, len: usize, limit: usize) -> Result<Vec<String>, StorageError> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for person in self.people.read().iter() {
            let key = normalize_key_query(&person.name);
            if key.chars().count() < len {
                continue;
            }
            let prefix: String = key.chars().take(len).collect();
            *counts.entry(prefix).or_insert(0) += 1;
        }

        let mut prefixes: Vec<(String, usize)> = counts.into_iter().collect();
        prefixes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(prefixes.into_iter().take(limit).map(|(p, _)| p).collect())
    }

    async fn insert(&self, name: &str, popularity: i64) -> Result<i64, StorageError> {
        let mut people = self.people.write();
        let id = people.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        people.push(Person {
            id,
            name: name.to_string(),
            popularity,
        });
        Ok(id)
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(self.people.read().len() as u64)
    }
}
