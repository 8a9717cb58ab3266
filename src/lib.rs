//! autosuggest-rs: type-ahead suggestions over interchangeable search backends
//!
//! A dispatch engine answers each query through one of three backends
//! (LIKE pattern matching, an FTS5 inverted index, or an Oracle Text style
//! engine), caches the results, and falls back to an empty answer when the
//! backend fails. Selections feed a popularity counter that influences
//! ranking, and an optional fixed-window governor limits each client.

pub mod autocomplete;
pub mod cache;
pub mod config;
pub mod error;
pub mod limiter;
pub mod metrics;
pub mod query;
pub mod storage;
pub mod suggest;
pub mod web;

pub use config::Settings;
pub use error::{StorageError, SuggestError};
pub use suggest::{Engine, Mode, Suggestion, SuggestService};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Limit used when none (or a non-positive one) is requested
pub const DEFAULT_LIMIT: usize = 10;

/// Largest number of suggestions returned
pub const MAX_LIMIT: usize = 50;

/// Queries shorter than this (after trimming) never reach a backend
pub const MIN_QUERY_LEN: usize = 2;
