//! Backend adapters for suggestions
//!
//! One adapter per [`Engine`](crate::suggest::Engine): each builds its
//! backend-native query and maps the store's ranked rows to suggestions.

mod backends;

pub use backends::{
    get_backend, list_backends, CommercialText, InvertedIndex, PatternMatch, SuggestBackend,
};
