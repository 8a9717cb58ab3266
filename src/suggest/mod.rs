//! Suggestion dispatch
//!
//! [`SuggestService`] is the entry point: it owns the selected backend adapter,
//! the result cache and the optional failure guard.

mod guard;
mod models;
mod service;

pub use guard::{BackendGuard, CircuitStatus};
pub use models::{Engine, Mode, Suggestion};
pub use service::{clamp_limit, SuggestService};
