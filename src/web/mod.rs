//! Web server module
//!
//! Provides the HTTP API over the suggestion service.

mod error;
mod handlers;
mod ratelimit;
mod routes;
mod state;

pub use error::{ApiError, Violation};
pub use routes::create_router;
pub use state::AppState;
