//! HTTP request handlers

use super::error::{ApiError, Violation};
use super::state::AppState;
use crate::storage::IndexMaintenance;
use crate::suggest::{Mode, Suggestion};
use crate::{DEFAULT_LIMIT, MAX_LIMIT, MIN_QUERY_LEN};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

/// Longest accepted query
const MAX_QUERY_LEN: usize = 100;

/// Query parameters for suggestions
#[derive(Debug, Default, Deserialize)]
pub struct SuggestParams {
    /// Search query
    pub q: Option<String>,
    /// Maximum number of suggestions
    pub limit: Option<String>,
    /// PREFIX, CONTAINS or FUZZY
    pub mode: Option<String>,
}

/// Validated suggestion request
#[derive(Debug)]
struct SuggestRequest {
    q: String,
    limit: i64,
    mode: Mode,
}

impl SuggestParams {
    fn validate(self) -> Result<SuggestRequest, ApiError> {
        let mut violations = Vec::new();

        let q = self.q.unwrap_or_default();
        let len = q.trim().chars().count();
        if len == 0 {
            violations.push(Violation::new("q", "must not be blank"));
        } else if !(MIN_QUERY_LEN..=MAX_QUERY_LEN).contains(&len) {
            violations.push(Violation::new(
                "q",
                format!("length must be between {} and {}", MIN_QUERY_LEN, MAX_QUERY_LEN),
            ));
        }

        let limit = parse_limit(self.limit.as_deref(), &mut violations);

        let mode = match self.mode.as_deref().map(str::trim) {
            None | Some("") => Mode::default(),
            Some(raw) => raw.parse::<Mode>().unwrap_or_else(|_| {
                violations.push(Violation::new("mode", "must be one of PREFIX, CONTAINS, FUZZY"));
                Mode::default()
            }),
        };

        if violations.is_empty() {
            Ok(SuggestRequest { q, limit, mode })
        } else {
            Err(ApiError::validation(violations))
        }
    }
}

/// `limit` must be absent or an integer in `1..=MAX_LIMIT`
fn parse_limit(raw: Option<&str>, violations: &mut Vec<Violation>) -> i64 {
    match raw.map(str::trim) {
        None | Some("") => DEFAULT_LIMIT as i64,
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if (1..=MAX_LIMIT as i64).contains(&n) => n,
            _ => {
                violations.push(Violation::new(
                    "limit",
                    format!("must be an integer between 1 and {}", MAX_LIMIT),
                ));
                DEFAULT_LIMIT as i64
            }
        },
    }
}

/// Suggestion handler
pub async fn suggest(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    let req = params.validate()?;
    let suggestions = state
        .service
        .suggest(Some(&req.q), Some(req.limit), Some(req.mode))
        .await;
    Ok(Json(suggestions))
}

#[derive(Debug, Default, Deserialize)]
pub struct DefaultsParams {
    pub limit: Option<String>,
}

/// Popularity-ranked defaults, 404 when disabled
pub async fn defaults(
    State(state): State<AppState>,
    Query(params): Query<DefaultsParams>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    if !state.service.defaults_enabled() {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "Default suggestions are disabled",
        ));
    }

    let mut violations = Vec::new();
    let limit = parse_limit(params.limit.as_deref(), &mut violations);
    if !violations.is_empty() {
        return Err(ApiError::validation(violations));
    }
    Ok(Json(state.service.default_suggestions(Some(limit)).await))
}

/// Selection report body
#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub id: Option<i64>,
    pub value: Option<String>,
}

/// Record a selected suggestion
pub async fn track(
    State(state): State<AppState>,
    Json(body): Json<TrackRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .track_selection(body.id, body.value.as_deref())
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// FTS index maintenance
pub async fn fts_admin(
    State(state): State<AppState>,
    Path(op): Path<IndexMaintenance>,
) -> Result<StatusCode, ApiError> {
    state.service.maintain_index(op).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub instance: String,
    pub engine: String,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
        instance: state.instance_name().to_string(),
        engine: state.service.engine().to_string(),
    })
}

/// Dispatch statistics
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "engine": state.service.engine(),
        "cache_enabled": state.service.cache_enabled(),
        "circuit": state.service.circuit_status(),
        "rate_limited_clients": state.governor.as_ref().map(|g| g.tracked_clients()),
        "metrics": state.service.metrics().snapshot(),
    }))
}
