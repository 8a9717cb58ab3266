//! Rate limiting middleware for the suggestion route

use super::error::ApiError;
use super::state::AppState;
use crate::limiter::resolve_client_key;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::debug;

pub const CLIENT_ID_HEADER: &str = "x-client-id";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const REMAINING_HEADER: &str = "x-rate-limit-remaining";

/// Admit or reject the request against the caller's fixed window
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(governor) = state.governor.as_ref() else {
        return next.run(req).await;
    };

    let key = {
        let headers = req.headers();
        let client_id = headers.get(CLIENT_ID_HEADER).and_then(|v| v.to_str().ok());
        let forwarded = headers.get(FORWARDED_FOR_HEADER).and_then(|v| v.to_str().ok());
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        resolve_client_key(client_id, forwarded, peer)
    };

    let admission = governor.admit(&key);
    if !admission.accepted {
        debug!("Rate limit exceeded for {}", key);
        state.service.metrics().inc_rate_limited();
        let mut response =
            ApiError::new(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response();
        response
            .headers_mut()
            .insert(REMAINING_HEADER, HeaderValue::from(0u32));
        return response;
    }

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(REMAINING_HEADER, HeaderValue::from(admission.remaining));
    response
}
