// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer-token gate in front of the event-lifecycle API. The audio-ingest
//! and status-stream endpoints authenticate (or deliberately don't) on their
//! own terms, so this layer only needs to know which paths to leave alone.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::WorkerError;
use crate::state::WorkerState;

/// Paths reachable without a bearer token: the health probe, and the audio
/// WS front door (which has no header channel to carry one over anyway).
const EXEMPT_PREFIXES: [&str; 2] = ["/api/v1/health", "/audio/"];

fn is_exempt(path: &str) -> bool {
    EXEMPT_PREFIXES.iter().any(|prefix| path == *prefix || path.starts_with(prefix))
}

/// Constant-time comparison so a mismatched token can't be brute-forced via
/// response-time measurement.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers.get("authorization")?.to_str().ok()?.strip_prefix("Bearer ")
}

/// Check a request's bearer token against the configured value. `expected =
/// None` means auth is disabled for this deployment (local dev / tests).
fn check_token(headers: &HeaderMap, expected: Option<&str>) -> Result<(), WorkerError> {
    let Some(expected) = expected else { return Ok(()) };
    match extract_bearer(headers) {
        Some(token) if constant_time_eq(token, expected) => Ok(()),
        _ => Err(WorkerError::Unauthorized),
    }
}

/// Axum middleware gating every route except [`EXEMPT_PREFIXES`] behind
/// `WorkerConfig::auth_token`.
pub async fn auth_layer(
    state: State<Arc<WorkerState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = req.uri().path();

    if is_exempt(path) {
        return next.run(req).await;
    }

    if let Err(code) = check_token(req.headers(), state.config.auth_token.as_deref()) {
        warn!(path, "rejected unauthenticated request");
        let body = crate::error::ErrorResponse { error: code.to_error_body("missing or invalid bearer token") };
        return (
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::UNAUTHORIZED),
            axum::Json(body),
        )
            .into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exempts_health_and_audio_only() {
        assert!(is_exempt("/api/v1/health"));
        assert!(is_exempt("/audio/stream"));
        assert!(!is_exempt("/api/v1/events/e1/start"));
        assert!(!is_exempt("/events/e1/status"));
    }

    #[test]
    fn constant_time_eq_rejects_mismatched_length() {
        assert!(!constant_time_eq("short", "longertoken"));
    }

    #[test]
    fn check_token_allows_disabled_auth() {
        let headers = HeaderMap::new();
        assert!(check_token(&headers, None).is_ok());
    }

    #[test]
    fn check_token_rejects_missing_header() {
        let headers = HeaderMap::new();
        assert_eq!(check_token(&headers, Some("secret")), Err(WorkerError::Unauthorized));
    }

    #[test]
    fn check_token_accepts_matching_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer secret".parse().unwrap());
        assert!(check_token(&headers, Some("secret")).is_ok());
    }
}
