// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket + SSE transport for the event worker.

pub mod audio;
pub mod auth;
pub mod http;
pub mod sse;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::WorkerState;

/// Build the axum `Router` with every route the worker exposes.
pub fn build_router(state: Arc<WorkerState>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(http::health))
        // Event lifecycle
        .route("/api/v1/events/{event_id}/start", post(http::start_event))
        .route("/api/v1/events/{event_id}/pause", post(http::pause_event))
        .route("/api/v1/events/{event_id}/resume", post(http::resume_event))
        .route("/api/v1/events/{event_id}/end", post(http::end_event))
        // Live status (SSE)
        .route("/events/{event_id}/status", get(sse::event_status))
        // Audio ingest boundary (WebSocket)
        .route("/audio/stream", get(audio::audio_stream))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
