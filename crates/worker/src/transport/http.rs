// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event lifecycle HTTP API: health plus start/pause/resume/end.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::WorkerError;
use crate::state::WorkerState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub active_events: usize,
}

pub async fn health(State(state): State<Arc<WorkerState>>) -> impl IntoResponse {
    let active_events = state.orchestrator.active_event_ids().await.len();
    Json(HealthResponse { ok: true, active_events })
}

#[derive(Debug, Serialize)]
struct Ack {
    ok: bool,
}

fn ack_or_err(result: Result<(), WorkerError>) -> axum::response::Response {
    match result {
        Ok(()) => Json(Ack { ok: true }).into_response(),
        Err(err) => err.to_http_response(err.to_string()).into_response(),
    }
}

pub async fn start_event(
    State(state): State<Arc<WorkerState>>,
    Path(event_id): Path<String>,
) -> axum::response::Response {
    ack_or_err(state.orchestrator.start_event(&event_id).await)
}

pub async fn pause_event(
    State(state): State<Arc<WorkerState>>,
    Path(event_id): Path<String>,
) -> axum::response::Response {
    ack_or_err(state.orchestrator.pause_event(&event_id).await)
}

pub async fn resume_event(
    State(state): State<Arc<WorkerState>>,
    Path(event_id): Path<String>,
) -> axum::response::Response {
    ack_or_err(state.orchestrator.resume_event(&event_id).await)
}

pub async fn end_event(
    State(state): State<Arc<WorkerState>>,
    Path(event_id): Path<String>,
) -> axum::response::Response {
    ack_or_err(state.orchestrator.end_event(&event_id).await)
}
