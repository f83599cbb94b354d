// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `GET /events/{event_id}/status` — server-sent status stream backfilled
//! from the cached snapshot, then fed by the periodic `StatusEmitter` tick.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures_util::stream::Stream;
use tokio::sync::broadcast;

use crate::state::WorkerState;
use crate::status::StatusSnapshot;

pub async fn event_status(
    State(state): State<Arc<WorkerState>>,
    Path(event_id): Path<String>,
) -> impl IntoResponse {
    let backfill = state.status_emitter.cached(&event_id).await;
    let rx = state.status_emitter.subscribe();

    let stream = make_status_stream(backfill, rx, event_id);

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn make_status_stream(
    backfill: Option<StatusSnapshot>,
    mut rx: broadcast::Receiver<StatusSnapshot>,
    event_id: String,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        if let Some(snapshot) = backfill {
            if let Some(event) = to_sse_event(&snapshot) {
                yield Ok(event);
            }
        }

        loop {
            match rx.recv().await {
                Ok(snapshot) if snapshot.event_id == event_id => {
                    if let Some(event) = to_sse_event(&snapshot) {
                        yield Ok(event);
                    }
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

fn to_sse_event(snapshot: &StatusSnapshot) -> Option<Event> {
    serde_json::to_string(snapshot).ok().map(|payload| Event::default().event("status").data(payload))
}
