// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic enrichment push: snapshots each active runtime and fans the
//! result out to subscribers over a broadcast channel, which the transport
//! layer re-exposes as an SSE stream per event.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::orchestrator::Orchestrator;
use crate::session::SessionState;

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub event_id: String,
    pub status: crate::runtime::RuntimeStatus,
    pub cards_last_seq: u64,
    pub facts_last_seq: u64,
    pub facts_last_update_ms: u64,
    pub recent_log: Vec<String>,
    pub emitted_at: i64,
}

/// Broadcast hub plus a short-lived cache of the most recent snapshot per
/// event, so a freshly-connecting SSE subscriber can backfill immediately
/// instead of waiting for the next tick.
pub struct StatusEmitter {
    tx: broadcast::Sender<StatusSnapshot>,
    cache: RwLock<HashMap<String, StatusSnapshot>>,
}

impl Default for StatusEmitter {
    fn default() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self { tx, cache: RwLock::new(HashMap::new()) }
    }
}

impl StatusEmitter {
    pub fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    pub async fn cached(&self, event_id: &str) -> Option<StatusSnapshot> {
        self.cache.read().await.get(event_id).cloned()
    }

    pub async fn cached_all(&self) -> Vec<StatusSnapshot> {
        self.cache.read().await.values().cloned().collect()
    }

    async fn emit(&self, snapshot: StatusSnapshot) {
        self.cache.write().await.insert(snapshot.event_id.clone(), snapshot.clone());
        let _ = self.tx.send(snapshot);
    }
}

/// Spawn the background task that snapshots every active runtime on a fixed
/// cadence. Pulls read-locked snapshots; never calls into sessions, so it
/// can't block the ingest path.
pub fn spawn_status_emitter(
    orchestrator: Arc<Orchestrator>,
    emitter: Arc<StatusEmitter>,
    cadence: std::time::Duration,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut tick = interval(cadence);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => {
                    for event_id in orchestrator.active_event_ids().await {
                        if let Some(runtime) = orchestrator.runtime(&event_id).await {
                            let snapshot = StatusSnapshot {
                                event_id: event_id.clone(),
                                status: runtime.status().await,
                                cards_last_seq: runtime.cards_last_seq.load(std::sync::atomic::Ordering::Relaxed),
                                facts_last_seq: runtime.facts_last_seq.load(std::sync::atomic::Ordering::Relaxed),
                                facts_last_update_ms: runtime.facts_last_update_ms.load(std::sync::atomic::Ordering::Relaxed),
                                recent_log: runtime.log.read().await.recent(50),
                                emitted_at: now_ms(),
                            };
                            emitter.emit(snapshot).await;
                        }
                    }
                }
            }
        }
    });
}

/// Present to satisfy the `SessionState` import for downstream consumers
/// that match on live session state alongside runtime status.
pub fn describe_session_state(state: SessionState) -> &'static str {
    match state {
        SessionState::New => "new",
        SessionState::Connecting => "connecting",
        SessionState::Open => "open",
        SessionState::Paused => "paused",
        SessionState::Closing => "closing",
        SessionState::Closed => "closed",
        SessionState::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_updates_cache_and_broadcasts() {
        let emitter = StatusEmitter::default();
        let mut rx = emitter.subscribe();
        emitter
            .emit(StatusSnapshot {
                event_id: "e1".into(),
                status: crate::runtime::RuntimeStatus::Running,
                cards_last_seq: 1,
                facts_last_seq: 1,
                facts_last_update_ms: 0,
                recent_log: vec![],
                emitted_at: 0,
            })
            .await;
        assert!(emitter.cached("e1").await.is_some());
        let received = rx.try_recv().unwrap();
        assert_eq!(received.event_id, "e1");
    }

    #[test]
    fn describes_every_session_state() {
        assert_eq!(describe_session_state(SessionState::Open), "open");
        assert_eq!(describe_session_state(SessionState::Error), "error");
    }
}
