// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One provider session per `(event, agent)`: connect/send/pause/resume/close
//! with ping/pong liveness and exponential-backoff reconnect.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::WorkerError;
use crate::provider::{ProviderConnection, ProviderEvent, ProviderTransport};

const CONNECT_BACKOFF_START_MS: u64 = 500;
const CONNECT_BACKOFF_FACTOR: u32 = 2;
const CONNECT_BACKOFF_CAP_MS: u64 = 30_000;
const PERSISTENT_FAILURE_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    New,
    Connecting,
    Open,
    Paused,
    Closing,
    Closed,
    Error,
}

/// Outbound events delivered to the owning `EventRuntime`. Delivered over a
/// typed channel — never a direct callback invocation from inside the
/// transport task into runtime state.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Card(Value),
    Facts(Value),
    Log(String),
    StatusChange(SessionState),
}

struct Inner {
    state: SessionState,
    connection: Option<ProviderConnection>,
    connection_count: u32,
    missed_pongs: u32,
}

/// One provider session for a single `(event_id, agent_type)` pair.
pub struct RealtimeSession {
    model: String,
    transport: Arc<dyn ProviderTransport>,
    ping_interval: Duration,
    max_missed_pongs: u32,
    events_tx: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
    inner: Arc<RwLock<Inner>>,
    connect_lock: Mutex<()>,
    consecutive_failures: AtomicU32,
}

impl RealtimeSession {
    pub fn new(
        model: String,
        transport: Arc<dyn ProviderTransport>,
        ping_interval: Duration,
        max_missed_pongs: u32,
        events_tx: mpsc::Sender<SessionEvent>,
        parent_cancel: &CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            model,
            transport,
            ping_interval,
            max_missed_pongs,
            events_tx,
            cancel: parent_cancel.child_token(),
            inner: Arc::new(RwLock::new(Inner {
                state: SessionState::New,
                connection: None,
                connection_count: 0,
                missed_pongs: 0,
            })),
            connect_lock: Mutex::new(()),
            consecutive_failures: AtomicU32::new(0),
        })
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    async fn set_state(&self, state: SessionState) {
        self.inner.write().await.state = state;
        let _ = self.events_tx.send(SessionEvent::StatusChange(state)).await;
    }

    /// Open the provider transport, retrying with exponential backoff until
    /// it succeeds or the session is cancelled. Spawns the receive loop and
    /// the ping heartbeat.
    pub async fn connect(self: &Arc<Self>) -> Result<String, WorkerError> {
        let _guard = self.connect_lock.lock().await;
        self.set_state(SessionState::Connecting).await;

        let mut backoff = CONNECT_BACKOFF_START_MS;
        loop {
            if self.cancel.is_cancelled() {
                return Err(WorkerError::TransientTransport);
            }
            match self.transport.connect(&self.model).await {
                Ok(connection) => {
                    let session_id = connection.session_id.clone();
                    {
                        let mut inner = self.inner.write().await;
                        inner.connection_count += 1;
                        inner.missed_pongs = 0;
                    }
                    self.consecutive_failures.store(0, Ordering::Relaxed);
                    self.spawn_receive_loop(connection).await;
                    self.spawn_ping_loop();
                    self.set_state(SessionState::Open).await;
                    return Ok(session_id);
                }
                Err(err) => {
                    let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(failures, ?err, "provider connect failed, retrying");
                    if failures >= PERSISTENT_FAILURE_THRESHOLD {
                        self.set_state(SessionState::Error).await;
                        return Err(err);
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(backoff)) => {}
                        _ = self.cancel.cancelled() => return Err(WorkerError::TransientTransport),
                    }
                    backoff = (backoff * CONNECT_BACKOFF_FACTOR as u64).min(CONNECT_BACKOFF_CAP_MS);
                }
            }
        }
    }

    async fn spawn_receive_loop(self: &Arc<Self>, mut connection: ProviderConnection) {
        let this = Arc::clone(self);
        let cancel = self.cancel.child_token();
        {
            let mut inner = self.inner.write().await;
            // Stash the sender half; the receive loop below owns `inbound`.
            let outbound = connection.outbound.clone();
            inner.connection = Some(ProviderConnection {
                session_id: connection.session_id.clone(),
                outbound,
                inbound: mpsc::channel(1).1,
            });
        }

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = connection.inbound.recv() => {
                        match event {
                            Some(ProviderEvent::Card(v)) => {
                                let _ = this.events_tx.send(SessionEvent::Card(v)).await;
                            }
                            Some(ProviderEvent::Facts(v)) => {
                                let _ = this.events_tx.send(SessionEvent::Facts(v)).await;
                            }
                            Some(ProviderEvent::Log(msg)) => {
                                let _ = this.events_tx.send(SessionEvent::Log(msg)).await;
                            }
                            Some(ProviderEvent::Pong) => {
                                this.inner.write().await.missed_pongs = 0;
                            }
                            None => {
                                this.on_transport_closed().await;
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    async fn on_transport_closed(self: &Arc<Self>) {
        let state = self.state().await;
        if matches!(state, SessionState::Closing | SessionState::Closed | SessionState::Paused) {
            return;
        }
        warn!("provider transport closed unexpectedly");
        self.set_state(SessionState::Error).await;
    }

    fn spawn_ping_loop(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let cancel = self.cancel.child_token();
        let period = self.ping_interval;
        tokio::spawn(async move {
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        if this.state().await != SessionState::Open {
                            continue;
                        }
                        let missed = {
                            let mut inner = this.inner.write().await;
                            inner.missed_pongs += 1;
                            inner.missed_pongs
                        };
                        if missed > this.max_missed_pongs {
                            warn!(missed, "max missed pongs exceeded, marking session errored");
                            this.set_state(SessionState::Error).await;
                            break;
                        }
                        let _ = this.send_raw(serde_json::json!({"type": "ping"})).await;
                    }
                }
            }
        });
    }

    async fn send_raw(&self, payload: Value) -> Result<(), WorkerError> {
        let inner = self.inner.read().await;
        match &inner.connection {
            Some(conn) => conn
                .outbound
                .try_send(payload)
                .map_err(|_| WorkerError::Backpressure),
            None => Err(WorkerError::TransientTransport),
        }
    }

    /// Send a message to the provider. Fails fast with `Backpressure` if the
    /// send buffer is full, and with a closed-session error if not `Open`.
    pub async fn send_message(&self, payload: Value) -> Result<(), WorkerError> {
        if self.state().await != SessionState::Open {
            return Err(WorkerError::TransientTransport);
        }
        self.send_raw(payload).await
    }

    pub async fn pause(&self) {
        self.set_state(SessionState::Paused).await;
        self.inner.write().await.connection = None;
    }

    pub async fn resume(self: &Arc<Self>) -> Result<String, WorkerError> {
        if self.state().await == SessionState::Open {
            let sid = self.inner.read().await.connection.as_ref().map(|c| c.session_id.clone());
            if let Some(sid) = sid {
                return Ok(sid);
            }
        }
        self.connect().await
    }

    pub async fn close(&self) {
        self.set_state(SessionState::Closing).await;
        self.cancel.cancel();
        self.inner.write().await.connection = None;
        self.set_state(SessionState::Closed).await;
        info!("session closed");
    }

    pub async fn connection_count(&self) -> u32 {
        self.inner.read().await.connection_count
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
