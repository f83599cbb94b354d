// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns `RealtimeSession` instances across all event runtimes and serializes
//! `SessionRecord` persistence per `(event, agent_type)`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::provider::ProviderTransport;
use crate::repo::{AgentType, SessionRecord, SessionRecordRepository, SessionStatus};
use crate::session::{RealtimeSession, SessionEvent, SessionState};

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

fn status_for(state: SessionState) -> SessionStatus {
    match state {
        SessionState::New | SessionState::Connecting => SessionStatus::Starting,
        SessionState::Open => SessionStatus::Active,
        SessionState::Paused => SessionStatus::Paused,
        SessionState::Closing | SessionState::Closed => SessionStatus::Closed,
        SessionState::Error => SessionStatus::Error,
    }
}

/// Per-key async lock so persistence writes for the same `(event, agent)`
/// pair are linearized even if multiple transport callbacks race.
#[derive(Default)]
struct WriteLocks {
    locks: RwLock<HashMap<(String, AgentType), Arc<Mutex<()>>>>,
}

impl WriteLocks {
    async fn lock_for(&self, key: (String, AgentType)) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(&key) {
            return Arc::clone(lock);
        }
        let mut guard = self.locks.write().await;
        Arc::clone(guard.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))))
    }
}

pub struct SessionManager {
    records: Arc<dyn SessionRecordRepository>,
    transport: Arc<dyn ProviderTransport>,
    sessions: RwLock<HashMap<(String, AgentType), Arc<RealtimeSession>>>,
    write_locks: WriteLocks,
}

impl SessionManager {
    pub fn new(records: Arc<dyn SessionRecordRepository>, transport: Arc<dyn ProviderTransport>) -> Self {
        Self {
            records,
            transport,
            sessions: RwLock::new(HashMap::new()),
            write_locks: WriteLocks::default(),
        }
    }

    /// Create and connect a new session for `(event_id, agent_type)`,
    /// persisting status transitions as the connection progresses.
    pub async fn create(
        &self,
        event_id: &str,
        agent_type: AgentType,
        model: String,
        ping_interval: std::time::Duration,
        max_missed_pongs: u32,
        events_tx: mpsc::Sender<SessionEvent>,
        cancel: &CancellationToken,
    ) -> Arc<RealtimeSession> {
        let session = RealtimeSession::new(
            model.clone(),
            Arc::clone(&self.transport),
            ping_interval,
            max_missed_pongs,
            events_tx,
            cancel,
        );

        self.sessions.write().await.insert((event_id.to_string(), agent_type), Arc::clone(&session));

        let key = (event_id.to_string(), agent_type);
        let lock = self.write_locks.lock_for(key).await;
        let _guard = lock.lock().await;

        let now = now_ms();
        self.records
            .upsert(SessionRecord {
                event_id: event_id.to_string(),
                agent_type,
                agent_id: uuid::Uuid::new_v4().to_string(),
                provider_session_id: None,
                status: SessionStatus::Starting,
                model: model.clone(),
                created_at: now,
                updated_at: now,
                closed_at: None,
                connection_count: 0,
                last_connected_at: None,
            })
            .await;

        let provider_session_id = session.connect().await.ok();
        let state = session.state().await;
        let now = now_ms();
        self.records
            .upsert(SessionRecord {
                event_id: event_id.to_string(),
                agent_type,
                agent_id: uuid::Uuid::new_v4().to_string(),
                provider_session_id,
                status: status_for(state),
                model,
                created_at: now,
                updated_at: now,
                closed_at: None,
                connection_count: session.connection_count().await,
                last_connected_at: Some(now),
            })
            .await;

        session
    }

    pub async fn get(&self, event_id: &str, agent_type: AgentType) -> Option<Arc<RealtimeSession>> {
        self.sessions.read().await.get(&(event_id.to_string(), agent_type)).cloned()
    }

    /// Persist a `SessionRecord` update for `(event_id, agent_type)` under
    /// its per-key write lock, reading the session's current state and
    /// connection count and letting `mutate` fill in the transition-specific
    /// field (`closed_at`, `last_connected_at`, ...).
    async fn persist_transition(
        &self,
        event_id: &str,
        agent_type: AgentType,
        session: &RealtimeSession,
        mutate: impl FnOnce(&mut SessionRecord),
    ) {
        let key = (event_id.to_string(), agent_type);
        let lock = self.write_locks.lock_for(key).await;
        let _guard = lock.lock().await;

        let now = now_ms();
        let mut record = self.records.get(event_id, agent_type).await.unwrap_or(SessionRecord {
            event_id: event_id.to_string(),
            agent_type,
            agent_id: uuid::Uuid::new_v4().to_string(),
            provider_session_id: None,
            status: SessionStatus::Starting,
            model: String::new(),
            created_at: now,
            updated_at: now,
            closed_at: None,
            connection_count: 0,
            last_connected_at: None,
        });
        record.status = status_for(session.state().await);
        record.connection_count = session.connection_count().await;
        record.updated_at = now;
        mutate(&mut record);
        self.records.upsert(record).await;
    }

    /// Pause a session and persist its `paused` status.
    pub async fn pause(&self, event_id: &str, agent_type: AgentType) {
        let Some(session) = self.get(event_id, agent_type).await else { return };
        session.pause().await;
        self.persist_transition(event_id, agent_type, &session, |_| {}).await;
    }

    /// Resume a session and persist its `active` status plus the bumped
    /// `connection_count` and `last_connected_at`.
    pub async fn resume(&self, event_id: &str, agent_type: AgentType) -> Result<(), WorkerError> {
        let Some(session) = self.get(event_id, agent_type).await else { return Ok(()) };
        session.resume().await?;
        let now = now_ms();
        self.persist_transition(event_id, agent_type, &session, |record| {
            record.last_connected_at = Some(now);
        })
        .await;
        Ok(())
    }

    pub async fn remove(&self, event_id: &str, agent_type: AgentType) {
        if let Some(session) = self.sessions.write().await.remove(&(event_id.to_string(), agent_type)) {
            session.close().await;
            let now = now_ms();
            self.persist_transition(event_id, agent_type, &session, |record| {
                record.closed_at = Some(now);
            })
            .await;
        }
    }

    pub async fn close_all(&self) {
        let sessions: Vec<((String, AgentType), Arc<RealtimeSession>)> =
            self.sessions.write().await.drain().collect();
        for ((event_id, agent_type), session) in sessions {
            session.close().await;
            let now = now_ms();
            self.persist_transition(&event_id, agent_type, &session, |record| {
                record.closed_at = Some(now);
            })
            .await;
        }
    }
}
