// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide coordinator: owns the set of active `EventRuntime`s, routes
//! transcript records to them through a bounded per-event queue, enforces
//! state-machine legality, and performs startup recovery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::repo::{
    AgentType, CheckpointRepository, FactSnapshotRepository, GlossaryRepository,
    SessionRecordRepository, SessionStatus, TranscriptRepository,
};
use crate::ring_buffer::TranscriptChunk;
use crate::runtime::{EventRuntime, RuntimeStatus};
use crate::session::SessionEvent;
use crate::session_manager::SessionManager;

const INGEST_QUEUE_CAPACITY: usize = 1024;
const START_DEADLINE: Duration = Duration::from_secs(15);
const FINAL_CHUNK_ENQUEUE_BUDGET: Duration = Duration::from_millis(200);

struct ActiveRuntime {
    runtime: Arc<EventRuntime>,
    inbound: mpsc::Sender<TranscriptChunk>,
    cancel: CancellationToken,
}

/// Process-wide singleton coordinating every active event.
pub struct Orchestrator {
    config: Arc<WorkerConfig>,
    runtimes: RwLock<HashMap<String, ActiveRuntime>>,
    checkpoints: Arc<dyn CheckpointRepository>,
    session_records: Arc<dyn SessionRecordRepository>,
    transcripts: Arc<dyn TranscriptRepository>,
    glossary: Arc<dyn GlossaryRepository>,
    fact_snapshots: Arc<dyn FactSnapshotRepository>,
    sessions: Arc<SessionManager>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        config: Arc<WorkerConfig>,
        checkpoints: Arc<dyn CheckpointRepository>,
        session_records: Arc<dyn SessionRecordRepository>,
        transcripts: Arc<dyn TranscriptRepository>,
        glossary: Arc<dyn GlossaryRepository>,
        fact_snapshots: Arc<dyn FactSnapshotRepository>,
        sessions: Arc<SessionManager>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            runtimes: RwLock::new(HashMap::new()),
            checkpoints,
            session_records,
            transcripts,
            glossary,
            fact_snapshots,
            sessions,
            shutdown,
        })
    }

    pub async fn runtime(&self, event_id: &str) -> Option<Arc<EventRuntime>> {
        self.runtimes.read().await.get(event_id).map(|r| Arc::clone(&r.runtime))
    }

    pub async fn is_active(&self, event_id: &str) -> bool {
        self.runtimes.read().await.contains_key(event_id)
    }

    pub async fn active_event_ids(&self) -> Vec<String> {
        self.runtimes.read().await.keys().cloned().collect()
    }

    /// Start (or idempotently no-op on) an event's runtime: builds the
    /// `EventRuntime`, connects both agent sessions, and begins accepting
    /// ingest. Enforces the 15s end-to-end start deadline.
    pub async fn start_event(self: &Arc<Self>, event_id: &str) -> Result<(), WorkerError> {
        if self.is_active(event_id).await {
            return Ok(());
        }

        timeout(START_DEADLINE, self.start_event_inner(event_id)).await.map_err(|_| {
            warn!(event_id, "start_event exceeded deadline");
            WorkerError::TransientTransport
        })?
    }

    async fn start_event_inner(self: &Arc<Self>, event_id: &str) -> Result<(), WorkerError> {
        let cancel = self.shutdown.child_token();
        let runtime =
            EventRuntime::load(event_id.to_string(), &self.config, self.checkpoints.as_ref(), self.glossary.as_ref(), &cancel)
                .await;

        let (events_tx, events_rx) = mpsc::channel::<SessionEvent>(256);
        self.sessions
            .create(
                event_id,
                AgentType::Cards,
                self.config.cards_model.clone(),
                self.config.ping_interval(),
                self.config.max_missed_pongs,
                events_tx.clone(),
                &cancel,
            )
            .await;
        self.sessions
            .create(
                event_id,
                AgentType::Facts,
                self.config.cards_model.clone(),
                self.config.ping_interval(),
                self.config.max_missed_pongs,
                events_tx,
                &cancel,
            )
            .await;
        self.spawn_session_event_forwarder(Arc::clone(&runtime), events_rx, cancel.clone());

        runtime.set_status(RuntimeStatus::Running).await;

        let (inbound_tx, inbound_rx) = mpsc::channel(INGEST_QUEUE_CAPACITY);
        self.spawn_event_worker(Arc::clone(&runtime), inbound_rx, cancel.clone());

        self.runtimes
            .write()
            .await
            .insert(event_id.to_string(), ActiveRuntime { runtime, inbound: inbound_tx, cancel });

        info!(event_id, "event started");
        Ok(())
    }

    /// Forward session lifecycle/output events into the runtime's bounded
    /// diagnostic log, which the StatusEmitter later surfaces.
    fn spawn_session_event_forwarder(
        &self,
        runtime: Arc<EventRuntime>,
        mut events_rx: mpsc::Receiver<SessionEvent>,
        cancel: CancellationToken,
    ) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events_rx.recv() => {
                        let Some(event) = event else { break };
                        let entry = match event {
                            SessionEvent::Card(_) => "session event: card".to_string(),
                            SessionEvent::Facts(_) => "session event: facts".to_string(),
                            SessionEvent::Log(msg) => format!("session log: {msg}"),
                            SessionEvent::StatusChange(state) => format!("session state -> {state:?}"),
                        };
                        runtime.log.write().await.push(entry);
                    }
                }
            }
        });
    }

    /// Spawn the single-writer task that serializes ingest for one event and
    /// drives its Facts debounce timer.
    fn spawn_event_worker(
        self: &Arc<Self>,
        runtime: Arc<EventRuntime>,
        mut inbound_rx: mpsc::Receiver<TranscriptChunk>,
        cancel: CancellationToken,
    ) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let debounce = tokio::time::sleep(Duration::from_secs(3600));
            tokio::pin!(debounce);
            let mut debounce_armed = false;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    chunk = inbound_rx.recv() => {
                        let Some(chunk) = chunk else { break };
                        runtime.ingest(chunk, &this.config, this.checkpoints.as_ref(), &this.sessions).await;
                        debounce.as_mut().reset(tokio::time::Instant::now() + this.config.facts_debounce());
                        debounce_armed = true;
                    }
                    _ = &mut debounce, if debounce_armed => {
                        debounce_armed = false;
                        runtime
                            .run_facts_path(&this.config, this.checkpoints.as_ref(), this.fact_snapshots.as_ref(), &this.sessions)
                            .await;
                    }
                }
            }
        });
    }

    /// Route one transcript record to its event's runtime. If the event is
    /// not active, the record is dropped. Final chunks get a bounded grace
    /// period before being recorded as delayed rather than silently lost.
    pub async fn dispatch_transcript(&self, event_id: &str, chunk: TranscriptChunk) {
        let sender = {
            let runtimes = self.runtimes.read().await;
            runtimes.get(event_id).map(|r| r.inbound.clone())
        };
        let Some(sender) = sender else {
            return;
        };

        if !chunk.r#final {
            let _ = sender.try_send(chunk);
            return;
        }

        if sender.try_send(chunk.clone()).is_ok() {
            return;
        }

        match timeout(FINAL_CHUNK_ENQUEUE_BUDGET, sender.send(chunk)).await {
            Ok(Ok(())) => {}
            _ => warn!(event_id, "final chunk dropped under sustained backpressure"),
        }
    }

    pub async fn pause_event(&self, event_id: &str) -> Result<(), WorkerError> {
        let runtime = self.runtime(event_id).await.ok_or(WorkerError::EventNotFound)?;
        if runtime.status().await != RuntimeStatus::Running {
            return Err(WorkerError::StateTransitionIllegal);
        }
        self.sessions.pause(event_id, AgentType::Cards).await;
        self.sessions.pause(event_id, AgentType::Facts).await;
        runtime.set_status(RuntimeStatus::Paused).await;
        Ok(())
    }

    pub async fn resume_event(&self, event_id: &str) -> Result<(), WorkerError> {
        let runtime = self.runtime(event_id).await.ok_or(WorkerError::EventNotFound)?;
        let status = runtime.status().await;
        if status == RuntimeStatus::Running {
            return Ok(());
        }
        if status != RuntimeStatus::Paused {
            return Err(WorkerError::StateTransitionIllegal);
        }
        self.sessions.resume(event_id, AgentType::Cards).await?;
        self.sessions.resume(event_id, AgentType::Facts).await?;
        runtime.set_status(RuntimeStatus::Running).await;
        Ok(())
    }

    pub async fn end_event(&self, event_id: &str) -> Result<(), WorkerError> {
        let Some(active) = self.runtimes.write().await.remove(event_id) else {
            return Err(WorkerError::EventNotFound);
        };
        active.cancel.cancel();
        self.sessions.remove(event_id, AgentType::Cards).await;
        self.sessions.remove(event_id, AgentType::Facts).await;
        active.runtime.set_status(RuntimeStatus::Ended).await;
        info!(event_id, "event ended");
        Ok(())
    }

    /// Startup recovery: reconstruct runtimes for every agent whose
    /// persisted status is `running`-equivalent, replaying transcripts past
    /// the last checkpoint before reconnecting sessions.
    pub async fn recover(self: &Arc<Self>) {
        let running = self.session_records.list_running().await;
        let mut seen = std::collections::HashSet::new();
        for record in running {
            if !matches!(record.status, SessionStatus::Active | SessionStatus::Starting) {
                continue;
            }
            if !seen.insert(record.event_id.clone()) {
                continue;
            }
            if let Err(err) = self.start_event(&record.event_id).await {
                warn!(event_id = %record.event_id, ?err, "recovery failed to start event");
                continue;
            }
            if let Some(runtime) = self.runtime(&record.event_id).await {
                self.replay_transcripts(&runtime).await;
            }
        }
    }

    async fn replay_transcripts(&self, runtime: &Arc<EventRuntime>) {
        let last_seq = runtime
            .cards_last_seq
            .load(std::sync::atomic::Ordering::Relaxed)
            .max(runtime.facts_last_seq.load(std::sync::atomic::Ordering::Relaxed));
        let chunks = self.transcripts.list_since(&runtime.event_id, last_seq, 1000).await;
        runtime.replay(chunks).await;
    }

    /// Periodic housekeeping: safety-net checkpoint flush and a 5-minute
    /// summary log. The per-dispatch checkpoint writes in `EventRuntime`
    /// already cover the common path; this loop exists for the case where a
    /// runtime goes quiet without any further ingest.
    pub fn spawn_periodic_tasks(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut flush_tick = interval(this.config.checkpoint_flush_interval());
            flush_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut summary_tick = interval(Duration::from_secs(300));
            summary_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = this.shutdown.cancelled() => break,
                    _ = flush_tick.tick() => {
                        let runtimes = this.runtimes.read().await;
                        for (event_id, active) in runtimes.iter() {
                            let seq = active.runtime.cards_last_seq.load(std::sync::atomic::Ordering::Relaxed);
                            this.checkpoints.set(event_id, AgentType::Cards, seq).await;
                        }
                    }
                    _ = summary_tick.tick() => {
                        let count = this.runtimes.read().await.len();
                        info!(active_events = count, "periodic summary");
                    }
                }
            }
        });
    }

    /// Drain all active runtimes: stop timers, flush checkpoints, close
    /// sessions. Bounded by a global deadline after which shutdown proceeds
    /// regardless.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let event_ids: Vec<String> = self.runtimes.read().await.keys().cloned().collect();
        let drain = async {
            for event_id in event_ids {
                if let Some(active) = self.runtimes.write().await.remove(&event_id) {
                    let seq = active.runtime.cards_last_seq.load(std::sync::atomic::Ordering::Relaxed);
                    self.checkpoints.set(&event_id, AgentType::Cards, seq).await;
                }
            }
            self.sessions.close_all().await;
        };
        if timeout(Duration::from_secs(10), drain).await.is_err() {
            warn!("orchestrator shutdown exceeded global drain deadline");
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
