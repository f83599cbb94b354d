// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `EventRuntime`: the per-event composition root. Owns the ring buffer,
//! facts store, glossary cache, and the two agent sessions. All mutation
//! flows through `ingest`, which the orchestrator calls with a single
//! writer per event.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::budgeter::{budget_facts, BudgeterInput};
use crate::config::WorkerConfig;
use crate::context::{build_cards_context, build_facts_context};
use crate::facts::FactsStore;
use crate::filter::clean_transcript;
use crate::repo::{AgentType, CheckpointRepository, FactSnapshotRepository, GlossaryRepository};
use crate::ring_buffer::{RingBuffer, TranscriptChunk};
use crate::session::RealtimeSession;
use crate::session_manager::SessionManager;
use crate::tokens::count_tokens;

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeStatus {
    ContextComplete,
    Ready,
    Running,
    Paused,
    Ended,
    Error,
}

const LOG_RING_CAPACITY: usize = 100;

/// A bounded diagnostic log embedded in the runtime, newest entry last.
#[derive(Default)]
pub struct LogRing {
    entries: VecDeque<String>,
}

impl LogRing {
    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push_back(entry.into());
        while self.entries.len() > LOG_RING_CAPACITY {
            self.entries.pop_front();
        }
    }

    pub fn recent(&self, n: usize) -> Vec<String> {
        self.entries.iter().rev().take(n).rev().cloned().collect()
    }
}

pub struct EventRuntime {
    pub event_id: String,
    pub status: RwLock<RuntimeStatus>,
    pub ring_buffer: RwLock<RingBuffer>,
    pub facts_store: RwLock<FactsStore>,
    pub glossary_cache: RwLock<Vec<crate::repo::GlossaryEntry>>,
    pub cards_last_seq: AtomicU64,
    pub facts_last_seq: AtomicU64,
    pub log: RwLock<LogRing>,
    pub cards_session: RwLock<Option<Arc<RealtimeSession>>>,
    pub facts_session: RwLock<Option<Arc<RealtimeSession>>>,
    pub facts_debounce_cancel: RwLock<Option<CancellationToken>>,
    pub cancel: CancellationToken,
    pub facts_last_update_ms: AtomicU64,
    pub created_at: i64,
}

impl EventRuntime {
    pub async fn load(
        event_id: String,
        config: &WorkerConfig,
        checkpoints: &dyn CheckpointRepository,
        glossary: &dyn GlossaryRepository,
        parent_cancel: &CancellationToken,
    ) -> Arc<Self> {
        let cards_last_seq = checkpoints.get(&event_id, AgentType::Cards).await;
        let facts_last_seq = checkpoints.get(&event_id, AgentType::Facts).await;
        let glossary_entries = glossary.load_for_event(&event_id).await;

        Arc::new(Self {
            event_id,
            status: RwLock::new(RuntimeStatus::ContextComplete),
            ring_buffer: RwLock::new(RingBuffer::new(config.ring_capacity, config.ring_window_ms)),
            facts_store: RwLock::new(FactsStore::new(config.facts_max_items, config.facts_lifecycle())),
            glossary_cache: RwLock::new(glossary_entries),
            cards_last_seq: AtomicU64::new(cards_last_seq),
            facts_last_seq: AtomicU64::new(facts_last_seq),
            log: RwLock::new(LogRing::default()),
            cards_session: RwLock::new(None),
            facts_session: RwLock::new(None),
            facts_debounce_cancel: RwLock::new(None),
            cancel: parent_cancel.child_token(),
            facts_last_update_ms: AtomicU64::new(0),
            created_at: now_ms(),
        })
    }

    pub async fn set_status(&self, status: RuntimeStatus) {
        *self.status.write().await = status;
    }

    pub async fn status(&self) -> RuntimeStatus {
        *self.status.read().await
    }

    /// Single-writer ingest entry point. Only the orchestrator's per-event
    /// dispatcher may call this.
    pub async fn ingest(
        self: &Arc<Self>,
        mut chunk: TranscriptChunk,
        config: &WorkerConfig,
        checkpoints: &dyn CheckpointRepository,
        sessions: &SessionManager,
    ) {
        if !chunk.r#final {
            return;
        }

        if chunk.seq == 0 {
            let next = self
                .cards_last_seq
                .load(Ordering::Relaxed)
                .max(self.facts_last_seq.load(Ordering::Relaxed))
                + 1;
            chunk.seq = next;
        }

        self.ring_buffer.write().await.add(chunk.clone());

        self.cards_last_seq.fetch_max(chunk.seq, Ordering::Relaxed);
        self.facts_last_seq.fetch_max(chunk.seq, Ordering::Relaxed);

        self.run_cards_path(&chunk, config, checkpoints, sessions).await;
    }

    async fn run_cards_path(
        self: &Arc<Self>,
        chunk: &TranscriptChunk,
        config: &WorkerConfig,
        checkpoints: &dyn CheckpointRepository,
        sessions: &SessionManager,
    ) {
        let facts = self.facts_store.read().await;
        let facts_vec = facts.get_all(false);
        let glossary = self.glossary_cache.read().await;
        let ctx = build_cards_context(&chunk.text, &facts_vec, &glossary, config.cards_token_budget);
        drop(facts);
        drop(glossary);

        let ratio = ctx.breakdown.total as f32 / config.cards_token_budget.max(1) as f32;
        if ratio >= 0.95 {
            self.log.write().await.push(format!("cards token budget critical: {:.0}%", ratio * 100.0));
            warn!(event_id = %self.event_id, ratio, "cards prompt near token budget");
        } else if ratio >= 0.80 {
            self.log.write().await.push(format!("cards token budget warn: {:.0}%", ratio * 100.0));
        }

        let Some(session) = sessions.get(&self.event_id, AgentType::Cards).await else {
            self.log.write().await.push("cards session unavailable, skipping dispatch".to_string());
            return;
        };

        let payload = serde_json::json!({
            "type": "cards.update",
            "bullets": ctx.bullets,
            "facts": ctx.facts,
            "glossary_context": ctx.glossary_context,
        });

        match session.send_message(payload).await {
            Ok(()) => {
                checkpoints.set(&self.event_id, AgentType::Cards, chunk.seq).await;
            }
            Err(err) => {
                self.log.write().await.push(format!("cards dispatch failed: {err}"));
            }
        }
    }

    /// Run one Facts cycle immediately (called by the orchestrator's
    /// debounce timer once the idle window elapses).
    pub async fn run_facts_path(
        self: &Arc<Self>,
        config: &WorkerConfig,
        checkpoints: &dyn CheckpointRepository,
        fact_snapshots: &dyn FactSnapshotRepository,
        sessions: &SessionManager,
    ) {
        let recent_raw = self.ring_buffer.read().await.recent_text(8000);
        let recent_text = clean_transcript(&recent_raw, 6000);
        let recent_tokens = count_tokens(&recent_text);

        let facts = self.facts_store.read().await;
        let eligible = facts.get_all(false);
        let budgeted = budget_facts(BudgeterInput {
            facts: &eligible,
            recent_transcript: &recent_text,
            total_budget_tokens: config.facts_token_budget,
            transcript_tokens: recent_tokens,
            glossary_tokens: 0,
            config: config.budgeter_config(),
        });
        let selected_keys: Vec<String> = budgeted.selected_facts.iter().map(|f| f.key.clone()).collect();
        let ctx = build_facts_context(&recent_text, &budgeted.prompt_facts, config.facts_token_budget);
        let fact_adjustments = budgeted.fact_adjustments.clone();
        let selected_metric = budgeted.metrics.selected;
        drop(facts);

        let newest_seq = self.ring_buffer.read().await.newest_seq().unwrap_or(0);

        if let Some(session) = sessions.get(&self.event_id, AgentType::Facts).await {
            let payload = serde_json::json!({
                "type": "facts.update",
                "context": ctx.context,
            });
            if session.send_message(payload).await.is_ok() {
                checkpoints.set(&self.event_id, AgentType::Facts, newest_seq).await;
                self.facts_last_seq.fetch_max(newest_seq, Ordering::Relaxed);
            } else {
                self.log.write().await.push("facts dispatch failed".to_string());
            }
        }

        let mut facts = self.facts_store.write().await;
        facts.apply_confidence_adjustments(&fact_adjustments);
        facts.apply_lifecycle(&selected_keys);
        let pruned = facts.drain_pruned_keys();
        drop(facts);
        fact_snapshots.persist_pruned(&self.event_id, &pruned).await;

        self.facts_last_update_ms.store(now_ms() as u64, Ordering::Relaxed);
        info!(event_id = %self.event_id, selected = selected_metric, "facts cycle complete");
    }

    /// Rebuild ring-buffer state from persisted transcripts after a restart,
    /// without re-dispatching to sessions.
    pub async fn replay(&self, chunks: Vec<TranscriptChunk>) {
        let mut buf = self.ring_buffer.write().await;
        let max_gap = 10_000u64;
        let mut prev_seq = buf.newest_seq();
        for chunk in chunks {
            if let Some(prev) = prev_seq {
                if chunk.seq > prev + max_gap {
                    warn!(event_id = %self.event_id, prev, next = chunk.seq, "large seq gap during replay");
                }
            }
            prev_seq = Some(chunk.seq);
            buf.add(chunk);
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
