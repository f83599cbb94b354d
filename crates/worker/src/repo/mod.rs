// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence seam: every durable shape is reached only through these
//! traits. The in-memory implementations in [`memory`] back the standalone
//! binary and every integration test; a real deployment swaps in a
//! database-backed implementation behind the same trait boundary.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ring_buffer::TranscriptChunk;

/// Which agent a checkpoint or session record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Cards,
    Facts,
    Transcript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Generated,
    Starting,
    Active,
    Paused,
    Closed,
    Error,
}

/// A persisted provider-session record for one `(event_id, agent_type)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub event_id: String,
    pub agent_type: AgentType,
    pub agent_id: String,
    pub provider_session_id: Option<String>,
    pub status: SessionStatus,
    pub model: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub closed_at: Option<i64>,
    pub connection_count: u32,
    pub last_connected_at: Option<i64>,
}

/// Durable `(event_id, agent_type) -> last_seq` map.
#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    async fn get(&self, event_id: &str, agent_type: AgentType) -> u64;
    async fn set(&self, event_id: &str, agent_type: AgentType, seq: u64);
}

#[async_trait]
pub trait SessionRecordRepository: Send + Sync {
    async fn upsert(&self, record: SessionRecord);
    async fn get(&self, event_id: &str, agent_type: AgentType) -> Option<SessionRecord>;
    async fn list_running(&self) -> Vec<SessionRecord>;
}

#[async_trait]
pub trait TranscriptRepository: Send + Sync {
    async fn list_since(&self, event_id: &str, seq: u64, limit: usize) -> Vec<TranscriptChunk>;
    async fn insert(&self, event_id: &str, chunk: TranscriptChunk);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub term: String,
    pub definition: String,
    pub category: Option<String>,
    pub confidence_score: f32,
}

#[async_trait]
pub trait GlossaryRepository: Send + Sync {
    async fn load_for_event(&self, event_id: &str) -> Vec<GlossaryEntry>;
}

/// Best-effort audit sink for pruned fact keys. Failures are logged, never
/// propagated — losing an audit record must not affect runtime correctness.
#[async_trait]
pub trait FactSnapshotRepository: Send + Sync {
    async fn persist_pruned(&self, event_id: &str, keys: &[String]);
}
