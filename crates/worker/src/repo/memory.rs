// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory reference implementations of the repository traits.
//!
//! These back the standalone binary's default configuration and every
//! integration test. They follow the same `Arc`-free, lock-guarded
//! `HashMap` idiom the rest of the crate uses for shared mutable state.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    AgentType, CheckpointRepository, FactSnapshotRepository, GlossaryEntry, GlossaryRepository,
    SessionRecord, SessionRecordRepository, SessionStatus, TranscriptRepository,
};
use crate::ring_buffer::TranscriptChunk;

#[derive(Default)]
pub struct InMemoryCheckpointRepository {
    table: RwLock<HashMap<(String, AgentType), u64>>,
}

#[async_trait]
impl CheckpointRepository for InMemoryCheckpointRepository {
    async fn get(&self, event_id: &str, agent_type: AgentType) -> u64 {
        *self.table.read().await.get(&(event_id.to_string(), agent_type)).unwrap_or(&0)
    }

    async fn set(&self, event_id: &str, agent_type: AgentType, seq: u64) {
        self.table.write().await.insert((event_id.to_string(), agent_type), seq);
    }
}

#[derive(Default)]
pub struct InMemorySessionRecordRepository {
    table: RwLock<HashMap<(String, AgentType), SessionRecord>>,
}

#[async_trait]
impl SessionRecordRepository for InMemorySessionRecordRepository {
    async fn upsert(&self, record: SessionRecord) {
        self.table.write().await.insert((record.event_id.clone(), record.agent_type), record);
    }

    async fn get(&self, event_id: &str, agent_type: AgentType) -> Option<SessionRecord> {
        self.table.read().await.get(&(event_id.to_string(), agent_type)).cloned()
    }

    async fn list_running(&self) -> Vec<SessionRecord> {
        self.table
            .read()
            .await
            .values()
            .filter(|r| matches!(r.status, SessionStatus::Active | SessionStatus::Starting))
            .cloned()
            .collect()
    }
}

#[derive(Default)]
pub struct InMemoryTranscriptRepository {
    table: RwLock<HashMap<String, Vec<TranscriptChunk>>>,
}

#[async_trait]
impl TranscriptRepository for InMemoryTranscriptRepository {
    async fn list_since(&self, event_id: &str, seq: u64, limit: usize) -> Vec<TranscriptChunk> {
        self.table
            .read()
            .await
            .get(event_id)
            .map(|chunks| {
                chunks.iter().filter(|c| c.seq > seq).take(limit).cloned().collect::<Vec<_>>()
            })
            .unwrap_or_default()
    }

    async fn insert(&self, event_id: &str, chunk: TranscriptChunk) {
        self.table.write().await.entry(event_id.to_string()).or_default().push(chunk);
    }
}

#[derive(Default)]
pub struct InMemoryGlossaryRepository {
    table: RwLock<HashMap<String, Vec<GlossaryEntry>>>,
}

impl InMemoryGlossaryRepository {
    pub async fn seed(&self, event_id: &str, entries: Vec<GlossaryEntry>) {
        self.table.write().await.insert(event_id.to_string(), entries);
    }
}

#[async_trait]
impl GlossaryRepository for InMemoryGlossaryRepository {
    async fn load_for_event(&self, event_id: &str) -> Vec<GlossaryEntry> {
        self.table.read().await.get(event_id).cloned().unwrap_or_default()
    }
}

#[derive(Default)]
pub struct InMemoryFactSnapshotRepository {
    pruned: RwLock<HashMap<String, Vec<String>>>,
}

#[async_trait]
impl FactSnapshotRepository for InMemoryFactSnapshotRepository {
    async fn persist_pruned(&self, event_id: &str, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        debug!(event_id, count = keys.len(), "persisting pruned fact keys");
        self.pruned.write().await.entry(event_id.to_string()).or_default().extend_from_slice(keys);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn checkpoint_roundtrip() {
        let repo = InMemoryCheckpointRepository::default();
        assert_eq!(repo.get("e1", AgentType::Cards).await, 0);
        repo.set("e1", AgentType::Cards, 42).await;
        assert_eq!(repo.get("e1", AgentType::Cards).await, 42);
        assert_eq!(repo.get("e1", AgentType::Facts).await, 0);
    }

    #[tokio::test]
    async fn transcript_list_since_filters_and_limits() {
        let repo = InMemoryTranscriptRepository::default();
        for seq in 1..=5u64 {
            repo.insert(
                "e1",
                TranscriptChunk {
                    seq,
                    at_ms: seq as i64,
                    speaker: None,
                    text: format!("chunk {seq}"),
                    r#final: true,
                    transcript_id: None,
                },
            )
            .await;
        }
        let page = repo.list_since("e1", 2, 2).await;
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].seq, 3);
        assert_eq!(page[1].seq, 4);
    }

    #[tokio::test]
    async fn glossary_seed_and_load() {
        let repo = InMemoryGlossaryRepository::default();
        repo.seed(
            "e1",
            vec![GlossaryEntry {
                term: "latency".into(),
                definition: "time to first response".into(),
                category: None,
                confidence_score: 0.9,
            }],
        )
        .await;
        assert_eq!(repo.load_for_event("e1").await.len(), 1);
        assert!(repo.load_for_event("e2").await.is_empty());
    }

    #[tokio::test]
    async fn session_record_list_running_filters_status() {
        let repo = InMemorySessionRecordRepository::default();
        repo.upsert(SessionRecord {
            event_id: "e1".into(),
            agent_type: AgentType::Cards,
            agent_id: "a1".into(),
            provider_session_id: None,
            status: SessionStatus::Active,
            model: "m".into(),
            created_at: 0,
            updated_at: 0,
            closed_at: None,
            connection_count: 1,
            last_connected_at: None,
        })
        .await;
        repo.upsert(SessionRecord {
            event_id: "e2".into(),
            agent_type: AgentType::Facts,
            agent_id: "a2".into(),
            provider_session_id: None,
            status: SessionStatus::Closed,
            model: "m".into(),
            created_at: 0,
            updated_at: 0,
            closed_at: Some(1),
            connection_count: 1,
            last_connected_at: None,
        })
        .await;
        let running = repo.list_running().await;
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].event_id, "e1");
    }
}
