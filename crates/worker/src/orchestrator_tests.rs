use super::*;
use crate::provider::mock::MockTransport;
use crate::repo::memory::{
    InMemoryCheckpointRepository, InMemoryFactSnapshotRepository, InMemoryGlossaryRepository,
    InMemorySessionRecordRepository, InMemoryTranscriptRepository,
};
use std::time::Duration;

fn test_config() -> WorkerConfig {
    WorkerConfig {
        host: "127.0.0.1".into(),
        worker_port: 3001,
        auth_token: None,
        supabase_url: None,
        service_role_key: None,
        openai_api_key: None,
        embed_model: "m".into(),
        chunks_polish_model: "m".into(),
        context_gen_model: "m".into(),
        glossary_model: "m".into(),
        cards_model: "m".into(),
        exa_api_key: None,
        sse_endpoint: "http://127.0.0.1:3001/events".into(),
        ring_capacity: 100,
        ring_window_ms: 0,
        facts_max_items: 50,
        facts_debounce_ms: 30,
        ping_interval_ms: 60_000,
        max_missed_pongs: 3,
        cards_token_budget: 2048,
        facts_token_budget: 2048,
        status_emit_ms: 5000,
        checkpoint_flush_ms: 30_000,
        facts_dormant_miss_streak: 5,
        facts_dormant_idle_ms: 900_000,
        facts_dormant_confidence_drop: 0.05,
        facts_revive_hysteresis: 0.05,
        facts_prune_idle_ms: 3_600_000,
        facts_mismatch_confidence_drop: 0.2,
        facts_mismatch_confidence_floor: 0.1,
        budgeter_top_k: 50,
        budgeter_safety_headroom_tokens: 64,
        budgeter_jaccard_merge_threshold: 0.85,
        budgeter_selected_confidence_bonus: 0.02,
        budgeter_unselected_confidence_penalty: 0.01,
    }
}

fn build_orchestrator() -> (Arc<Orchestrator>, Arc<InMemoryCheckpointRepository>, Arc<InMemorySessionRecordRepository>)
{
    let config = Arc::new(test_config());
    let checkpoints = Arc::new(InMemoryCheckpointRepository::default());
    let session_records = Arc::new(InMemorySessionRecordRepository::default());
    let transcripts = Arc::new(InMemoryTranscriptRepository::default());
    let glossary = Arc::new(InMemoryGlossaryRepository::default());
    let fact_snapshots = Arc::new(InMemoryFactSnapshotRepository::default());
    let transport = Arc::new(MockTransport::new());
    let sessions = Arc::new(SessionManager::new(session_records.clone(), transport));
    let shutdown = CancellationToken::new();
    let orch = Orchestrator::new(
        config,
        checkpoints.clone(),
        session_records.clone(),
        transcripts,
        glossary,
        fact_snapshots,
        sessions,
        shutdown,
    );
    (orch, checkpoints, session_records)
}

fn chunk(seq: u64, text: &str) -> TranscriptChunk {
    TranscriptChunk { seq, at_ms: seq as i64, speaker: None, text: text.into(), r#final: true, transcript_id: None }
}

#[tokio::test]
async fn start_event_is_idempotent() {
    let (orch, _checkpoints, _session_records) = build_orchestrator();
    orch.start_event("e1").await.unwrap();
    orch.start_event("e1").await.unwrap();
    assert!(orch.is_active("e1").await);
}

#[tokio::test]
async fn dispatch_to_inactive_event_is_dropped() {
    let (orch, _checkpoints, _session_records) = build_orchestrator();
    orch.dispatch_transcript("ghost", chunk(1, "hi")).await;
    assert!(!orch.is_active("ghost").await);
}

#[tokio::test]
async fn s1_simple_ingest_advances_cards_checkpoint() {
    let (orch, checkpoints, _session_records) = build_orchestrator();
    orch.start_event("e1").await.unwrap();
    orch.dispatch_transcript("e1", chunk(1, "alpha")).await;
    orch.dispatch_transcript("e1", chunk(2, "beta")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(checkpoints.get("e1", AgentType::Cards).await, 2);
}

#[tokio::test]
async fn s3_non_final_chunks_do_not_advance_checkpoints() {
    let (orch, checkpoints, _session_records) = build_orchestrator();
    orch.start_event("e1").await.unwrap();
    let mut draft = chunk(1, "partial");
    draft.r#final = false;
    orch.dispatch_transcript("e1", draft).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(checkpoints.get("e1", AgentType::Cards).await, 0);
}

#[tokio::test]
async fn pause_resume_roundtrip() {
    let (orch, _checkpoints, session_records) = build_orchestrator();
    orch.start_event("e1").await.unwrap();
    orch.pause_event("e1").await.unwrap();
    let runtime = orch.runtime("e1").await.unwrap();
    assert_eq!(runtime.status().await, RuntimeStatus::Paused);
    let record = session_records.get("e1", AgentType::Cards).await.unwrap();
    assert_eq!(record.status, SessionStatus::Paused);

    orch.resume_event("e1").await.unwrap();
    assert_eq!(runtime.status().await, RuntimeStatus::Running);
    let record = session_records.get("e1", AgentType::Cards).await.unwrap();
    assert_eq!(record.status, SessionStatus::Active);
    assert!(record.last_connected_at.is_some());
}

#[tokio::test]
async fn pause_requires_running_state() {
    let (orch, _checkpoints, _session_records) = build_orchestrator();
    orch.start_event("e1").await.unwrap();
    orch.pause_event("e1").await.unwrap();
    assert!(orch.pause_event("e1").await.is_err());
}

#[tokio::test]
async fn end_event_removes_runtime() {
    let (orch, _checkpoints, _session_records) = build_orchestrator();
    orch.start_event("e1").await.unwrap();
    orch.end_event("e1").await.unwrap();
    assert!(!orch.is_active("e1").await);
    assert!(orch.end_event("e1").await.is_err());
}
