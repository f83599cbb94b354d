// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event worker: per-event realtime assistance runtime.

pub mod budgeter;
pub mod config;
pub mod context;
pub mod error;
pub mod facts;
pub mod filter;
pub mod orchestrator;
pub mod provider;
pub mod repo;
pub mod ring_buffer;
pub mod runtime;
pub mod session;
pub mod session_manager;
pub mod state;
pub mod status;
pub mod tokens;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::orchestrator::Orchestrator;
use crate::provider::mock::MockTransport;
use crate::repo::memory::{
    InMemoryCheckpointRepository, InMemoryFactSnapshotRepository, InMemoryGlossaryRepository,
    InMemorySessionRecordRepository, InMemoryTranscriptRepository,
};
use crate::session_manager::SessionManager;
use crate::state::WorkerState;
use crate::status::{spawn_status_emitter, StatusEmitter};
use crate::transport::build_router;

/// Run the event worker until shutdown.
pub async fn run(config: WorkerConfig) -> anyhow::Result<()> {
    config.validate()?;

    let addr = format!("{}:{}", config.host, config.worker_port);
    let shutdown = CancellationToken::new();
    let config = Arc::new(config);

    let checkpoints = Arc::new(InMemoryCheckpointRepository::default());
    let session_records = Arc::new(InMemorySessionRecordRepository::default());
    let transcripts = Arc::new(InMemoryTranscriptRepository::default());
    let glossary = Arc::new(InMemoryGlossaryRepository::default());
    let fact_snapshots = Arc::new(InMemoryFactSnapshotRepository::default());
    let transport = Arc::new(MockTransport::new());
    let sessions = Arc::new(SessionManager::new(session_records.clone(), transport));

    let orchestrator = Orchestrator::new(
        Arc::clone(&config),
        checkpoints,
        session_records,
        transcripts,
        glossary,
        fact_snapshots,
        sessions,
        shutdown.clone(),
    );
    orchestrator.recover().await;
    orchestrator.spawn_periodic_tasks();

    let status_emitter = Arc::new(StatusEmitter::default());
    spawn_status_emitter(
        Arc::clone(&orchestrator),
        Arc::clone(&status_emitter),
        config.status_emit_interval(),
        shutdown.clone(),
    );

    let state = Arc::new(WorkerState {
        config: Arc::clone(&config),
        orchestrator: Arc::clone(&orchestrator),
        status_emitter,
        shutdown: shutdown.clone(),
    });

    tracing::info!(%addr, "event worker listening");
    let router = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    orchestrator.shutdown().await;
    Ok(())
}
