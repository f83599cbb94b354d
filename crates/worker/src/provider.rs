// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The provider-transport boundary: a streaming bidirectional connection to
//! an LLM-backed agent session. The concrete wire format is an external
//! collaborator; this crate only depends on the trait below, and a mock
//! implementation drives every test deterministically.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::WorkerError;

/// A typed event surfaced by a provider connection.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    Card(Value),
    Facts(Value),
    Log(String),
    Pong,
}

/// A live connection to one provider session. `outbound` accepts payloads to
/// send; `inbound` yields events as they arrive. Both ends are owned by the
/// `RealtimeSession` that created the connection.
pub struct ProviderConnection {
    pub session_id: String,
    pub outbound: mpsc::Sender<Value>,
    pub inbound: mpsc::Receiver<ProviderEvent>,
}

/// Opens provider sessions. One implementation per provider; tests use
/// [`mock::MockTransport`].
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn connect(&self, model: &str) -> Result<ProviderConnection, WorkerError>;
}

/// Reference in-process transport: echoes whatever is sent on `outbound`
/// back as a `Card` event, and can be told to fail the next `connect()` call
/// to exercise retry/backoff paths. Used by the standalone binary's default
/// configuration (no external provider wired) and by every test.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    pub struct MockTransport {
        pub fail_next_connects: Arc<AtomicUsize>,
        pub connect_count: Arc<AtomicUsize>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_next(&self, n: usize) {
            self.fail_next_connects.store(n, Ordering::SeqCst);
        }

        pub fn connects(&self) -> usize {
            self.connect_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderTransport for MockTransport {
        async fn connect(&self, _model: &str) -> Result<ProviderConnection, WorkerError> {
            self.connect_count.fetch_add(1, Ordering::SeqCst);
            let remaining = self.fail_next_connects.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_next_connects.fetch_sub(1, Ordering::SeqCst);
                return Err(WorkerError::TransientTransport);
            }

            let (out_tx, mut out_rx) = mpsc::channel::<Value>(32);
            let (in_tx, in_rx) = mpsc::channel::<ProviderEvent>(32);

            tokio::spawn(async move {
                while let Some(payload) = out_rx.recv().await {
                    if payload.get("type").and_then(|t| t.as_str()) == Some("ping") {
                        let _ = in_tx.send(ProviderEvent::Pong).await;
                        continue;
                    }
                    let _ = in_tx.send(ProviderEvent::Card(payload)).await;
                }
            });

            Ok(ProviderConnection {
                session_id: uuid::Uuid::new_v4().to_string(),
                outbound: out_tx,
                inbound: in_rx,
            })
        }
    }
}
