// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::orchestrator::Orchestrator;
use crate::status::StatusEmitter;

/// Shared application state handed to every axum handler.
pub struct WorkerState {
    pub config: Arc<WorkerConfig>,
    pub orchestrator: Arc<Orchestrator>,
    pub status_emitter: Arc<StatusEmitter>,
    pub shutdown: CancellationToken,
}
