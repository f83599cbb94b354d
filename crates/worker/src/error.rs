// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error taxonomy for the event worker.
///
/// Each variant has a distinct propagation policy: transient and protocol
/// errors are logged and absorbed by the component that raised them;
/// state-transition and request errors surface to the API caller; checkpoint
/// and fatal errors escalate a runtime to `error` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerError {
    Unauthorized,
    BadRequest,
    EventNotFound,
    StateTransitionIllegal,
    TransientTransport,
    Backpressure,
    ProviderProtocol,
    Checkpoint,
    Internal,
}

impl WorkerError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::BadRequest => 400,
            Self::EventNotFound => 404,
            Self::StateTransitionIllegal => 409,
            Self::TransientTransport => 503,
            Self::Backpressure => 429,
            Self::ProviderProtocol => 502,
            Self::Checkpoint => 500,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::EventNotFound => "EVENT_NOT_FOUND",
            Self::StateTransitionIllegal => "STATE_TRANSITION_ILLEGAL",
            Self::TransientTransport => "TRANSIENT_TRANSPORT",
            Self::Backpressure => "BACKPRESSURE",
            Self::ProviderProtocol => "PROVIDER_PROTOCOL",
            Self::Checkpoint => "CHECKPOINT",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for WorkerError {}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
