// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/audio/stream`: an optional WebSocket front door that frames inbound
//! audio into transcript chunks and forwards them into the same dispatch
//! path as the transcript change-stream. No codec decoding happens here;
//! audio bytes are carried opaquely, base64-tagged with their encoding.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use base64::Engine;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ring_buffer::TranscriptChunk;
use crate::state::WorkerState;

const SUPPORTED_CODECS: [&str; 2] = ["webm_opus", "pcm_s16le"];

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlFrame {
    Start {
        #[allow(dead_code)]
        client: Option<String>,
        codec: String,
        event_id: String,
        sample_rate: Option<u32>,
        bytes_per_sample: Option<u32>,
        speaker: Option<String>,
    },
    Stop,
}

#[derive(Debug, Serialize)]
struct Ack {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Ack {
    fn ok(message: &str) -> Self {
        Self { ok: true, message: Some(message.to_string()), error: None }
    }

    fn err(error: &str) -> Self {
        Self { ok: false, message: None, error: Some(error.to_string()) }
    }
}

struct StartedSession {
    event_id: String,
    sample_rate: u32,
    bytes_per_sample: u32,
    encoding: String,
    speaker: Option<String>,
}

pub async fn audio_stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WorkerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_audio_socket(socket, state))
}

async fn handle_audio_socket(socket: WebSocket, state: Arc<WorkerState>) {
    let (mut sink, mut stream) = socket.split();

    let welcome = serde_json::json!({"ok": true, "message": "Connected to audio stream"});
    if sink.send(Message::Text(welcome.to_string().into())).await.is_err() {
        return;
    }

    let mut session: Option<StartedSession> = None;
    let seq = AtomicU64::new(0);
    let mut chunk_count: u64 = 0;

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ControlFrame>(&text) {
                Ok(ControlFrame::Start { codec, event_id, sample_rate, bytes_per_sample, speaker, .. }) => {
                    if !SUPPORTED_CODECS.contains(&codec.as_str()) {
                        let ack = Ack::err(&format!("unsupported codec: {codec}"));
                        if send_ack(&mut sink, &ack).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    session = Some(StartedSession {
                        event_id,
                        sample_rate: sample_rate.unwrap_or(16_000),
                        bytes_per_sample: bytes_per_sample.unwrap_or(2),
                        encoding: codec,
                        speaker,
                    });
                    if send_ack(&mut sink, &Ack::ok("Session started")).await.is_err() {
                        break;
                    }
                }
                Ok(ControlFrame::Stop) => {
                    if let Some(active) = session.take() {
                        emit_chunk(&state, &active, &seq, Vec::new(), true).await;
                    }
                    break;
                }
                Err(err) => {
                    if send_ack(&mut sink, &Ack::err(&format!("malformed control frame: {err}")))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            },
            Message::Binary(bytes) => {
                let Some(active) = session.as_ref() else {
                    let ack = Ack::err("binary frame received before start");
                    if send_ack(&mut sink, &ack).await.is_err() {
                        break;
                    }
                    continue;
                };
                chunk_count += 1;
                if chunk_count % 10 == 0 {
                    debug!(event_id = %active.event_id, chunk_count, "audio chunk received");
                }
                emit_chunk(&state, active, &seq, bytes.to_vec(), false).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

async fn send_ack(
    sink: &mut SplitSink<WebSocket, Message>,
    ack: &Ack,
) -> Result<(), axum::Error> {
    let body = serde_json::to_string(ack).unwrap_or_else(|_| "{\"ok\":false}".to_string());
    sink.send(Message::Text(body.into())).await
}

async fn emit_chunk(
    state: &Arc<WorkerState>,
    active: &StartedSession,
    seq: &AtomicU64,
    audio: Vec<u8>,
    is_final: bool,
) {
    let seq_value = seq.fetch_add(1, Ordering::Relaxed);
    let audio_base64 = base64::engine::general_purpose::STANDARD.encode(&audio);
    let duration_ms = if active.bytes_per_sample == 0 || active.sample_rate == 0 {
        0
    } else {
        let samples = audio.len() as u64 / active.bytes_per_sample as u64;
        (samples * 1000) / active.sample_rate as u64
    };

    let text = serde_json::json!({
        "audio_base64": audio_base64,
        "seq": seq_value,
        "is_final": is_final,
        "sample_rate": active.sample_rate,
        "bytes_per_sample": active.bytes_per_sample,
        "encoding": active.encoding,
        "duration_ms": duration_ms,
        "speaker": active.speaker,
    })
    .to_string();

    let chunk = TranscriptChunk {
        seq: seq_value,
        at_ms: 0,
        speaker: active.speaker.clone(),
        text,
        r#final: is_final,
        transcript_id: None,
    };
    state.orchestrator.dispatch_transcript(&active.event_id, chunk).await;
}
