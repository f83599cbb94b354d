// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Configuration for the realtime event worker.
#[derive(Debug, Clone, clap::Parser)]
pub struct WorkerConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "WORKER_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 3001, env = "WORKER_PORT")]
    pub worker_port: u16,

    /// Bearer token for API auth. If unset, auth is disabled.
    #[arg(long, env = "WORKER_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Base URL of the persistence backend.
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Service-role credential for the persistence backend.
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY")]
    pub service_role_key: Option<String>,

    /// API key for the LLM provider.
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    /// Embedding model identifier used by upstream generation pipelines.
    #[arg(long, default_value = "text-embedding-3-small", env = "EMBED_MODEL")]
    pub embed_model: String,

    /// Model used to polish raw transcript chunks before persistence.
    #[arg(long, default_value = "gpt-4o-mini", env = "CHUNKS_POLISH_MODEL")]
    pub chunks_polish_model: String,

    /// Model used by the context-generation pipeline.
    #[arg(long, default_value = "gpt-4o-mini", env = "CONTEXT_GEN_MODEL")]
    pub context_gen_model: String,

    /// Model used by the glossary-generation pipeline.
    #[arg(long, default_value = "gpt-4o-mini", env = "GLOSSARY_MODEL")]
    pub glossary_model: String,

    /// Provider session model used by the Cards agent.
    #[arg(long, default_value = "gpt-4o-realtime-preview", env = "CARDS_MODEL")]
    pub cards_model: String,

    /// Optional API key for web-search enrichment.
    #[arg(long, env = "EXA_API_KEY")]
    pub exa_api_key: Option<String>,

    /// URL the StatusEmitter's server-sent channel is reachable at.
    #[arg(long, default_value = "http://127.0.0.1:3001/events", env = "SSE_ENDPOINT")]
    pub sse_endpoint: String,

    /// Ring buffer capacity, in finalized transcript chunks, per event.
    #[arg(long, default_value_t = 1000, env = "WORKER_RING_CAPACITY")]
    pub ring_capacity: usize,

    /// Ring buffer time window in milliseconds.
    #[arg(long, default_value_t = 300_000, env = "WORKER_RING_WINDOW_MS")]
    pub ring_window_ms: i64,

    /// Maximum number of live facts tracked per event.
    #[arg(long, default_value_t = 50, env = "WORKER_FACTS_MAX_ITEMS")]
    pub facts_max_items: usize,

    /// Facts agent debounce window in milliseconds.
    #[arg(long, default_value_t = 25_000, env = "WORKER_FACTS_DEBOUNCE_MS")]
    pub facts_debounce_ms: u64,

    /// Session ping interval in milliseconds.
    #[arg(long, default_value_t = 20_000, env = "WORKER_PING_INTERVAL_MS")]
    pub ping_interval_ms: u64,

    /// Missed pongs tolerated before a session is treated as dead.
    #[arg(long, default_value_t = 3, env = "WORKER_MAX_MISSED_PONGS")]
    pub max_missed_pongs: u32,

    /// Cards prompt token budget.
    #[arg(long, default_value_t = 2048, env = "WORKER_CARDS_TOKEN_BUDGET")]
    pub cards_token_budget: usize,

    /// Facts prompt token budget.
    #[arg(long, default_value_t = 4096, env = "WORKER_FACTS_TOKEN_BUDGET")]
    pub facts_token_budget: usize,

    /// StatusEmitter cadence in milliseconds.
    #[arg(long, default_value_t = 5000, env = "WORKER_STATUS_EMIT_MS")]
    pub status_emit_ms: u64,

    /// Periodic checkpoint-flush cadence in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "WORKER_CHECKPOINT_FLUSH_MS")]
    pub checkpoint_flush_ms: u64,

    /// Consecutive facts cycles a fact can miss selection before going dormant.
    #[arg(long, default_value_t = 5, env = "WORKER_FACTS_DORMANT_MISS_STREAK")]
    pub facts_dormant_miss_streak: u32,

    /// Idle time (ms) since last touch before an unselected fact goes dormant.
    #[arg(long, default_value_t = 900_000, env = "WORKER_FACTS_DORMANT_IDLE_MS")]
    pub facts_dormant_idle_ms: u64,

    /// Confidence penalty applied when a fact goes dormant.
    #[arg(long, default_value_t = 0.05, env = "WORKER_FACTS_DORMANT_CONFIDENCE_DROP")]
    pub facts_dormant_confidence_drop: f32,

    /// Confidence margin a dormant fact must regain over its pre-dormancy
    /// level before the budgeter may revive it.
    #[arg(long, default_value_t = 0.05, env = "WORKER_FACTS_REVIVE_HYSTERESIS")]
    pub facts_revive_hysteresis: f32,

    /// Idle time (ms) a dormant fact may sit before it is pruned outright.
    #[arg(long, default_value_t = 3_600_000, env = "WORKER_FACTS_PRUNE_IDLE_MS")]
    pub facts_prune_idle_ms: u64,

    /// Confidence penalty applied when an upsert disagrees with the stored
    /// value for a key.
    #[arg(long, default_value_t = 0.2, env = "WORKER_FACTS_MISMATCH_CONFIDENCE_DROP")]
    pub facts_mismatch_confidence_drop: f32,

    /// Floor confidence can't fall below after a mismatch.
    #[arg(long, default_value_t = 0.1, env = "WORKER_FACTS_MISMATCH_CONFIDENCE_FLOOR")]
    pub facts_mismatch_confidence_floor: f32,

    /// Maximum number of facts the budgeter ranks before applying the token
    /// budget.
    #[arg(long, default_value_t = 50, env = "WORKER_BUDGETER_TOP_K")]
    pub budgeter_top_k: usize,

    /// Tokens reserved below the facts budget as headroom for the
    /// transcript and glossary sections.
    #[arg(long, default_value_t = 64, env = "WORKER_BUDGETER_SAFETY_HEADROOM_TOKENS")]
    pub budgeter_safety_headroom_tokens: usize,

    /// Minimum key-token Jaccard similarity for two admitted facts to merge
    /// into one representative.
    #[arg(long, default_value_t = 0.85, env = "WORKER_BUDGETER_JACCARD_MERGE_THRESHOLD")]
    pub budgeter_jaccard_merge_threshold: f64,

    /// Confidence bonus applied to facts selected into the prompt.
    #[arg(long, default_value_t = 0.02, env = "WORKER_BUDGETER_SELECTED_CONFIDENCE_BONUS")]
    pub budgeter_selected_confidence_bonus: f32,

    /// Confidence penalty applied to facts left out of the prompt.
    #[arg(long, default_value_t = 0.01, env = "WORKER_BUDGETER_UNSELECTED_CONFIDENCE_PENALTY")]
    pub budgeter_unselected_confidence_penalty: f32,
}

impl WorkerConfig {
    /// Validate cross-field invariants that clap's own parsing can't express.
    ///
    /// Called once at startup; an invalid config is a fatal error before any
    /// listener is bound.
    pub fn validate(&self) -> Result<()> {
        if self.worker_port == 0 {
            bail!("worker_port must be a positive integer");
        }
        reqwest::Url::parse(&self.sse_endpoint)
            .with_context(|| format!("sse_endpoint is not a valid URL: {}", self.sse_endpoint))?;
        Ok(())
    }

    pub fn ring_window(&self) -> Duration {
        Duration::from_millis(self.ring_window_ms.max(0) as u64)
    }

    pub fn facts_debounce(&self) -> Duration {
        Duration::from_millis(self.facts_debounce_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn status_emit_interval(&self) -> Duration {
        Duration::from_millis(self.status_emit_ms)
    }

    pub fn checkpoint_flush_interval(&self) -> Duration {
        Duration::from_millis(self.checkpoint_flush_ms)
    }

    pub fn facts_lifecycle(&self) -> crate::facts::FactsLifecycleConfig {
        crate::facts::FactsLifecycleConfig {
            dormant_miss_streak: self.facts_dormant_miss_streak,
            dormant_idle: Duration::from_millis(self.facts_dormant_idle_ms),
            dormant_confidence_drop: self.facts_dormant_confidence_drop,
            revive_hysteresis: self.facts_revive_hysteresis,
            prune_idle: Duration::from_millis(self.facts_prune_idle_ms),
            mismatch_confidence_drop: self.facts_mismatch_confidence_drop,
            mismatch_confidence_floor: self.facts_mismatch_confidence_floor,
        }
    }

    pub fn budgeter_config(&self) -> crate::budgeter::BudgeterConfig {
        crate::budgeter::BudgeterConfig {
            top_k: self.budgeter_top_k,
            safety_headroom_tokens: self.budgeter_safety_headroom_tokens,
            jaccard_merge_threshold: self.budgeter_jaccard_merge_threshold,
            selected_confidence_bonus: self.budgeter_selected_confidence_bonus,
            unselected_confidence_penalty: self.budgeter_unselected_confidence_penalty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> WorkerConfig {
        WorkerConfig {
            host: "127.0.0.1".into(),
            worker_port: 3001,
            auth_token: None,
            supabase_url: None,
            service_role_key: None,
            openai_api_key: None,
            embed_model: "text-embedding-3-small".into(),
            chunks_polish_model: "gpt-4o-mini".into(),
            context_gen_model: "gpt-4o-mini".into(),
            glossary_model: "gpt-4o-mini".into(),
            cards_model: "gpt-4o-realtime-preview".into(),
            exa_api_key: None,
            sse_endpoint: "http://127.0.0.1:3001/events".into(),
            ring_capacity: 1000,
            ring_window_ms: 300_000,
            facts_max_items: 50,
            facts_debounce_ms: 25_000,
            ping_interval_ms: 20_000,
            max_missed_pongs: 3,
            cards_token_budget: 2048,
            facts_token_budget: 4096,
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

    #[test]
    fn rejects_zero_port() {
        let mut cfg = base_config();
        cfg.worker_port = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_invalid_sse_endpoint() {
        let mut cfg = base_config();
        cfg.sse_endpoint = "not a url".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }
}
