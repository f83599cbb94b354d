// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded, confidence-weighted fact store with dormancy and pruning.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

/// A single rolling structured fact extracted from transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fact {
    pub key: String,
    pub value: Value,
    pub confidence: f32,
    pub last_seen_seq: u64,
    pub sources: Vec<u64>,
    pub created_at: i64,
    pub last_touched_at: i64,
    pub miss_streak: u32,
    pub dormant_at: Option<i64>,
    pub exclude_from_prompt: bool,
}

const MAX_SOURCES: usize = 10;

/// Numeric thresholds governing fact dormancy, revival, and pruning. All
/// tunable at startup via `WorkerConfig`.
#[derive(Debug, Clone, Copy)]
pub struct FactsLifecycleConfig {
    pub dormant_miss_streak: u32,
    pub dormant_idle: Duration,
    pub dormant_confidence_drop: f32,
    pub revive_hysteresis: f32,
    pub prune_idle: Duration,
    pub mismatch_confidence_drop: f32,
    pub mismatch_confidence_floor: f32,
}

impl Default for FactsLifecycleConfig {
    fn default() -> Self {
        Self {
            dormant_miss_streak: 5,
            dormant_idle: Duration::from_secs(15 * 60),
            dormant_confidence_drop: 0.05,
            revive_hysteresis: 0.05,
            prune_idle: Duration::from_secs(60 * 60),
            mismatch_confidence_drop: 0.2,
            mismatch_confidence_floor: 0.1,
        }
    }
}

/// Bounded `key -> Fact` mapping, evicting the least-recently-touched entry
/// once `max_items` is exceeded.
pub struct FactsStore {
    max_items: usize,
    facts: HashMap<String, Fact>,
    pruned_keys: Vec<String>,
    lifecycle: FactsLifecycleConfig,
}

impl FactsStore {
    pub fn new(max_items: usize, lifecycle: FactsLifecycleConfig) -> Self {
        Self { max_items: max_items.max(1), facts: HashMap::new(), pruned_keys: Vec::new(), lifecycle }
    }

    /// Insert or merge a fact observation.
    ///
    /// On agreement (same `value`), confidence climbs toward 1.0 and the
    /// miss streak resets. On disagreement, the new value replaces the old
    /// one but confidence takes a penalty rather than adopting the caller's
    /// incoming reading outright.
    pub fn upsert(&mut self, key: &str, value: Value, confidence_in: f32, seq: u64, source: Option<u64>) {
        let now = now_ms();
        if let Some(existing) = self.facts.get_mut(key) {
            if existing.value == value {
                existing.confidence = (existing.confidence.max(confidence_in) + 0.1).min(1.0);
            } else {
                existing.value = value;
                existing.confidence = (existing.confidence - self.lifecycle.mismatch_confidence_drop)
                    .max(self.lifecycle.mismatch_confidence_floor);
            }
            existing.last_seen_seq = seq;
            existing.last_touched_at = now;
            existing.miss_streak = 0;
            existing.dormant_at = None;
            existing.exclude_from_prompt = false;
            if let Some(src) = source {
                if !existing.sources.contains(&src) {
                    existing.sources.push(src);
                    if existing.sources.len() > MAX_SOURCES {
                        existing.sources.remove(0);
                    }
                }
            }
            return;
        }

        if self.facts.len() >= self.max_items {
            self.evict_lru();
        }

        self.facts.insert(
            key.to_string(),
            Fact {
                key: key.to_string(),
                value,
                confidence: confidence_in.clamp(0.0, 1.0),
                last_seen_seq: seq,
                sources: source.into_iter().collect(),
                created_at: now,
                last_touched_at: now,
                miss_streak: 0,
                dormant_at: None,
                exclude_from_prompt: false,
            },
        );
    }

    fn evict_lru(&mut self) {
        if let Some(lru_key) =
            self.facts.values().min_by_key(|f| f.last_touched_at).map(|f| f.key.clone())
        {
            self.facts.remove(&lru_key);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Fact> {
        self.facts.get(key)
    }

    pub fn is_dormant(&self, key: &str) -> bool {
        self.facts.get(key).is_some_and(|f| f.dormant_at.is_some())
    }

    pub fn get_all(&self, include_excluded: bool) -> Vec<&Fact> {
        self.facts.values().filter(|f| include_excluded || !f.exclude_from_prompt).collect()
    }

    /// Mark a fact dormant: stops appearing in prompts, confidence drops.
    /// Idempotent — calling twice in a row has the effect of calling once.
    pub fn mark_dormant(&mut self, key: &str) {
        let now = now_ms();
        if let Some(fact) = self.facts.get_mut(key) {
            if fact.dormant_at.is_some() {
                return;
            }
            fact.dormant_at = Some(now);
            fact.confidence = (fact.confidence - self.lifecycle.dormant_confidence_drop).max(0.0);
            fact.exclude_from_prompt = true;
        }
    }

    /// Revive a dormant fact if its confidence has recovered past the
    /// hysteresis threshold relative to where it was before going dormant.
    pub fn revive_from_selection(&mut self, key: &str, prev_confidence: Option<f32>) -> bool {
        let now = now_ms();
        let Some(fact) = self.facts.get_mut(key) else { return false };
        if fact.dormant_at.is_none() {
            return false;
        }
        if fact.confidence >= prev_confidence.unwrap_or(0.0) + self.lifecycle.revive_hysteresis {
            fact.dormant_at = None;
            fact.exclude_from_prompt = false;
            fact.last_touched_at = now;
            true
        } else {
            false
        }
    }

    /// Mark a fact pruned: excluded from prompts and queued for the
    /// pruned-keys audit drain.
    pub fn prune(&mut self, key: &str) {
        if let Some(fact) = self.facts.get_mut(key) {
            fact.exclude_from_prompt = true;
        }
        self.pruned_keys.push(key.to_string());
    }

    pub fn drain_pruned_keys(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pruned_keys)
    }

    /// Apply post-budgeting confidence adjustments: `(key, delta)` pairs.
    pub fn apply_confidence_adjustments(&mut self, adjustments: &[(String, f32)]) {
        for (key, delta) in adjustments {
            if let Some(fact) = self.facts.get_mut(key) {
                fact.confidence = (fact.confidence + delta).clamp(0.0, 1.0);
            }
        }
    }

    /// Run the miss-streak / dormancy / prune lifecycle transitions for one
    /// Facts cycle. `selected_keys` are the facts the budgeter admitted into
    /// this cycle's prompt.
    pub fn apply_lifecycle(&mut self, selected_keys: &[String]) {
        let now = now_ms();
        let selected: std::collections::HashSet<&str> =
            selected_keys.iter().map(String::as_str).collect();

        let mut to_mark_dormant = Vec::new();
        let mut to_prune = Vec::new();

        for fact in self.facts.values_mut() {
            if selected.contains(fact.key.as_str()) {
                fact.miss_streak = 0;
                continue;
            }

            if fact.dormant_at.is_some() {
                let idle = Duration::from_millis((now - fact.dormant_at.unwrap_or(now)).max(0) as u64);
                if idle >= self.lifecycle.prune_idle {
                    to_prune.push(fact.key.clone());
                }
                continue;
            }

            fact.miss_streak += 1;
            let idle = Duration::from_millis((now - fact.last_touched_at).max(0) as u64);
            if fact.miss_streak >= self.lifecycle.dormant_miss_streak || idle >= self.lifecycle.dormant_idle {
                to_mark_dormant.push(fact.key.clone());
            }
        }

        for key in to_mark_dormant {
            self.mark_dormant(&key);
        }
        for key in to_prune {
            self.prune(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

#[cfg(test)]
#[path = "facts_tests.rs"]
mod tests;
