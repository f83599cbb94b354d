// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority- and token-budget-based selection of facts for the Facts prompt.

use serde::Serialize;

use crate::facts::Fact;
use crate::tokens::count_tokens;

/// Numeric thresholds governing fact selection. All tunable at startup via
/// `WorkerConfig`.
#[derive(Debug, Clone, Copy)]
pub struct BudgeterConfig {
    pub top_k: usize,
    pub safety_headroom_tokens: usize,
    pub jaccard_merge_threshold: f64,
    pub selected_confidence_bonus: f32,
    pub unselected_confidence_penalty: f32,
}

impl Default for BudgeterConfig {
    fn default() -> Self {
        Self {
            top_k: 50,
            safety_headroom_tokens: 64,
            jaccard_merge_threshold: 0.85,
            selected_confidence_bonus: 0.02,
            unselected_confidence_penalty: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeOperation {
    pub representative: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BudgetMetrics {
    pub selected: usize,
    pub total_facts: usize,
    pub summary: bool,
    pub merged_clusters: usize,
    pub overflow: usize,
    pub used_tokens: usize,
    pub budget_tokens: usize,
    pub selection_ratio: f32,
}

pub struct BudgeterInput<'a> {
    pub facts: &'a [&'a Fact],
    pub recent_transcript: &'a str,
    pub total_budget_tokens: usize,
    pub transcript_tokens: usize,
    pub glossary_tokens: usize,
    pub config: BudgeterConfig,
}

pub struct BudgeterOutput<'a> {
    pub selected_facts: Vec<&'a Fact>,
    pub prompt_facts: Vec<&'a Fact>,
    pub fact_adjustments: Vec<(String, f32)>,
    pub merge_operations: Vec<MergeOperation>,
    pub metrics: BudgetMetrics,
}

fn fact_tokens(fact: &Fact) -> usize {
    count_tokens(&format!("{}: {}", fact.key, fact.value))
}

fn key_tokens(key: &str) -> std::collections::HashSet<&str> {
    key.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).collect()
}

fn jaccard(a: &str, b: &str) -> f64 {
    let ta = key_tokens(a);
    let tb = key_tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Cluster admitted facts by key-similarity, picking the highest-confidence
/// member of each cluster as representative. Returns (representatives,
/// merge operations for the rest).
fn cluster<'a>(facts: Vec<&'a Fact>, jaccard_merge_threshold: f64) -> (Vec<&'a Fact>, Vec<MergeOperation>) {
    let mut clusters: Vec<Vec<&'a Fact>> = Vec::new();

    'outer: for fact in facts {
        for cluster in clusters.iter_mut() {
            if cluster.iter().any(|member| jaccard(&member.key, &fact.key) >= jaccard_merge_threshold) {
                cluster.push(fact);
                continue 'outer;
            }
        }
        clusters.push(vec![fact]);
    }

    let mut representatives = Vec::new();
    let mut merges = Vec::new();
    for cluster in clusters {
        let Some(rep) = cluster
            .iter()
            .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal))
            .copied()
        else {
            continue;
        };
        let members: Vec<String> =
            cluster.iter().filter(|f| f.key != rep.key).map(|f| f.key.clone()).collect();
        if !members.is_empty() {
            merges.push(MergeOperation { representative: rep.key.clone(), members });
        }
        representatives.push(rep);
    }

    (representatives, merges)
}

/// Select facts for the Facts prompt under a token budget.
pub fn budget_facts<'a>(input: BudgeterInput<'a>) -> BudgeterOutput<'a> {
    let total_facts = input.facts.len();

    let mut sorted: Vec<&Fact> = input.facts.to_vec();
    sorted.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.last_touched_at.cmp(&a.last_touched_at))
            .then_with(|| b.last_seen_seq.cmp(&a.last_seen_seq))
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    sorted.truncate(input.config.top_k);

    let available = input
        .total_budget_tokens
        .saturating_sub(input.transcript_tokens)
        .saturating_sub(input.glossary_tokens)
        .saturating_sub(input.config.safety_headroom_tokens);

    let mut admitted = Vec::new();
    let mut unadmitted = Vec::new();
    let mut running = 0usize;
    let mut overflow = 0usize;

    for fact in sorted {
        let cost = fact_tokens(fact);
        if running + cost <= available {
            running += cost;
            admitted.push(fact);
        } else {
            overflow += 1;
            unadmitted.push(fact);
        }
    }

    let (representatives, merge_operations) = cluster(admitted, input.config.jaccard_merge_threshold);
    let merged_clusters = merge_operations.len();

    let mut prompt_facts = representatives.clone();
    let summary = available > running && unadmitted.len() >= 3;
    // The summary line itself is synthesized at the prompt-rendering layer;
    // here we only report that one should be appended.

    let mut fact_adjustments = Vec::new();
    for fact in &representatives {
        fact_adjustments.push((fact.key.clone(), input.config.selected_confidence_bonus));
    }
    for fact in &unadmitted {
        fact_adjustments.push((fact.key.clone(), -input.config.unselected_confidence_penalty));
    }

    let metrics = BudgetMetrics {
        selected: representatives.len(),
        total_facts,
        summary,
        merged_clusters,
        overflow,
        used_tokens: running,
        budget_tokens: input.total_budget_tokens,
        selection_ratio: if total_facts == 0 {
            0.0
        } else {
            representatives.len() as f32 / total_facts as f32
        },
    };

    prompt_facts.retain(|f| !f.exclude_from_prompt);

    BudgeterOutput {
        selected_facts: representatives,
        prompt_facts,
        fact_adjustments,
        merge_operations,
        metrics,
    }
}

#[cfg(test)]
#[path = "budgeter_tests.rs"]
mod tests;
