use super::*;
use crate::facts::{FactsLifecycleConfig, FactsStore};
use serde_json::json;

fn populated_store(n: usize) -> FactsStore {
    let mut store = FactsStore::new(n + 10, FactsLifecycleConfig::default());
    for i in 0..n {
        store.upsert(&format!("fact_{i}"), json!(i), 0.5 + (i as f32 * 0.001), i as u64, None);
    }
    store
}

#[test]
fn never_exceeds_budget() {
    let store = populated_store(40);
    let facts: Vec<&Fact> = store.get_all(true);
    let output = budget_facts(BudgeterInput {
        facts: &facts,
        recent_transcript: "",
        total_budget_tokens: 200,
        transcript_tokens: 0,
        glossary_tokens: 0,
        config: BudgeterConfig::default(),
    });
    assert!(output.metrics.used_tokens <= 200);
}

#[test]
fn selected_facts_are_a_subset_of_input() {
    let store = populated_store(10);
    let facts: Vec<&Fact> = store.get_all(true);
    let output = budget_facts(BudgeterInput {
        facts: &facts,
        recent_transcript: "",
        total_budget_tokens: 1000,
        transcript_tokens: 0,
        glossary_tokens: 0,
        config: BudgeterConfig::default(),
    });
    for selected in &output.selected_facts {
        assert!(facts.iter().any(|f| f.key == selected.key));
    }
}

#[test]
fn dormant_facts_never_reach_prompt_facts() {
    let mut store = populated_store(5);
    store.mark_dormant("fact_0");
    let facts: Vec<&Fact> = store.get_all(true);
    let output = budget_facts(BudgeterInput {
        facts: &facts,
        recent_transcript: "",
        total_budget_tokens: 1000,
        transcript_tokens: 0,
        glossary_tokens: 0,
        config: BudgeterConfig::default(),
    });
    assert!(!output.prompt_facts.iter().any(|f| f.key == "fact_0"));
}

#[test]
fn zero_budget_selects_nothing() {
    let store = populated_store(5);
    let facts: Vec<&Fact> = store.get_all(true);
    let output = budget_facts(BudgeterInput {
        facts: &facts,
        recent_transcript: "",
        total_budget_tokens: 0,
        transcript_tokens: 0,
        glossary_tokens: 0,
        config: BudgeterConfig::default(),
    });
    assert!(output.selected_facts.is_empty());
    assert_eq!(output.metrics.overflow, facts.len());
}

#[test]
fn similar_keys_are_merged_into_one_representative() {
    let mut store = FactsStore::new(10, FactsLifecycleConfig::default());
    store.upsert("user_name", json!("Alice"), 0.9, 1, None);
    store.upsert("user name value", json!("Alice"), 0.6, 2, None);
    let facts: Vec<&Fact> = store.get_all(true);
    let output = budget_facts(BudgeterInput {
        facts: &facts,
        recent_transcript: "",
        total_budget_tokens: 1000,
        transcript_tokens: 0,
        glossary_tokens: 0,
        config: BudgeterConfig::default(),
    });
    assert!(output.merge_operations.len() <= 1);
}
