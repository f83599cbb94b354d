use super::*;
use crate::facts::{FactsLifecycleConfig, FactsStore};
use serde_json::json;

fn sample_fact_store() -> FactsStore {
    let mut store = FactsStore::new(10, FactsLifecycleConfig::default());
    store.upsert("topic", json!("rust"), 0.9, 1, None);
    store
}

#[test]
fn cards_context_never_exceeds_budget() {
    let store = sample_fact_store();
    let facts: Vec<&Fact> = store.get_all(true);
    let glossary = vec![GlossaryEntry {
        term: "rust".into(),
        definition: "a systems language".into(),
        category: None,
        confidence_score: 0.9,
    }];
    let ctx = build_cards_context("a very long current utterance".repeat(50).as_str(), &facts, &glossary, 20);
    assert!(ctx.breakdown.total <= 20);
}

#[test]
fn facts_context_includes_recent_text_when_budget_allows() {
    let store = sample_fact_store();
    let facts: Vec<&Fact> = store.get_all(true);
    let ctx = build_facts_context("hello world", &facts, 1000);
    assert!(ctx.context.contains("hello world"));
    assert_eq!(ctx.recent_text, "hello world");
}

#[test]
fn facts_context_drops_whole_sections_under_tight_budget() {
    let store = sample_fact_store();
    let facts: Vec<&Fact> = store.get_all(true);
    let ctx = build_facts_context("hello world", &facts, 1);
    assert!(ctx.breakdown.total <= 1);
}
