use super::*;
use serde_json::json;

#[test]
fn upsert_agreement_raises_confidence_up_to_one() {
    let mut store = FactsStore::new(10, FactsLifecycleConfig::default());
    store.upsert("color", json!("blue"), 0.5, 1, None);
    store.upsert("color", json!("blue"), 0.5, 2, None);
    let fact = store.get("color").unwrap();
    assert!(fact.confidence > 0.5);
    assert!(fact.confidence <= 1.0);
}

#[test]
fn upsert_disagreement_replaces_value_and_penalizes_confidence() {
    let mut store = FactsStore::new(10, FactsLifecycleConfig::default());
    store.upsert("color", json!("blue"), 0.9, 1, None);
    store.upsert("color", json!("red"), 0.95, 2, None);
    let fact = store.get("color").unwrap();
    assert_eq!(fact.value, json!("red"));
    assert!((fact.confidence - 0.7).abs() < 1e-6);
}

#[test]
fn upsert_disagreement_confidence_floors_out() {
    let mut store = FactsStore::new(10, FactsLifecycleConfig::default());
    store.upsert("color", json!("blue"), 0.15, 1, None);
    store.upsert("color", json!("red"), 0.9, 2, None);
    let fact = store.get("color").unwrap();
    assert!((fact.confidence - 0.1).abs() < 1e-6);
}

#[test]
fn confidence_always_in_bounds() {
    let mut store = FactsStore::new(10, FactsLifecycleConfig::default());
    for i in 0..20u64 {
        store.upsert("k", json!(i % 2), 1.5, i, None);
    }
    let fact = store.get("k").unwrap();
    assert!(fact.confidence >= 0.0 && fact.confidence <= 1.0);
}

#[test]
fn bounded_capacity_evicts_lru() {
    let mut store = FactsStore::new(2, FactsLifecycleConfig::default());
    store.upsert("a", json!(1), 0.5, 1, None);
    store.upsert("b", json!(1), 0.5, 2, None);
    store.upsert("c", json!(1), 0.5, 3, None);
    assert_eq!(store.len(), 2);
    assert!(store.get_all(true).len() <= 2);
}

#[test]
fn dormant_fact_excluded_from_default_selection() {
    let mut store = FactsStore::new(10, FactsLifecycleConfig::default());
    store.upsert("k", json!(1), 0.8, 1, None);
    store.mark_dormant("k");
    assert!(store.is_dormant("k"));
    assert!(store.get_all(false).is_empty());
    assert_eq!(store.get_all(true).len(), 1);
}

#[test]
fn mark_dormant_is_idempotent() {
    let mut store = FactsStore::new(10, FactsLifecycleConfig::default());
    store.upsert("k", json!(1), 0.8, 1, None);
    store.mark_dormant("k");
    let conf_after_first = store.get("k").unwrap().confidence;
    store.mark_dormant("k");
    assert_eq!(store.get("k").unwrap().confidence, conf_after_first);
}

#[test]
fn revive_requires_hysteresis_margin() {
    let mut store = FactsStore::new(10, FactsLifecycleConfig::default());
    store.upsert("k", json!(1), 0.5, 1, None);
    store.mark_dormant("k");
    let prev = store.get("k").unwrap().confidence;
    // No confidence change yet: revival should fail.
    assert!(!store.revive_from_selection("k", Some(prev)));
    // Bump confidence past the hysteresis margin via adjustment, then retry.
    store.apply_confidence_adjustments(&[("k".to_string(), 0.2)]);
    assert!(store.revive_from_selection("k", Some(prev)));
    assert!(!store.is_dormant("k"));
}

#[test]
fn lifecycle_marks_dormant_after_miss_streak_threshold() {
    let mut store = FactsStore::new(10, FactsLifecycleConfig::default());
    store.upsert("k", json!(1), 0.8, 1, None);
    for _ in 0..5 {
        store.apply_lifecycle(&[]);
    }
    assert!(store.is_dormant("k"));
}

#[test]
fn lifecycle_resets_miss_streak_when_selected() {
    let mut store = FactsStore::new(10, FactsLifecycleConfig::default());
    store.upsert("k", json!(1), 0.8, 1, None);
    store.apply_lifecycle(&[]);
    store.apply_lifecycle(&["k".to_string()]);
    assert_eq!(store.get("k").unwrap().miss_streak, 0);
}
