//! Control-Sequence Generator Tests
//!
//! Cross-product size, balancing, reserved factors, and determinism.

use std::collections::HashMap;

use expctl::control::{Design, Factor};
use expctl::trial::TrialDescriptor;
use expctl::Error;
use serde_json::json;

fn key(trial: &TrialDescriptor) -> String {
    serde_json::to_string(trial.factors()).unwrap()
}

#[test]
fn test_two_by_two_twice() {
    let design = Design::builder(2)
        .factor("a", [1, 2])
        .factor("b", ["x", "y"])
        .build();

    let sequence = design.generate_seeded(2024).unwrap();
    assert_eq!(sequence.len(), 8);

    let mut counts: HashMap<String, usize> = HashMap::new();
    for trial in &sequence {
        *counts.entry(key(trial)).or_default() += 1;
    }

    assert_eq!(counts.len(), 4);
    for (a, b) in [(1, "x"), (1, "y"), (2, "x"), (2, "y")] {
        let cell = TrialDescriptor::new().with_factor("a", a).with_factor("b", b);
        assert_eq!(counts[&key(&cell)], 2, "cell a={a} b={b}");
    }
}

#[test]
fn test_different_seeds_permute_same_multiset() {
    let design = Design::builder(3).factor("stim", ["a.png", "b.png", "c.png"]).build();

    let mut first: Vec<String> = design.generate_seeded(1).unwrap().iter().map(key).collect();
    let mut second: Vec<String> = design.generate_seeded(2).unwrap().iter().map(key).collect();
    first.sort();
    second.sort();

    assert_eq!(first, second);
}

#[test]
fn test_unseeded_generation_has_full_length() {
    let design = Design::builder(4).factor("coherence", [0.5, 0.25]).build();
    let sequence = design.generate(&mut rand::thread_rng()).unwrap();
    assert_eq!(sequence.len(), 8);
}

#[test]
fn test_unshuffled_blocks_repeat_in_order() {
    let design = Design::builder(2)
        .factor("coherence", [0.5, 0.25])
        .shuffled(false)
        .build();

    let levels: Vec<_> = design
        .generate_seeded(0)
        .unwrap()
        .iter()
        .map(|t| t.factor("coherence").cloned().unwrap())
        .collect();

    assert_eq!(levels, vec![json!(0.5), json!(0.25), json!(0.5), json!(0.25)]);
}

#[test]
fn test_structured_levels() {
    let design = Design::builder(1)
        .factor("ratio", [json!([0, 1]), json!([1, 1])])
        .build();

    let sequence = design.generate_seeded(5).unwrap();
    assert_eq!(sequence.len(), 2);
    assert!(sequence
        .iter()
        .all(|t| t.factor("ratio").is_some_and(serde_json::Value::is_array)));
}

#[test]
fn test_duplicate_levels_produce_duplicates() {
    let design = Design::builder(1).factor("a", [1, 1, 2]).build();
    let sequence = design.generate_seeded(5).unwrap();
    let ones = sequence
        .iter()
        .filter(|t| t.factor("a") == Some(&json!(1)))
        .count();
    assert_eq!(ones, 2);
}

#[test]
fn test_reserved_factor_controls_count_only() {
    let design = Design::builder(2)
        .with(Factor::new("stim", ["tree.png", "banana.png"]))
        .with(Factor::new("_t", 0..10))
        .build();

    assert!(design.factors()[1].is_reserved());
    let sequence = design.generate_seeded(8).unwrap();
    assert_eq!(sequence.len(), 40);
    assert!(sequence.iter().all(|t| t.factors().len() == 1));
}

#[test]
fn test_empty_factor_is_invalid_design() {
    let design = Design::builder(2)
        .factor("a", [1])
        .factor("b", Vec::<String>::new())
        .build();

    let err = design.generate_seeded(0).unwrap_err();
    assert!(matches!(err, Error::InvalidDesign(_)));
    assert!(err.to_string().contains("'b'"));
}

#[test]
fn test_design_serialization() {
    let design = Design::builder(10)
        .factor("coherence", [0.5, 0.25])
        .shuffled(false)
        .build();

    let json = serde_json::to_string(&design).unwrap();
    let back: Design = serde_json::from_str(&json).unwrap();
    assert_eq!(back, design);
}
