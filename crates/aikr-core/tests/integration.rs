//! Integration tests exercising the full reasoning pipeline:
//! parse → submit → cycle → deliberate → snapshot, through the public API.

use std::sync::Arc;

use aikr_core::{
    AtomStore, Budget, Deliberation, DeliberationOutcome, EventLog, Memory, MemoryConfig,
    Punctuation, ReflexiveCycle, RuleRegistry, Sentence, Stamp, Term, TermOverlap, TruthValue,
    export_json, import_json, parse_lines,
};
use approx::assert_relative_eq;

const ANIMALS: &str = "\
// taxonomy
<cat --> mammal>. %1.0;0.99%
<mammal --> has-fur>. %1.0;0.99%
";

fn memory_from(text: &str) -> Memory {
    let mut memory = Memory::new(MemoryConfig::default(), Arc::new(AtomStore::new())).unwrap();
    for (line, parsed) in parse_lines(text) {
        let statement = parsed.unwrap_or_else(|e| panic!("line {line}: {e}"));
        memory
            .submit_term(
                &statement.term,
                statement.punctuation,
                statement.truth,
                None,
            )
            .unwrap();
    }
    memory
}

/// Test 1: Two premises in, deduced conclusion out.
#[test]
fn deduction_through_cycles() {
    let mut memory = memory_from(ANIMALS);
    let log = EventLog::new();
    memory.subscribe(Box::new(log.clone()));
    let registry = RuleRegistry::with_syllogisms(memory.store());
    let cycle = ReflexiveCycle::new(&registry);
    let target = memory
        .store()
        .intern_term(&Term::inheritance("cat", "has-fur"));

    let mut ran = 0;
    while memory.belief(target).is_none() && ran < 200 {
        cycle.run_once(&mut memory);
        ran += 1;
    }

    let belief = memory.belief(target).expect("conclusion derived");
    let truth = belief.truth.unwrap();
    assert_relative_eq!(truth.frequency, 1.0);
    assert_relative_eq!(truth.confidence, 0.9801, epsilon = 1e-9);
    assert_eq!(belief.stamp.evidence.len(), 2);
    assert!(memory.metrics().derived >= 1);
    assert!(log.count("cycle-complete") >= 1);
}

/// Test 2: Nothing grows past its capacity, however much goes in.
#[test]
fn capacities_hold_under_load() {
    let config = MemoryConfig {
        bag_capacity: 5,
        concept_capacity: 20,
        ..Default::default()
    };
    let mut memory = Memory::new(config, Arc::new(AtomStore::new())).unwrap();
    for i in 0..200 {
        let term = Term::inheritance(&format!("thing-{}", i % 40), &format!("kind-{}", i % 7));
        memory
            .submit_term(
                &term,
                Punctuation::Belief,
                Some(TruthValue::new(1.0, 0.9)),
                None,
            )
            .unwrap();
    }
    let registry = RuleRegistry::with_syllogisms(memory.store());
    ReflexiveCycle::new(&registry).run(&mut memory, 100);

    assert!(memory.concept_count() <= 20);
    for concept in memory.concepts() {
        assert!(concept.tasks().len() <= 5);
        assert!(concept.beliefs().len() <= 5);
    }
    assert!(memory.metrics().concepts_forgotten > 0);
}

/// Test 3: Deliberation resolves a reachable goal and feeds the host.
#[test]
fn deliberation_resolves_within_budget() {
    let mut memory = memory_from(ANIMALS);
    let log = EventLog::new();
    memory.subscribe(Box::new(log.clone()));
    let registry = RuleRegistry::with_syllogisms(memory.store());
    let relevance = TermOverlap::default();
    let goal = Sentence {
        atom: memory
            .store()
            .intern_term(&Term::inheritance("cat", "has-fur")),
        punctuation: Punctuation::Question,
        truth: None,
        budget: Budget::clamped(0.9, 0.9, 0.5),
        stamp: Stamp::fresh(memory.tick()),
    };

    let outcome = Deliberation::new(&registry, &relevance, 200).run(&mut memory, &goal);
    let DeliberationOutcome::Resolved { solution, cycles } = outcome else {
        panic!("expected a solution, got {outcome:?}");
    };
    assert!(cycles <= 200);
    assert!(solution.budget.priority >= 0.9);
    assert_eq!(memory.belief(goal.atom).unwrap().truth, solution.truth);
    assert_eq!(log.count("deliberation-resolved"), 1);
}

/// Test 4: A memory exported to JSON restores into a fresh atom store.
#[test]
fn snapshot_json_roundtrip() {
    let mut memory = memory_from(ANIMALS);
    let registry = RuleRegistry::with_syllogisms(memory.store());
    ReflexiveCycle::new(&registry).run(&mut memory, 20);

    let json = export_json(&memory.snapshot()).unwrap();
    let mut restored =
        Memory::new(MemoryConfig::default(), Arc::new(AtomStore::new())).unwrap();
    restored.restore(&import_json(&json).unwrap());

    assert_eq!(restored.concept_count(), memory.concept_count());
    assert_eq!(restored.tick(), memory.tick());
    let display = |m: &Memory| -> Vec<String> {
        m.beliefs()
            .iter()
            .map(|b| format!("{} {}", m.store().display(b.atom), b.truth.unwrap()))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect()
    };
    assert_eq!(display(&restored), display(&memory));
}

/// Test 5: The same seed and input give the same run.
#[test]
fn seeded_runs_are_reproducible() {
    let run = || {
        let mut memory = memory_from(ANIMALS);
        let registry = RuleRegistry::with_syllogisms(memory.store());
        let summary = ReflexiveCycle::new(&registry).run(&mut memory, 50);
        (summary, memory.stats().concepts, memory.stats().beliefs)
    };
    assert_eq!(run(), run());
}
