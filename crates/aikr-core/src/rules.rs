//! Rule evaluation seam.
//!
//! The core hands a (task, belief) pair to a [`RuleEvaluator`] and gets raw
//! conclusions back. [`RuleRegistry`] is the stock evaluator: a keyed set of
//! [`Rule`]s that can be changed while cycles are running. Readers take a
//! snapshot of the rule map, writers swap in a new one.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::atom::{AtomId, AtomStore, INHERITANCE};
use crate::error::RuleEvaluatorFault;
use crate::sentence::{RawSentence, Sentence};
use crate::truth::TruthValue;

/// The premises of one inference step.
#[derive(Clone, Copy)]
pub struct InferenceExpression<'a> {
    pub task: &'a Sentence,
    pub belief: &'a Sentence,
    pub store: &'a AtomStore,
}

/// What one evaluation produced. Faults travel with the conclusions so that
/// concurrent callers sharing an evaluator each see only their own.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Evaluation {
    pub conclusions: Vec<RawSentence>,
    pub faults: Vec<RuleEvaluatorFault>,
}

impl Evaluation {
    pub fn conclusions(conclusions: Vec<RawSentence>) -> Self {
        Self {
            conclusions,
            faults: Vec::new(),
        }
    }

    pub fn is_faulted(&self) -> bool {
        !self.faults.is_empty()
    }
}

pub trait RuleEvaluator: Send + Sync {
    /// Conclusions for one premise pair. An evaluator that faults returns no
    /// conclusions for the faulty part and lists the fault instead.
    fn evaluate(&self, expr: &InferenceExpression<'_>) -> Evaluation;
}

pub trait Rule: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the premises have the shape this rule applies to.
    fn matches(&self, expr: &InferenceExpression<'_>) -> bool;

    fn apply(&self, expr: &InferenceExpression<'_>) -> Vec<RawSentence>;
}

type RuleMap = BTreeMap<AtomId, Arc<dyn Rule>>;

#[derive(Default)]
pub struct RuleRegistry {
    rules: RwLock<Arc<RuleMap>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the three first-order syllogisms on `-->`, keyed by
    /// the symbols `deduction`, `abduction` and `induction`.
    pub fn with_syllogisms(store: &AtomStore) -> Self {
        let registry = Self::new();
        for rule in [Syllogism::Deduction, Syllogism::Abduction, Syllogism::Induction] {
            registry.register(store.symbol(rule.name()), Arc::new(rule));
        }
        registry
    }

    /// Add or replace the rule under `key`; returns the replaced rule.
    pub fn register(&self, key: AtomId, rule: Arc<dyn Rule>) -> Option<Arc<dyn Rule>> {
        let mut guard = self.rules.write();
        let mut next = RuleMap::clone(&guard);
        let previous = next.insert(key, rule);
        *guard = Arc::new(next);
        previous
    }

    pub fn unregister(&self, key: AtomId) -> Option<Arc<dyn Rule>> {
        let mut guard = self.rules.write();
        if !guard.contains_key(&key) {
            return None;
        }
        let mut next = RuleMap::clone(&guard);
        let removed = next.remove(&key);
        *guard = Arc::new(next);
        removed
    }

    /// The rule map as of now. Later registrations do not affect it.
    pub fn rules(&self) -> Arc<RuleMap> {
        Arc::clone(&self.rules.read())
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}

impl RuleEvaluator for RuleRegistry {
    fn evaluate(&self, expr: &InferenceExpression<'_>) -> Evaluation {
        let rules = self.rules();
        let mut evaluation = Evaluation::default();
        for (key, rule) in rules.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                if rule.matches(expr) {
                    rule.apply(expr)
                } else {
                    Vec::new()
                }
            }));
            match outcome {
                Ok(derived) => evaluation.conclusions.extend(derived),
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    evaluation.faults.push(RuleEvaluatorFault(format!(
                        "rule {} ({key}) panicked: {reason}",
                        rule.name()
                    )));
                }
            }
        }
        evaluation
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// First-order syllogisms on inheritance statements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syllogism {
    /// `S→M, M→P ⊢ S→P`
    Deduction,
    /// `P→M, S→M ⊢ S→P`
    Abduction,
    /// `M→P, M→S ⊢ S→P`
    Induction,
}

impl Syllogism {
    /// Conclusion `(subject, predicate, truth)` for the ordered premises.
    fn conclude(
        self,
        (s1, p1, t1): Premise,
        (s2, p2, t2): Premise,
    ) -> Option<Premise> {
        let conclusion = match self {
            Syllogism::Deduction if p1 == s2 => (s1, p2, t1.deduction(&t2)),
            Syllogism::Abduction if p1 == p2 => (s2, s1, t1.abduction(&t2)),
            Syllogism::Induction if s1 == s2 => (p2, p1, t1.induction(&t2)),
            _ => return None,
        };
        (conclusion.0 != conclusion.1).then_some(conclusion)
    }
}

type Premise = (AtomId, AtomId, TruthValue);

/// Both premises as inheritance beliefs, task first.
fn premises(expr: &InferenceExpression<'_>) -> Option<(Premise, Premise)> {
    Some((
        inheritance(expr.store, expr.task)?,
        inheritance(expr.store, expr.belief)?,
    ))
}

fn inheritance(store: &AtomStore, sentence: &Sentence) -> Option<(AtomId, AtomId, TruthValue)> {
    if !sentence.is_belief() {
        return None;
    }
    let truth = sentence.truth?;
    match store.as_statement(sentence.atom)? {
        (copula, subject, predicate) if copula == INHERITANCE => Some((subject, predicate, truth)),
        _ => None,
    }
}

impl Rule for Syllogism {
    fn name(&self) -> &str {
        match self {
            Syllogism::Deduction => "deduction",
            Syllogism::Abduction => "abduction",
            Syllogism::Induction => "induction",
        }
    }

    fn matches(&self, expr: &InferenceExpression<'_>) -> bool {
        premises(expr).is_some_and(|(a, b)| {
            self.conclude(a, b).is_some() || self.conclude(b, a).is_some()
        })
    }

    fn apply(&self, expr: &InferenceExpression<'_>) -> Vec<RawSentence> {
        let Some((a, b)) = premises(expr) else {
            return Vec::new();
        };
        [(a, b), (b, a)]
            .into_iter()
            .filter_map(|(first, second)| self.conclude(first, second))
            .map(|(subject, predicate, truth)| {
                RawSentence::belief(expr.store.statement(INHERITANCE, subject, predicate), truth)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::Budget;
    use crate::stamp::Stamp;
    use approx::assert_relative_eq;

    fn belief(store: &AtomStore, s: &str, p: &str, f: f64, c: f64) -> Sentence {
        let atom = store.statement(INHERITANCE, store.symbol(s), store.symbol(p));
        Sentence {
            atom,
            punctuation: crate::sentence::Punctuation::Belief,
            truth: Some(TruthValue::new(f, c)),
            budget: Budget::clamped(0.8, 0.8, 0.8),
            stamp: Stamp::fresh(0),
        }
    }

    fn pair<'a>(
        store: &'a AtomStore,
        task: &'a Sentence,
        belief: &'a Sentence,
    ) -> InferenceExpression<'a> {
        InferenceExpression {
            task,
            belief,
            store,
        }
    }

    #[test]
    fn test_deduction() {
        let store = AtomStore::new();
        let task = belief(&store, "cat", "mammal", 1.0, 0.99);
        let b = belief(&store, "mammal", "has-fur", 1.0, 0.99);
        let expr = InferenceExpression {
            task: &task,
            belief: &b,
            store: &store,
        };
        let out = Syllogism::Deduction.apply(&expr);
        assert_eq!(out.len(), 1);
        assert_eq!(store.display(out[0].atom), "<cat --> has-fur>");
        assert_relative_eq!(out[0].truth.unwrap().confidence, 0.9801, epsilon = 1e-9);
    }

    #[test]
    fn test_induction_and_abduction_shapes() {
        let store = AtomStore::new();
        let swan_bird = belief(&store, "swan", "bird", 1.0, 0.9);
        let swan_white = belief(&store, "swan", "white", 1.0, 0.9);
        let expr = InferenceExpression {
            task: &swan_bird,
            belief: &swan_white,
            store: &store,
        };
        let induced: Vec<String> = Syllogism::Induction
            .apply(&expr)
            .iter()
            .map(|r| store.display(r.atom))
            .collect();
        assert_eq!(induced, vec!["<white --> bird>", "<bird --> white>"]);
        assert!(Syllogism::Abduction.apply(&expr).is_empty());
        assert!(Syllogism::Deduction.apply(&expr).is_empty());
    }

    struct Exploding;

    impl Rule for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn matches(&self, _: &InferenceExpression<'_>) -> bool {
            true
        }

        fn apply(&self, _: &InferenceExpression<'_>) -> Vec<RawSentence> {
            panic!("boom")
        }
    }

    #[test]
    fn test_registry_isolates_rule_panics() {
        let store = AtomStore::new();
        let registry = RuleRegistry::with_syllogisms(&store);
        assert_eq!(registry.len(), 3);
        registry.register(store.symbol("exploding"), Arc::new(Exploding));

        let task = belief(&store, "cat", "mammal", 1.0, 0.9);
        let b = belief(&store, "mammal", "animal", 1.0, 0.9);
        let expr = InferenceExpression {
            task: &task,
            belief: &b,
            store: &store,
        };
        let out = registry.evaluate(&expr);
        assert_eq!(out.conclusions.len(), 1);
        assert_eq!(out.faults.len(), 1);
        assert!(out.faults[0].0.contains("boom"));

        // Each evaluation reports only its own faults.
        registry.unregister(store.symbol("exploding"));
        assert!(!registry.evaluate(&expr).is_faulted());
    }

    /// Never matches; applying it would panic.
    struct Picky;

    impl Rule for Picky {
        fn name(&self) -> &str {
            "picky"
        }

        fn matches(&self, _: &InferenceExpression<'_>) -> bool {
            false
        }

        fn apply(&self, _: &InferenceExpression<'_>) -> Vec<RawSentence> {
            panic!("applied without a match")
        }
    }

    #[test]
    fn test_non_matching_rule_is_never_applied() {
        let store = AtomStore::new();
        let registry = RuleRegistry::with_syllogisms(&store);
        registry.register(store.symbol("picky"), Arc::new(Picky));

        let task = belief(&store, "cat", "mammal", 1.0, 0.9);
        let b = belief(&store, "mammal", "animal", 1.0, 0.9);
        let expr = InferenceExpression {
            task: &task,
            belief: &b,
            store: &store,
        };
        let out = registry.evaluate(&expr);
        assert!(!out.is_faulted());
        assert_eq!(out.conclusions.len(), 1);
    }

    #[test]
    fn test_syllogism_matches_premise_shape() {
        let store = AtomStore::new();
        let cat_mammal = belief(&store, "cat", "mammal", 1.0, 0.9);
        let mammal_animal = belief(&store, "mammal", "animal", 1.0, 0.9);
        let rock_hard = belief(&store, "rock", "hard", 1.0, 0.9);

        assert!(Syllogism::Deduction.matches(&pair(&store, &cat_mammal, &mammal_animal)));
        assert!(Syllogism::Deduction.matches(&pair(&store, &mammal_animal, &cat_mammal)));
        assert!(!Syllogism::Induction.matches(&pair(&store, &cat_mammal, &mammal_animal)));
        assert!(!Syllogism::Deduction.matches(&pair(&store, &cat_mammal, &rock_hard)));

        let mut question = cat_mammal.clone();
        question.punctuation = crate::sentence::Punctuation::Question;
        question.truth = None;
        assert!(!Syllogism::Deduction.matches(&pair(&store, &question, &mammal_animal)));
    }

    #[test]
    fn test_rule_snapshot_survives_updates() {
        let store = AtomStore::new();
        let registry = RuleRegistry::with_syllogisms(&store);
        let before = registry.rules();
        registry.unregister(store.symbol("induction"));
        assert_eq!(before.len(), 3);
        assert_eq!(registry.len(), 2);
        assert!(registry.unregister(store.symbol("nothing")).is_none());
    }
}
