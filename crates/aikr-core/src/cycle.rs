//! The reflexive reasoning cycle.
//!
//! One cycle moves through
//! `SelectConcept → SelectTask → SelectBelief → Dispatch → Integrate → Housekeep`.
//! A cycle that cannot proceed aborts back to idle; housekeeping still runs,
//! so time passes and attention decays even when nothing is derived.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::atom::AtomId;
use crate::error::RuleEvaluatorFault;
use crate::event::Event;
use crate::memory::Memory;
use crate::rules::{Evaluation, InferenceExpression, RuleEvaluator, panic_message};
use crate::sentence::Sentence;
use crate::stamp::Stamp;
use crate::truth::TruthValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    SelectConcept,
    SelectTask,
    SelectBelief,
    Dispatch,
    Integrate,
    Housekeep,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    NoConcept,
    NoTask,
    NoBelief,
    /// Task and belief share evidence; combining them would be circular.
    EvidenceOverlap(u64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed {
        concept: AtomId,
        derived: usize,
        /// The evaluator reported at least one fault.
        faulted: bool,
    },
    Aborted {
        phase: CyclePhase,
        reason: AbortReason,
    },
}

impl CycleOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CycleOutcome::Completed { .. })
    }
}

/// Totals over several cycles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub completed: u32,
    pub aborted: u32,
    pub derived: usize,
}

pub struct ReflexiveCycle<'a> {
    evaluator: &'a dyn RuleEvaluator,
}

impl<'a> ReflexiveCycle<'a> {
    pub fn new(evaluator: &'a dyn RuleEvaluator) -> Self {
        Self { evaluator }
    }

    /// Run one cycle: drain grounded results, reason, then housekeep.
    pub fn run_once(&self, memory: &mut Memory) -> CycleOutcome {
        memory.drain_grounding();
        let outcome = self.reason(memory);
        memory.housekeeping();

        memory.metrics_mut().cycles += 1;
        match &outcome {
            CycleOutcome::Completed { derived, .. } => {
                memory.emit(Event::CycleComplete {
                    memory: memory.id(),
                    tick: memory.tick(),
                    derived: *derived,
                });
            }
            CycleOutcome::Aborted { phase, reason } => {
                memory.metrics_mut().aborted += 1;
                tracing::trace!("cycle aborted in {phase:?}: {reason:?}");
            }
        }
        outcome
    }

    pub fn run(&self, memory: &mut Memory, cycles: u32) -> CycleSummary {
        let mut summary = CycleSummary::default();
        for _ in 0..cycles {
            match self.run_once(memory) {
                CycleOutcome::Completed { derived, .. } => {
                    summary.completed += 1;
                    summary.derived += derived;
                }
                CycleOutcome::Aborted { .. } => summary.aborted += 1,
            }
        }
        tracing::debug!(
            "{} cycles: {} completed, {} derived",
            cycles,
            summary.completed,
            summary.derived
        );
        summary
    }

    fn reason(&self, memory: &mut Memory) -> CycleOutcome {
        let abort = |phase, reason| CycleOutcome::Aborted { phase, reason };

        let Some(concept) = memory.select_concept() else {
            return abort(CyclePhase::SelectConcept, AbortReason::NoConcept);
        };
        let Some(task) = memory.select_task(concept) else {
            return abort(CyclePhase::SelectTask, AbortReason::NoTask);
        };
        let Some(belief) = memory.select_belief(concept, &task) else {
            return abort(CyclePhase::SelectBelief, AbortReason::NoBelief);
        };
        let stamp = match Stamp::merge(
            &[&task.stamp, &belief.stamp],
            memory.config().evidence_cap,
            memory.tick(),
        ) {
            Ok(stamp) => stamp,
            Err(overlap) => {
                memory.metrics_mut().redundant_derivations_avoided += 1;
                return abort(
                    CyclePhase::SelectBelief,
                    AbortReason::EvidenceOverlap(overlap.shared),
                );
            }
        };

        // Dispatch
        let store = Arc::clone(memory.store());
        let expr = InferenceExpression {
            task: &task,
            belief: &belief,
            store: &store,
        };
        let evaluation =
            match panic::catch_unwind(AssertUnwindSafe(|| self.evaluator.evaluate(&expr))) {
                Ok(evaluation) => evaluation,
                Err(payload) => Evaluation {
                    conclusions: Vec::new(),
                    faults: vec![RuleEvaluatorFault(panic_message(payload.as_ref()))],
                },
            };
        let faulted = evaluation.is_faulted();
        for fault in evaluation.faults {
            memory.record_evaluator_fault(fault);
        }
        let conclusions = evaluation.conclusions;

        // Integrate
        let parents = [task.budget, belief.budget];
        let mut derived = 0;
        for mut raw in conclusions {
            if !store.contains(raw.atom) {
                tracing::debug!("dropping conclusion on unknown atom {}", raw.atom);
                continue;
            }
            match raw
                .truth
                .map(|t| TruthValue::try_new(t.frequency, t.confidence))
                .transpose()
            {
                Ok(truth) => raw.truth = truth,
                Err(e) => {
                    tracing::debug!("dropping malformed conclusion: {e}");
                    continue;
                }
            }
            if let Err(e) = raw.punctuation.check_truth(raw.truth.as_ref()) {
                tracing::debug!("dropping malformed conclusion: {e}");
                continue;
            }
            let budget = memory.strategy().derived_budget(&parents, &raw);
            memory.dispatch(Sentence::from_raw(raw, budget, stamp.clone()));
            derived += 1;
        }
        memory.metrics_mut().derived += derived as u64;

        CycleOutcome::Completed {
            concept,
            derived,
            faulted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{AtomStore, Term};
    use crate::config::MemoryConfig;
    use crate::event::EventLog;
    use crate::rules::RuleRegistry;
    use crate::sentence::Punctuation;

    struct Panicking;

    impl RuleEvaluator for Panicking {
        fn evaluate(&self, _: &InferenceExpression<'_>) -> Evaluation {
            panic!("evaluator bug")
        }
    }

    fn memory() -> Memory {
        Memory::new(MemoryConfig::default(), Arc::new(AtomStore::new())).unwrap()
    }

    #[test]
    fn test_empty_memory_aborts_and_housekeeps() {
        let mut mem = memory();
        let registry = RuleRegistry::new();
        let cycle = ReflexiveCycle::new(&registry);
        let outcome = cycle.run_once(&mut mem);
        assert_eq!(
            outcome,
            CycleOutcome::Aborted {
                phase: CyclePhase::SelectConcept,
                reason: AbortReason::NoConcept
            }
        );
        assert_eq!(mem.tick(), 1);
        assert_eq!(mem.metrics().aborted, 1);
    }

    #[test]
    fn test_shared_evidence_is_not_combined() {
        let mut mem = memory();
        let registry = RuleRegistry::with_syllogisms(mem.store());
        // A single belief is both task and the only belief: always overlaps.
        mem.submit_term(
            &Term::symbol("lonely"),
            Punctuation::Belief,
            Some(TruthValue::new(1.0, 0.9)),
            None,
        )
        .unwrap();
        let summary = ReflexiveCycle::new(&registry).run(&mut mem, 10);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.derived, 0);
        assert_eq!(mem.metrics().redundant_derivations_avoided, 10);
    }

    #[test]
    fn test_evaluator_panic_becomes_diagnostic_belief() {
        let mut mem = memory();
        let log = EventLog::new();
        mem.subscribe(Box::new(log.clone()));
        for term in [Term::inheritance("a", "b"), Term::inheritance("b", "c")] {
            mem.submit_term(&term, Punctuation::Belief, Some(TruthValue::new(1.0, 0.9)), None)
                .unwrap();
        }
        let evaluator = Panicking;
        let cycle = ReflexiveCycle::new(&evaluator);
        let mut faulted = false;
        for _ in 0..50 {
            if let CycleOutcome::Completed { faulted: true, .. } = cycle.run_once(&mut mem) {
                faulted = true;
                break;
            }
        }
        assert!(faulted);
        assert!(mem.metrics().evaluator_faults >= 1);
        assert!(log.count("evaluator-fault") >= 1);

        let store = mem.store().clone();
        let diagnostic = store.intern_term(&Term::inheritance("rule-evaluator", "faulty"));
        assert!(mem.belief(diagnostic).is_some());
    }
}
