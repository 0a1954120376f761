//! Pluggable attention policy. The memory never hard-codes how budgets are
//! assigned, reinforced or decayed; it asks its [`BudgetingStrategy`].

use crate::budget::Budget;
use crate::config::MemoryConfig;
use crate::constants::ACCESS_REINFORCEMENT;
use crate::memory::Memory;
use crate::sentence::{Punctuation, RawSentence, Sentence};

/// Totals from one housekeeping pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    pub decayed: usize,
    pub forgotten: usize,
}

pub trait BudgetingStrategy: Send + Sync {
    /// Budget for external input submitted without one.
    fn initial_budget(&self, sentence: &Sentence) -> Budget;

    /// Budget for a conclusion drawn from `parents`.
    fn derived_budget(&self, parents: &[Budget], conclusion: &RawSentence) -> Budget;

    /// Applied to a task or belief each time a cycle selects it.
    fn on_access(&self, budget: &mut Budget);

    fn should_forget(&self, budget: &Budget) -> bool;

    /// Global decay pass over every concept of `memory`.
    fn perform_housekeeping(&self, memory: &mut Memory) -> HousekeepingReport;
}

/// Default policy: fixed initial budgets, geometric-mean derivation,
/// quality-scaled reinforcement and exponential decay.
#[derive(Clone, Debug, PartialEq)]
pub struct DefaultBudgeting {
    pub decay_rate: f64,
    pub forget_threshold: f64,
}

impl DefaultBudgeting {
    pub fn from_config(config: &MemoryConfig) -> Self {
        Self {
            decay_rate: config.decay_rate,
            forget_threshold: config.forget_threshold,
        }
    }
}

impl Default for DefaultBudgeting {
    fn default() -> Self {
        Self::from_config(&MemoryConfig::default())
    }
}

impl BudgetingStrategy for DefaultBudgeting {
    fn initial_budget(&self, sentence: &Sentence) -> Budget {
        match (sentence.punctuation, sentence.truth) {
            (Punctuation::Belief, Some(truth)) => Budget::clamped(0.8, 0.8, truth.expectation()),
            _ => Budget::clamped(0.9, 0.9, 0.5),
        }
    }

    fn derived_budget(&self, parents: &[Budget], conclusion: &RawSentence) -> Budget {
        Budget::derive_all(parents, conclusion.truth.map(|t| t.confidence))
    }

    fn on_access(&self, budget: &mut Budget) {
        *budget = budget.reinforce(ACCESS_REINFORCEMENT);
    }

    fn should_forget(&self, budget: &Budget) -> bool {
        budget.priority < self.forget_threshold
    }

    fn perform_housekeeping(&self, memory: &mut Memory) -> HousekeepingReport {
        let mut report = HousekeepingReport::default();
        for concept in memory.concepts_mut() {
            report.decayed += concept.tasks().len() + concept.beliefs().len();
            let forgotten = concept.apply_budgets(
                |b| b.decay(1, self.decay_rate),
                |b| self.should_forget(b),
            );
            report.forgotten += forgotten.len();
        }
        report
    }
}
