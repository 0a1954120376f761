//! Bounded, isolated reasoning toward a single goal.
//!
//! A deliberation copies the host's relevant beliefs into a fresh workspace
//! memory, runs at most `budget` cycles there, and hands back either a
//! solution or nothing. The workspace is dropped afterwards; the host only
//! ever sees the solution, re-dispatched with elevated priority.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::atom::{AtomId, AtomStore};
use crate::bag::BagItem;
use crate::constants::SOLUTION_PRIORITY;
use crate::cycle::ReflexiveCycle;
use crate::event::Event;
use crate::memory::Memory;
use crate::rules::RuleEvaluator;
use crate::sentence::Sentence;

/// Chooses which host sentences seed a workspace.
pub trait RelevanceQuery {
    fn relevant(&self, memory: &Memory, goal: &Sentence) -> Vec<Sentence>;
}

/// Beliefs and pending tasks sharing at least one content subterm with the
/// goal, ranked by shared subterm count times priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TermOverlap {
    pub limit: usize,
}

impl Default for TermOverlap {
    fn default() -> Self {
        Self { limit: 64 }
    }
}

/// Subterms of the principal terms, so copula symbols do not count.
fn content_terms(store: &AtomStore, atom: AtomId) -> HashSet<AtomId> {
    store
        .principal_terms(atom)
        .into_iter()
        .flat_map(|term| store.subterms(term))
        .collect()
}

impl RelevanceQuery for TermOverlap {
    fn relevant(&self, memory: &Memory, goal: &Sentence) -> Vec<Sentence> {
        let store = memory.store();
        let goal_terms = content_terms(store, goal.atom);

        // Belief tasks are already covered by the beliefs themselves.
        let mut seen = HashSet::new();
        let tasks = memory
            .concepts()
            .flat_map(|concept| concept.tasks().iter().map(|(task, _)| task))
            .filter(|task| !task.is_belief() && seen.insert(task.key()))
            .cloned()
            .collect::<Vec<_>>();

        let mut scored: Vec<(f64, Sentence)> = memory
            .beliefs()
            .into_iter()
            .chain(tasks)
            .filter_map(|sentence| {
                let shared = content_terms(store, sentence.atom)
                    .intersection(&goal_terms)
                    .count();
                let score = shared as f64 * sentence.budget.priority;
                (shared > 0).then_some((score, sentence))
            })
            .collect();
        scored.sort_by(|(a, _), (b, _)| b.total_cmp(a));
        scored.truncate(self.limit);
        scored.into_iter().map(|(_, sentence)| sentence).collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeliberationOutcome {
    Resolved { solution: Sentence, cycles: u32 },
    Abandoned { cycles: u32 },
}

pub struct Deliberation<'a> {
    evaluator: &'a dyn RuleEvaluator,
    relevance: &'a dyn RelevanceQuery,
    budget: u32,
    deadline: Option<Duration>,
}

impl<'a> Deliberation<'a> {
    pub fn new(evaluator: &'a dyn RuleEvaluator, relevance: &'a dyn RelevanceQuery, budget: u32) -> Self {
        Self {
            evaluator,
            relevance,
            budget,
            deadline: None,
        }
    }

    /// Give up once this much wall time has passed, even within budget.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deliberate on `goal` inside a workspace of `host`.
    ///
    /// A goal is satisfied by a belief on exactly the goal's atom. Runs at
    /// most `budget` cycles and never touches the host until it returns.
    pub fn run(&self, host: &mut Memory, goal: &Sentence) -> DeliberationOutcome {
        host.emit(Event::DeliberationStarted {
            memory: host.id(),
            goal: goal.atom,
            budget: self.budget,
        });

        let mut seed = self.relevance.relevant(host, goal);
        seed.push(goal.clone());
        let mut workspace = host.create_workspace(seed);
        tracing::debug!(
            "deliberating on {} with {} concepts",
            host.store().display(goal.atom),
            workspace.concept_count()
        );

        let cycle = ReflexiveCycle::new(self.evaluator);
        let started = Instant::now();
        let mut cycles = 0;
        let mut solution = workspace.belief(goal.atom);
        while solution.is_none() && cycles < self.budget {
            if self.deadline.is_some_and(|d| started.elapsed() >= d) {
                break;
            }
            cycle.run_once(&mut workspace);
            cycles += 1;
            solution = workspace.belief(goal.atom);
        }
        drop(workspace);

        match solution {
            Some(mut solution) => {
                solution.budget = solution.budget.elevate(SOLUTION_PRIORITY);
                host.dispatch(solution.clone());
                host.emit(Event::DeliberationResolved {
                    memory: host.id(),
                    goal: goal.atom,
                    cycles,
                });
                DeliberationOutcome::Resolved { solution, cycles }
            }
            None => {
                host.emit(Event::DeliberationAbandoned {
                    memory: host.id(),
                    goal: goal.atom,
                    cycles,
                });
                DeliberationOutcome::Abandoned { cycles }
            }
        }
    }
}
