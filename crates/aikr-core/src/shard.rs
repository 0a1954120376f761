//! Parallel reasoning over partitioned memories.
//!
//! Concepts are partitioned by term: shard `i` of `n` owns every concept
//! whose atom id is `i mod n`. Shards share the atom store and the stamp
//! counter but no knowledge; a sentence that touches a foreign concept is
//! passed to its owner as a message after each step. A [`Supervisor`]
//! watches each shard and rebuilds it from its last checkpoint when the
//! restart policy says so.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;

use crate::atom::{AtomId, AtomStore};
use crate::budget::Budget;
use crate::config::MemoryConfig;
use crate::cycle::{CycleOutcome, ReflexiveCycle};
use crate::error::{ConfigError, ValidationError};
use crate::memory::{Memory, MemoryStats};
use crate::rules::{RuleEvaluator, panic_message};
use crate::sentence::{Punctuation, Sentence};
use crate::snapshot::Snapshot;
use crate::truth::TruthValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    pub index: usize,
    pub count: usize,
}

impl Partition {
    pub fn owner(term: AtomId, count: usize) -> usize {
        term.0 as usize % count.max(1)
    }

    pub fn owns(&self, term: AtomId) -> bool {
        Self::owner(term, self.count) == self.index
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The rule evaluator faulted during a cycle.
    EvaluatorFault,
    /// The cycle itself panicked; shard state may be inconsistent.
    Panic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartAction {
    Ignore,
    Rebuild,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestartRule {
    pub action: RestartAction,
    /// Consecutive faults of this kind before the action is taken.
    pub after: u32,
}

/// What the supervisor does about each kind of fault.
#[derive(Clone, Debug, PartialEq)]
pub struct RestartPolicy {
    rules: HashMap<FaultKind, RestartRule>,
    /// Steps between checkpoints of a healthy shard.
    pub checkpoint_every: u64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::new(10)
            .on(FaultKind::Panic, RestartAction::Rebuild, 1)
            .on(FaultKind::EvaluatorFault, RestartAction::Ignore, 1)
    }
}

impl RestartPolicy {
    pub fn new(checkpoint_every: u64) -> Self {
        Self {
            rules: HashMap::new(),
            checkpoint_every: checkpoint_every.max(1),
        }
    }

    pub fn on(mut self, kind: FaultKind, action: RestartAction, after: u32) -> Self {
        self.rules.insert(
            kind,
            RestartRule {
                action,
                after: after.max(1),
            },
        );
        self
    }

    /// Unlisted kinds are ignored.
    pub fn rule(&self, kind: FaultKind) -> RestartRule {
        self.rules.get(&kind).copied().unwrap_or(RestartRule {
            action: RestartAction::Ignore,
            after: 1,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct ShardHealth {
    pub consecutive_faults: u32,
    pub last_fault: Option<FaultKind>,
    pub restarts: u32,
    checkpoint: Option<Snapshot>,
}

impl ShardHealth {
    pub fn has_checkpoint(&self) -> bool {
        self.checkpoint.is_some()
    }
}

/// Result of one shard's cycle within a step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShardStep {
    Ran(CycleOutcome),
    Panicked(String),
}

pub struct Supervisor {
    policy: RestartPolicy,
    health: Vec<ShardHealth>,
    steps: u64,
}

impl Supervisor {
    pub fn new(policy: RestartPolicy, shards: usize) -> Self {
        Self {
            policy,
            health: vec![ShardHealth::default(); shards],
            steps: 0,
        }
    }

    pub fn health(&self, index: usize) -> Option<&ShardHealth> {
        self.health.get(index)
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    fn begin_step(&mut self) {
        self.steps += 1;
    }

    fn observe(&mut self, index: usize, step: &ShardStep, shard: &mut Memory) {
        let fault = match step {
            ShardStep::Panicked(_) => Some(FaultKind::Panic),
            ShardStep::Ran(CycleOutcome::Completed { faulted: true, .. }) => {
                Some(FaultKind::EvaluatorFault)
            }
            ShardStep::Ran(_) => None,
        };
        let checkpoint_due = self.steps % self.policy.checkpoint_every == 0;
        let health = &mut self.health[index];

        let Some(kind) = fault else {
            health.consecutive_faults = 0;
            if checkpoint_due {
                health.checkpoint = Some(shard.snapshot());
            }
            return;
        };

        health.consecutive_faults += 1;
        health.last_fault = Some(kind);
        let rule = self.policy.rule(kind);
        if rule.action == RestartAction::Rebuild && health.consecutive_faults >= rule.after {
            match &health.checkpoint {
                Some(checkpoint) => shard.restore(checkpoint),
                None => shard.reset(),
            }
            health.restarts += 1;
            health.consecutive_faults = 0;
            tracing::warn!(
                "rebuilt shard {index} after {kind:?} (restart {})",
                health.restarts
            );
        }
    }
}

pub struct ShardedReasoner {
    store: Arc<AtomStore>,
    shards: Vec<Memory>,
    evaluator: Arc<dyn RuleEvaluator>,
    supervisor: Supervisor,
}

impl ShardedReasoner {
    /// `count` partitioned memories over one atom store. Each shard's seed is
    /// offset by its index so shards do not sample in lockstep.
    pub fn new(
        config: MemoryConfig,
        store: Arc<AtomStore>,
        count: usize,
        evaluator: Arc<dyn RuleEvaluator>,
    ) -> Result<Self, ConfigError> {
        if count == 0 {
            return Err(ConfigError::Zero("shard count"));
        }
        let shards = (0..count)
            .map(|index| {
                let config = MemoryConfig {
                    seed: config.seed.wrapping_add(index as u64),
                    ..config.clone()
                };
                Ok(Memory::new(config, Arc::clone(&store))?
                    .with_partition(Partition { index, count }))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self {
            store,
            shards,
            evaluator,
            supervisor: Supervisor::new(RestartPolicy::default(), count),
        })
    }

    pub fn with_policy(mut self, policy: RestartPolicy) -> Self {
        self.supervisor = Supervisor::new(policy, self.shards.len());
        self
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shards(&self) -> &[Memory] {
        &self.shards
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn store(&self) -> &Arc<AtomStore> {
        &self.store
    }

    fn owner_of(&self, atom: AtomId) -> usize {
        let term = self
            .store
            .principal_terms(atom)
            .first()
            .copied()
            .unwrap_or(atom);
        Partition::owner(term, self.shards.len())
    }

    /// Submit through the shard owning the atom's first principal term; the
    /// other principal terms are reached by message.
    pub fn submit(
        &mut self,
        atom: AtomId,
        punctuation: Punctuation,
        truth: Option<TruthValue>,
        budget: Option<Budget>,
    ) -> Result<(), ValidationError> {
        let owner = self.owner_of(atom);
        self.shards[owner].submit(atom, punctuation, truth, budget)?;
        self.route();
        Ok(())
    }

    /// Deliver every pending cross-shard message to its owner.
    fn route(&mut self) {
        let count = self.shards.len();
        let messages: Vec<(AtomId, Sentence)> = self
            .shards
            .iter_mut()
            .flat_map(|shard| shard.take_outbox())
            .collect();
        for (term, sentence) in messages {
            self.shards[Partition::owner(term, count)].deliver(term, sentence);
        }
    }

    /// One cycle on every shard in parallel, then message exchange.
    pub fn step(&mut self) -> Vec<ShardStep> {
        let cycle = ReflexiveCycle::new(self.evaluator.as_ref());
        let results: Vec<ShardStep> = self
            .shards
            .par_iter_mut()
            .map(|shard| {
                match panic::catch_unwind(AssertUnwindSafe(|| cycle.run_once(shard))) {
                    Ok(outcome) => ShardStep::Ran(outcome),
                    Err(payload) => ShardStep::Panicked(panic_message(payload.as_ref())),
                }
            })
            .collect();

        self.supervisor.begin_step();
        for (index, result) in results.iter().enumerate() {
            self.supervisor
                .observe(index, result, &mut self.shards[index]);
        }
        self.route();
        results
    }

    pub fn run(&mut self, steps: u32) -> usize {
        let mut derived = 0;
        for _ in 0..steps {
            for result in self.step() {
                if let ShardStep::Ran(CycleOutcome::Completed { derived: n, .. }) = result {
                    derived += n;
                }
            }
        }
        derived
    }

    /// The most confident belief on `atom` across shards.
    pub fn belief(&self, atom: AtomId) -> Option<Sentence> {
        self.shards
            .iter()
            .filter_map(|shard| shard.belief(atom))
            .max_by(|a, b| {
                a.confidence()
                    .unwrap_or(0.0)
                    .total_cmp(&b.confidence().unwrap_or(0.0))
            })
    }

    pub fn stats(&self) -> Vec<MemoryStats> {
        self.shards.iter().map(Memory::stats).collect()
    }

    /// Shard snapshots concatenated; the tick is the furthest shard's.
    pub fn snapshot(&self) -> Snapshot {
        let mut merged = Snapshot::default();
        for shard in &self.shards {
            let snapshot = shard.snapshot();
            merged.tick = merged.tick.max(snapshot.tick);
            merged.concepts.extend(snapshot.concepts);
        }
        merged
    }
}
