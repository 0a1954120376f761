//! Concept-indexed knowledge under a fixed resource envelope.
//!
//! A [`Memory`] owns its concepts and its bag of concepts; the atom store is
//! shared. Every sentence is routed to the concept of each of its principal
//! terms, and every structure stays within its configured capacity: growth
//! is paid for by forgetting.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use uuid::Uuid;

use crate::atom::{AtomId, AtomStore, INHERITANCE, Term};
use crate::bag::{Bag, BagItem};
use crate::budget::Budget;
use crate::concept::{BeliefUpdate, Concept, RevisionFn, TouchReport};
use crate::config::MemoryConfig;
use crate::constants::{
    EVALUATOR_FAULT_CONFIDENCE, GROUNDING_FAILURE_CONFIDENCE, GROUNDING_FAILURE_FREQUENCY,
};
use crate::error::{ConfigError, GroundingFailure, RuleEvaluatorFault, ValidationError};
use crate::event::{Event, Observer};
use crate::grounding::{GroundedResult, GroundingHandle, GroundingInbox};
use crate::sentence::{Punctuation, RawSentence, Sentence};
use crate::shard::Partition;
use crate::snapshot::{ConceptState, SentenceRecord, Snapshot};
use crate::stamp::{self, Stamp};
use crate::strategy::{BudgetingStrategy, DefaultBudgeting, HousekeepingReport};
use crate::truth::TruthValue;

impl BagItem for AtomId {
    type Key = AtomId;

    fn key(&self) -> AtomId {
        *self
    }
}

/// Counters kept by a memory over its lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub cycles: u64,
    pub aborted: u64,
    pub redundant_derivations_avoided: u64,
    pub derived: u64,
    pub evaluator_faults: u64,
    pub grounding_failures: u64,
    pub concepts_forgotten: u64,
    pub sentences_forgotten: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MemoryStats {
    pub id: Uuid,
    pub tick: u64,
    pub concepts: usize,
    pub tasks: usize,
    pub beliefs: usize,
    pub atoms: usize,
    pub metrics: Metrics,
}

/// Per-memory runtime state: randomness, observers, counters, logical
/// clock and the grounding inbox. Nothing here is shared between memories.
pub struct Context {
    rng: SmallRng,
    observers: Vec<Box<dyn Observer>>,
    metrics: Metrics,
    tick: u64,
    inbox: GroundingInbox,
}

impl Context {
    fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            observers: Vec::new(),
            metrics: Metrics::default(),
            tick: 0,
            inbox: GroundingInbox::new(),
        }
    }
}

pub struct Memory {
    id: Uuid,
    config: MemoryConfig,
    store: Arc<AtomStore>,
    strategy: Arc<dyn BudgetingStrategy>,
    revision: RevisionFn,
    concepts: BTreeMap<AtomId, Concept>,
    concept_bag: Bag<AtomId>,
    context: Context,
    accepts_input: bool,
    partition: Option<Partition>,
    outbox: Vec<(AtomId, Sentence)>,
}

impl Memory {
    pub fn new(config: MemoryConfig, store: Arc<AtomStore>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            strategy: Arc::new(DefaultBudgeting::from_config(&config)),
            revision: TruthValue::revision,
            concepts: BTreeMap::new(),
            concept_bag: Bag::new(config.concept_capacity, config.sharpness),
            context: Context::new(config.seed),
            accepts_input: true,
            partition: None,
            outbox: Vec::new(),
            store,
            config,
        })
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn BudgetingStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_revision(mut self, revision: RevisionFn) -> Self {
        self.revision = revision;
        self
    }

    pub(crate) fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn subscribe(&mut self, observer: Box<dyn Observer>) {
        self.context.observers.push(observer);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<AtomStore> {
        &self.store
    }

    pub fn strategy(&self) -> &Arc<dyn BudgetingStrategy> {
        &self.strategy
    }

    /// Logical clock: number of housekeeping passes so far.
    pub fn tick(&self) -> u64 {
        self.context.tick
    }

    pub fn metrics(&self) -> &Metrics {
        &self.context.metrics
    }

    pub(crate) fn metrics_mut(&mut self) -> &mut Metrics {
        &mut self.context.metrics
    }

    /// False for deliberation workspaces.
    pub fn accepts_input(&self) -> bool {
        self.accepts_input
    }

    pub fn partition(&self) -> Option<Partition> {
        self.partition
    }

    pub fn concept(&self, term: AtomId) -> Option<&Concept> {
        self.concepts.get(&term)
    }

    pub fn concepts(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.values()
    }

    pub fn concepts_mut(&mut self) -> impl Iterator<Item = &mut Concept> {
        self.concepts.values_mut()
    }

    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    // --- Ingestion ---

    /// Validate and dispatch external input. A missing budget is filled in
    /// by the budgeting strategy; the stamp is always fresh.
    pub fn submit(
        &mut self,
        atom: AtomId,
        punctuation: Punctuation,
        truth: Option<TruthValue>,
        budget: Option<Budget>,
    ) -> Result<(), ValidationError> {
        if !self.accepts_input {
            return Err(ValidationError::InputClosed);
        }
        let sentence = self.validate(atom, punctuation, truth, budget)?;
        tracing::debug!(
            "submit {}{}",
            self.store.display(atom),
            punctuation.symbol()
        );
        self.dispatch(sentence);
        Ok(())
    }

    /// Intern `term` and submit it. Returns the interned handle.
    pub fn submit_term(
        &mut self,
        term: &Term,
        punctuation: Punctuation,
        truth: Option<TruthValue>,
        budget: Option<Budget>,
    ) -> Result<AtomId, ValidationError> {
        if !self.accepts_input {
            return Err(ValidationError::InputClosed);
        }
        let atom = self.store.intern_term(term);
        self.submit(atom, punctuation, truth, budget)?;
        Ok(atom)
    }

    fn validate(
        &self,
        atom: AtomId,
        punctuation: Punctuation,
        truth: Option<TruthValue>,
        budget: Option<Budget>,
    ) -> Result<Sentence, ValidationError> {
        if !self.store.contains(atom) {
            return Err(ValidationError::UnknownAtom(atom.0));
        }
        // Fields are public, so re-check what the constructors would have.
        let truth = truth
            .map(|t| TruthValue::try_new(t.frequency, t.confidence))
            .transpose()?;
        punctuation.check_truth(truth.as_ref())?;
        let budget = budget
            .map(|b| Budget::new(b.priority, b.durability, b.quality))
            .transpose()?;

        let mut sentence = Sentence {
            atom,
            punctuation,
            truth,
            budget: Budget::clamped(0.0, 0.0, 0.0),
            stamp: Stamp::fresh(self.context.tick),
        };
        sentence.budget = budget.unwrap_or_else(|| self.strategy.initial_budget(&sentence));
        Ok(sentence)
    }

    /// Route a sentence to the concept of each principal term, creating
    /// concepts on demand. Terms owned by another shard go to the outbox.
    pub fn dispatch(&mut self, sentence: Sentence) {
        let mut reports = Vec::new();
        for term in self.store.principal_terms(sentence.atom) {
            match self.partition {
                Some(partition) if !partition.owns(term) => {
                    self.outbox.push((term, sentence.clone()));
                }
                _ => reports.push(self.touch_concept(term, sentence.clone())),
            }
        }
        self.announce(&sentence, &reports);
    }

    /// Touch one owned concept with a sentence dispatched by another shard.
    pub(crate) fn deliver(&mut self, term: AtomId, sentence: Sentence) {
        let report = self.touch_concept(term, sentence.clone());
        self.announce(&sentence, &[report]);
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<(AtomId, Sentence)> {
        std::mem::take(&mut self.outbox)
    }

    fn touch_concept(&mut self, term: AtomId, sentence: Sentence) -> TouchReport {
        let (capacity, sharpness) = (self.config.bag_capacity, self.config.sharpness);
        let concept = self
            .concepts
            .entry(term)
            .or_insert_with(|| Concept::new(term, capacity, sharpness));
        let report = concept.touch(
            sentence,
            self.revision,
            self.config.evidence_cap,
            self.context.tick,
        );
        let activation = concept.activation();
        self.context.metrics.sentences_forgotten += report.evicted.len() as u64;

        if !self.concept_bag.update_priority(&term, activation)
            && let Some(out) = self.concept_bag.insert(term, activation)
        {
            // Either a resident lost its place or the new concept was refused.
            self.forget_concept(out);
        }
        report
    }

    fn announce(&self, sentence: &Sentence, reports: &[TouchReport]) {
        if reports.iter().any(|r| r.queued.is_some()) {
            self.emit(Event::SentenceAdded {
                memory: self.id,
                atom: sentence.atom,
                punctuation: sentence.punctuation,
            });
        }
        let Some(incoming) = sentence.truth else {
            return;
        };
        let revised = reports.iter().find_map(|r| match &r.belief {
            Some(BeliefUpdate::Revised {
                previous,
                stored,
                contradiction,
            }) => Some((*previous, stored.truth, *contradiction)),
            _ => None,
        });
        if let Some((previous, Some(revised), contradiction)) = revised {
            if contradiction {
                tracing::debug!(
                    "contradiction on {}: {previous} vs {incoming}",
                    self.store.display(sentence.atom)
                );
                self.emit(Event::ContradictionDetected {
                    memory: self.id,
                    atom: sentence.atom,
                    existing: previous,
                    incoming,
                });
            }
            self.emit(Event::BeliefRevised {
                memory: self.id,
                atom: sentence.atom,
                previous,
                revised,
            });
        }
    }

    fn forget_concept(&mut self, term: AtomId) {
        self.concept_bag.remove(&term);
        if self.concepts.remove(&term).is_some() {
            self.context.metrics.concepts_forgotten += 1;
            tracing::debug!("forgot concept {}", self.store.display(term));
            self.emit(Event::ConceptForgotten {
                memory: self.id,
                atom: term,
            });
        }
    }

    // --- Selection ---

    /// Draw a concept from the bag of concepts.
    pub fn select_concept(&mut self) -> Option<AtomId> {
        self.concept_bag.sample(&mut self.context.rng).copied()
    }

    /// Draw a task from `term`'s concept and apply the access policy to it.
    pub fn select_task(&mut self, term: AtomId) -> Option<Sentence> {
        let concept = self.concepts.get_mut(&term)?;
        let task = concept.select_task(&mut self.context.rng)?;
        let strategy = &self.strategy;
        concept.update_member(&task.key(), |b| strategy.on_access(b));
        Some(task)
    }

    /// Draw a belief relevant to `task` from `term`'s concept.
    pub fn select_belief(&mut self, term: AtomId, task: &Sentence) -> Option<Sentence> {
        let concept = self.concepts.get_mut(&term)?;
        let belief =
            concept.select_belief_relevant_to(task, &self.store, &mut self.context.rng)?;
        let strategy = &self.strategy;
        concept.update_member(&belief.key(), |b| strategy.on_access(b));
        Some(belief)
    }

    // --- Workspaces ---

    /// An isolated memory seeded with `seed`.
    ///
    /// The workspace shares this memory's atom store and policies, draws its
    /// random seed from this memory's generator, and refuses external input.
    /// Nothing it does touches this memory.
    pub fn create_workspace(&mut self, seed: Vec<Sentence>) -> Memory {
        let mut context = Context::new(self.context.rng.random());
        context.tick = self.context.tick;
        let mut workspace = Memory {
            id: Uuid::new_v4(),
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            strategy: Arc::clone(&self.strategy),
            revision: self.revision,
            concepts: BTreeMap::new(),
            concept_bag: Bag::new(self.config.concept_capacity, self.config.sharpness),
            context,
            accepts_input: false,
            partition: None,
            outbox: Vec::new(),
        };
        for sentence in seed {
            workspace.dispatch(sentence);
        }
        workspace
    }

    // --- Housekeeping ---

    /// Run the strategy's decay pass, resync concept priorities, prune
    /// concepts idle for too long, and advance the clock.
    pub fn housekeeping(&mut self) -> HousekeepingReport {
        let strategy = Arc::clone(&self.strategy);
        let report = strategy.perform_housekeeping(self);
        self.context.metrics.sentences_forgotten += report.forgotten as u64;

        let epsilon = self.config.activation_epsilon;
        let limit = self.config.concept_idle_prune_ticks;
        let mut idle = Vec::new();
        for (term, concept) in &mut self.concepts {
            self.concept_bag.update_priority(term, concept.activation());
            if concept.mark_idle(epsilon) >= limit {
                idle.push(*term);
            }
        }
        for term in idle {
            self.forget_concept(term);
        }

        self.context.tick += 1;
        report
    }

    // --- Events ---

    /// Deliver an event to every observer. Observer failures are logged and
    /// never reach the caller.
    pub fn emit(&self, event: Event) {
        for observer in &self.context.observers {
            match panic::catch_unwind(AssertUnwindSafe(|| observer.on_event(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("observer rejected {}: {e}", event.name()),
                Err(_) => tracing::warn!("observer panicked on {}", event.name()),
            }
        }
    }

    // --- Grounding ---

    pub fn grounding_handle(&self) -> GroundingHandle {
        self.context.inbox.handle()
    }

    /// Ingest every grounded result that has arrived. Never blocks.
    pub fn drain_grounding(&mut self) -> usize {
        let results = self.context.inbox.drain();
        let count = results.len();
        for result in results {
            match result {
                GroundedResult::Answer(raw) => {
                    match self.validate(raw.atom, raw.punctuation, raw.truth, None) {
                        Ok(sentence) => self.dispatch(sentence),
                        Err(e) => tracing::warn!("dropping grounded answer: {e}"),
                    }
                }
                GroundedResult::Failed(failure) => self.record_grounding_failure(failure),
            }
        }
        count
    }

    fn record_grounding_failure(&mut self, failure: GroundingFailure) {
        tracing::warn!("{failure}");
        self.context.metrics.grounding_failures += 1;
        let source = self.store.symbol(&failure.source_name);
        let marker = self.store.symbol("grounding-failure");
        let atom = self.store.statement(INHERITANCE, source, marker);
        self.dispatch_diagnostic(
            atom,
            TruthValue::new(GROUNDING_FAILURE_FREQUENCY, GROUNDING_FAILURE_CONFIDENCE),
        );
        self.emit(Event::GroundingFailed {
            memory: self.id,
            source_name: failure.source_name,
            reason: failure.reason,
        });
    }

    /// Record a rule evaluator fault as a low-confidence belief.
    pub(crate) fn record_evaluator_fault(&mut self, fault: RuleEvaluatorFault) {
        tracing::warn!("{fault}");
        self.context.metrics.evaluator_faults += 1;
        let subject = self.store.symbol("rule-evaluator");
        let marker = self.store.symbol("faulty");
        let atom = self.store.statement(INHERITANCE, subject, marker);
        self.dispatch_diagnostic(atom, TruthValue::new(1.0, EVALUATOR_FAULT_CONFIDENCE));
        self.emit(Event::EvaluatorFault {
            memory: self.id,
            reason: fault.0,
        });
    }

    fn dispatch_diagnostic(&mut self, atom: AtomId, truth: TruthValue) {
        let mut sentence = Sentence::from_raw(
            RawSentence::belief(atom, truth),
            Budget::clamped(0.0, 0.0, 0.0),
            Stamp::fresh(self.context.tick),
        );
        sentence.budget = self.strategy.initial_budget(&sentence);
        self.dispatch(sentence);
    }

    // --- Queries ---

    /// Every belief held by `term`'s concept.
    pub fn beliefs_about(&self, term: AtomId) -> Vec<Sentence> {
        self.concepts
            .get(&term)
            .map(|c| c.beliefs().iter().map(|(s, _)| s.clone()).collect())
            .unwrap_or_default()
    }

    /// The most confident belief whose atom is exactly `atom`.
    pub fn belief(&self, atom: AtomId) -> Option<Sentence> {
        self.store
            .principal_terms(atom)
            .into_iter()
            .filter_map(|term| self.concepts.get(&term))
            .filter_map(|c| c.beliefs().find(|s| s.atom == atom && s.is_belief()))
            .max_by(|a, b| a.confidence().unwrap_or(0.0).total_cmp(&b.confidence().unwrap_or(0.0)))
            .cloned()
    }

    /// One belief per atom (the most confident), ordered by atom.
    pub fn beliefs(&self) -> Vec<Sentence> {
        let mut best: BTreeMap<AtomId, &Sentence> = BTreeMap::new();
        for concept in self.concepts.values() {
            for (belief, _) in concept.beliefs().iter() {
                let confidence = belief.confidence().unwrap_or(0.0);
                best.entry(belief.atom)
                    .and_modify(|held| {
                        if confidence > held.confidence().unwrap_or(0.0) {
                            *held = belief;
                        }
                    })
                    .or_insert(belief);
            }
        }
        best.into_values().cloned().collect()
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            id: self.id,
            tick: self.context.tick,
            concepts: self.concepts.len(),
            tasks: self.concepts.values().map(|c| c.tasks().len()).sum(),
            beliefs: self.concepts.values().map(|c| c.beliefs().len()).sum(),
            atoms: self.store.len(),
            metrics: self.context.metrics,
        }
    }

    // --- Persistence ---

    /// Owned image of every concept, in bag insertion order.
    pub fn snapshot(&self) -> Snapshot {
        let record = |sentence: &Sentence, priority: f64| {
            Some(SentenceRecord {
                term: self.store.resolve(sentence.atom)?,
                punctuation: sentence.punctuation,
                truth: sentence.truth,
                budget: sentence.budget,
                stamp: sentence.stamp.clone(),
                priority,
            })
        };
        let mut concepts = Vec::with_capacity(self.concepts.len());
        for (&term, priority) in self.concept_bag.entries_by_age() {
            let (Some(concept), Some(resolved)) =
                (self.concepts.get(&term), self.store.resolve(term))
            else {
                continue;
            };
            let state = ConceptState {
                priority,
                activation: concept.activation(),
                idle_ticks: concept.idle_ticks(),
                tasks: concept
                    .tasks()
                    .entries_by_age()
                    .into_iter()
                    .filter_map(|(s, p)| record(s, p))
                    .collect(),
                beliefs: concept
                    .beliefs()
                    .entries_by_age()
                    .into_iter()
                    .filter_map(|(s, p)| record(s, p))
                    .collect(),
            };
            concepts.push((resolved, state));
        }
        Snapshot {
            tick: self.context.tick,
            concepts,
        }
    }

    /// Replace all concepts with those of `snapshot`.
    ///
    /// Terms are re-interned, stamps normalised to the evidence cap, and the
    /// global stamp counter is advanced past every restored id. Records that
    /// violate punctuation rules are skipped.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.concepts.clear();
        self.concept_bag.clear();
        self.outbox.clear();
        self.context.tick = snapshot.tick;
        stamp::advance_past(snapshot.max_stamp_id());

        let cap = self.config.evidence_cap;
        let store = Arc::clone(&self.store);
        let to_sentence = |record: &SentenceRecord| -> Option<(Sentence, f64)> {
            let truth = record
                .truth
                .map(|t| TruthValue::new(t.frequency, t.confidence));
            if let Err(e) = record.punctuation.check_truth(truth.as_ref()) {
                tracing::warn!("skipping restored sentence {}: {e}", record.term);
                return None;
            }
            let b = record.budget;
            Some((
                Sentence {
                    atom: store.intern_term(&record.term),
                    punctuation: record.punctuation,
                    truth,
                    budget: Budget::clamped(b.priority, b.durability, b.quality),
                    stamp: record.stamp.clone().normalized(cap),
                },
                record.priority,
            ))
        };

        let mut restored = 0;
        for (term, state) in &snapshot.concepts {
            let id = store.intern_term(term);
            let concept = Concept::restore(
                id,
                self.config.bag_capacity,
                self.config.sharpness,
                state.activation,
                state.idle_ticks,
                state.tasks.iter().filter_map(&to_sentence).collect(),
                state.beliefs.iter().filter_map(&to_sentence).collect(),
            );
            self.concepts.insert(id, concept);
            if let Some(out) = self.concept_bag.insert(id, state.priority) {
                self.concepts.remove(&out);
            }
            restored += 1;
        }
        tracing::info!("restored {restored} concepts at tick {}", snapshot.tick);
    }

    /// Drop every concept (used when a shard is rebuilt without a snapshot).
    pub(crate) fn reset(&mut self) {
        self.concepts.clear();
        self.concept_bag.clear();
        self.outbox.clear();
    }
}
