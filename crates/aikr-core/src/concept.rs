//! A concept is the unit of locality: every sentence whose principal terms
//! include the concept's term lives in its task bag, and the beliefs among
//! them are also revised into its belief bag.

use rand::Rng;

use crate::atom::{AtomId, AtomStore};
use crate::bag::{Bag, BagItem};
use crate::budget::Budget;
use crate::constants::{ACTIVATION_RETENTION, CONTRADICTION_GAP};
use crate::sentence::{Punctuation, Sentence, SentenceKey};
use crate::stamp::Stamp;
use crate::truth::TruthValue;

/// Truth revision supplied by the memory (NAL revision by default).
pub type RevisionFn = fn(&TruthValue, &TruthValue) -> TruthValue;

/// What [`Concept::revise_or_insert`] did with an incoming belief.
#[derive(Clone, Debug, PartialEq)]
pub enum BeliefUpdate {
    /// No belief on this atom existed; the incoming one was stored.
    Inserted { stored: Sentence },
    /// Overlapping evidence: the more confident of the two is kept.
    Replaced { previous: Sentence, stored: Sentence },
    /// Disjoint evidence: truths were revised and stamps merged.
    Revised {
        previous: TruthValue,
        stored: Sentence,
        contradiction: bool,
    },
    /// Nothing changed (identical evidence, or the resident is more confident).
    Unchanged,
}

impl BeliefUpdate {
    pub fn stored(&self) -> Option<&Sentence> {
        match self {
            BeliefUpdate::Inserted { stored }
            | BeliefUpdate::Replaced { stored, .. }
            | BeliefUpdate::Revised { stored, .. } => Some(stored),
            BeliefUpdate::Unchanged => None,
        }
    }
}

/// Result of [`Concept::touch`].
#[derive(Debug, Default)]
pub struct TouchReport {
    pub belief: Option<BeliefUpdate>,
    /// Sentence that entered the task bag, if any.
    pub queued: Option<SentenceKey>,
    /// Members pushed out of either bag by capacity.
    pub evicted: Vec<Sentence>,
}

pub struct Concept {
    term: AtomId,
    tasks: Bag<Sentence>,
    beliefs: Bag<Sentence>,
    activation: f64,
    idle_ticks: u32,
}

impl Concept {
    pub fn new(term: AtomId, capacity: usize, sharpness: f64) -> Self {
        Self {
            term,
            tasks: Bag::new(capacity, sharpness),
            beliefs: Bag::new(capacity, sharpness),
            activation: 0.0,
            idle_ticks: 0,
        }
    }

    pub fn term(&self) -> AtomId {
        self.term
    }

    pub fn activation(&self) -> f64 {
        self.activation
    }

    pub fn idle_ticks(&self) -> u32 {
        self.idle_ticks
    }

    pub fn tasks(&self) -> &Bag<Sentence> {
        &self.tasks
    }

    pub fn beliefs(&self) -> &Bag<Sentence> {
        &self.beliefs
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.beliefs.is_empty()
    }

    /// Route a sentence into this concept.
    ///
    /// A belief is revised into the belief bag and, if that stored or
    /// changed anything, queued as a task as well. Every other punctuation
    /// only enters the task bag.
    pub fn touch(
        &mut self,
        sentence: Sentence,
        revise: RevisionFn,
        evidence_cap: usize,
        now: u64,
    ) -> TouchReport {
        self.activation = (self.activation * ACTIVATION_RETENTION).max(sentence.budget.priority);
        self.idle_ticks = 0;

        let mut report = TouchReport::default();
        let task = if sentence.punctuation == Punctuation::Belief {
            let update =
                self.revise_or_insert(sentence, revise, evidence_cap, now, &mut report.evicted);
            let task = update.stored().cloned();
            report.belief = Some(update);
            task
        } else {
            Some(sentence)
        };

        if let Some(task) = task {
            let key = task.key();
            let priority = task.budget.priority;
            let out = self.tasks.insert(task, priority);
            let resident = self.tasks.contains(&key);
            if resident {
                report.queued = Some(key);
            }
            // Same key while resident means a plain replacement.
            if let Some(out) = out
                && (out.key() != key || !resident)
            {
                report.evicted.push(out);
            }
        }
        report
    }

    /// Merge an incoming belief with the resident belief on the same atom.
    ///
    /// Identical evidence leaves truth unchanged. Overlapping evidence keeps
    /// the more confident of the two. Disjoint evidence is revised with
    /// `revise` under a merged stamp. Capacity evictions land in `evicted`.
    pub fn revise_or_insert(
        &mut self,
        incoming: Sentence,
        revise: RevisionFn,
        evidence_cap: usize,
        now: u64,
        evicted: &mut Vec<Sentence>,
    ) -> BeliefUpdate {
        let resident = self
            .beliefs
            .find(|b| b.atom == incoming.atom && b.punctuation == incoming.punctuation)
            .cloned();

        let Some(resident) = resident else {
            return self.store_belief(incoming, evicted, |stored| BeliefUpdate::Inserted { stored });
        };

        let (Some(old_truth), Some(new_truth)) = (resident.truth, incoming.truth) else {
            return BeliefUpdate::Unchanged;
        };

        if resident.stamp.same_evidence(&incoming.stamp) {
            return BeliefUpdate::Unchanged;
        }

        match Stamp::merge(&[&resident.stamp, &incoming.stamp], evidence_cap, now) {
            Err(_) => {
                if new_truth.confidence <= old_truth.confidence {
                    return BeliefUpdate::Unchanged;
                }
                self.beliefs.remove(&resident.key());
                self.store_belief(incoming, evicted, |stored| BeliefUpdate::Replaced {
                    previous: resident,
                    stored,
                })
            }
            Ok(stamp) => {
                let truth = revise(&old_truth, &new_truth);
                let contradiction =
                    (old_truth.frequency - new_truth.frequency).abs() >= CONTRADICTION_GAP;
                let budget = Budget::clamped(
                    resident.budget.priority.max(incoming.budget.priority),
                    resident.budget.durability.max(incoming.budget.durability),
                    resident.budget.quality.max(incoming.budget.quality),
                );
                let revised = Sentence {
                    atom: incoming.atom,
                    punctuation: incoming.punctuation,
                    truth: Some(truth),
                    budget,
                    stamp,
                };
                self.beliefs.remove(&resident.key());
                self.store_belief(revised, evicted, |stored| BeliefUpdate::Revised {
                    previous: old_truth,
                    stored,
                    contradiction,
                })
            }
        }
    }

    fn store_belief(
        &mut self,
        belief: Sentence,
        evicted: &mut Vec<Sentence>,
        update: impl FnOnce(Sentence) -> BeliefUpdate,
    ) -> BeliefUpdate {
        let key = belief.key();
        let priority = belief.budget.priority;
        let out = self.beliefs.insert(belief.clone(), priority);
        let resident = self.beliefs.contains(&key);
        if let Some(out) = out
            && (out.key() != key || !resident)
        {
            evicted.push(out);
        }
        if resident {
            update(belief)
        } else {
            BeliefUpdate::Unchanged
        }
    }

    /// Draw a task by priority. The task stays resident.
    pub fn select_task(&self, rng: &mut impl Rng) -> Option<Sentence> {
        self.tasks.sample(rng).cloned()
    }

    /// Draw a belief to pair with `task`.
    ///
    /// Beliefs on the task's own atom are excluded; the rest are weighted by
    /// `priority^sharpness` times the number of subterms they share with the
    /// task. Falls back to plain priority sampling when nothing overlaps.
    pub fn select_belief_relevant_to(
        &self,
        task: &Sentence,
        store: &AtomStore,
        rng: &mut impl Rng,
    ) -> Option<Sentence> {
        let task_terms = store.subterms(task.atom);
        let relevant = self.beliefs.sample_weighted(rng, |belief| {
            if belief.atom == task.atom {
                return 0.0;
            }
            store
                .subterms(belief.atom)
                .intersection(&task_terms)
                .count() as f64
        });
        match relevant {
            Some(belief) => Some(belief.clone()),
            None => self.beliefs.sample(rng).cloned(),
        }
    }

    /// Apply an attention update to one member of either bag.
    pub fn update_member(&mut self, key: &SentenceKey, f: impl Fn(&mut Budget)) -> bool {
        let mut found = false;
        for bag in [&mut self.tasks, &mut self.beliefs] {
            found |= bag.modify(key, |sentence, _| {
                f(&mut sentence.budget);
                sentence.budget.priority
            });
        }
        found
    }

    /// Decay every member with `update`, drop what `forget` selects, and
    /// recompute activation as the mean member priority. Returns the
    /// forgotten sentences.
    pub fn apply_budgets(
        &mut self,
        update: impl Fn(&Budget) -> Budget,
        forget: impl Fn(&Budget) -> bool,
    ) -> Vec<Sentence> {
        let mut forgotten = Vec::new();
        for bag in [&mut self.tasks, &mut self.beliefs] {
            bag.reweight(|sentence, _| {
                sentence.budget = update(&sentence.budget);
                sentence.budget.priority
            });
            forgotten.extend(bag.drain_where(|sentence, _| forget(&sentence.budget)));
        }
        self.activation = if self.is_empty() {
            update(&Budget::clamped(self.activation, 0.0, 0.0)).priority
        } else {
            let (t, b) = (self.tasks.len() as f64, self.beliefs.len() as f64);
            (self.tasks.mean_priority() * t + self.beliefs.mean_priority() * b) / (t + b)
        };
        forgotten
    }

    /// Advance the idle counter; returns the new count.
    pub(crate) fn mark_idle(&mut self, epsilon: f64) -> u32 {
        if self.is_empty() && self.activation < epsilon {
            self.idle_ticks = self.idle_ticks.saturating_add(1);
        } else {
            self.idle_ticks = 0;
        }
        self.idle_ticks
    }

    /// Rebuild from persisted state; members are inserted oldest first.
    pub(crate) fn restore(
        term: AtomId,
        capacity: usize,
        sharpness: f64,
        activation: f64,
        idle_ticks: u32,
        tasks: Vec<(Sentence, f64)>,
        beliefs: Vec<(Sentence, f64)>,
    ) -> Self {
        let mut concept = Concept::new(term, capacity, sharpness);
        for (sentence, priority) in tasks {
            concept.tasks.insert(sentence, priority);
        }
        for (sentence, priority) in beliefs {
            concept.beliefs.insert(sentence, priority);
        }
        concept.activation = activation.clamp(0.0, 1.0);
        concept.idle_ticks = idle_ticks;
        concept
    }
}
