//! Out-of-band notifications. Delivery is best effort: an observer that
//! fails or panics is logged and skipped, and never changes memory state.

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::atom::AtomId;
use crate::sentence::Punctuation;
use crate::truth::TruthValue;

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    SentenceAdded {
        memory: Uuid,
        atom: AtomId,
        punctuation: Punctuation,
    },
    BeliefRevised {
        memory: Uuid,
        atom: AtomId,
        previous: TruthValue,
        revised: TruthValue,
    },
    ContradictionDetected {
        memory: Uuid,
        atom: AtomId,
        existing: TruthValue,
        incoming: TruthValue,
    },
    CycleComplete {
        memory: Uuid,
        tick: u64,
        derived: usize,
    },
    ConceptForgotten {
        memory: Uuid,
        atom: AtomId,
    },
    DeliberationStarted {
        memory: Uuid,
        goal: AtomId,
        budget: u32,
    },
    DeliberationResolved {
        memory: Uuid,
        goal: AtomId,
        cycles: u32,
    },
    DeliberationAbandoned {
        memory: Uuid,
        goal: AtomId,
        cycles: u32,
    },
    EvaluatorFault {
        memory: Uuid,
        reason: String,
    },
    GroundingFailed {
        memory: Uuid,
        source_name: String,
        reason: String,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::SentenceAdded { .. } => "sentence-added",
            Event::BeliefRevised { .. } => "belief-revised",
            Event::ContradictionDetected { .. } => "contradiction-detected",
            Event::CycleComplete { .. } => "cycle-complete",
            Event::ConceptForgotten { .. } => "concept-forgotten",
            Event::DeliberationStarted { .. } => "deliberation-started",
            Event::DeliberationResolved { .. } => "deliberation-resolved",
            Event::DeliberationAbandoned { .. } => "deliberation-abandoned",
            Event::EvaluatorFault { .. } => "evaluator-fault",
            Event::GroundingFailed { .. } => "grounding-failed",
        }
    }
}

pub trait Observer: Send {
    fn on_event(&self, event: &Event) -> Result<(), String>;
}

/// Observer that records every event; cheap to clone and inspect.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Observer for EventLog {
    fn on_event(&self, event: &Event) -> Result<(), String> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
