//! Persistable image of a memory and its JSON wire format.
//!
//! Atom handles are process-local, so a snapshot carries owned [`Term`]
//! trees; restoring re-interns them. The wire format uses camelCase field
//! names and a version tag.

use serde::{Deserialize, Serialize};

use crate::atom::Term;
use crate::budget::Budget;
use crate::sentence::Punctuation;
use crate::stamp::Stamp;
use crate::truth::TruthValue;

pub const CURRENT_VERSION: &str = "1";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub tick: u64,
    pub concepts: Vec<(Term, ConceptState)>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConceptState {
    /// Priority in the memory's bag of concepts.
    pub priority: f64,
    pub activation: f64,
    pub idle_ticks: u32,
    /// Oldest first.
    pub tasks: Vec<SentenceRecord>,
    pub beliefs: Vec<SentenceRecord>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SentenceRecord {
    pub term: Term,
    pub punctuation: Punctuation,
    pub truth: Option<TruthValue>,
    pub budget: Budget,
    pub stamp: Stamp,
    /// Bag priority at snapshot time.
    pub priority: f64,
}

impl Snapshot {
    pub fn sentence_count(&self) -> usize {
        self.concepts
            .iter()
            .map(|(_, c)| c.tasks.len() + c.beliefs.len())
            .sum()
    }

    /// Highest stamp or evidence id referenced anywhere.
    pub fn max_stamp_id(&self) -> u64 {
        self.concepts
            .iter()
            .flat_map(|(_, c)| c.tasks.iter().chain(&c.beliefs))
            .map(|r| r.stamp.max_id())
            .max()
            .unwrap_or(0)
    }
}

// --- Wire format types ---

#[derive(Serialize, Deserialize, Debug)]
pub struct WireSnapshot {
    pub version: String,
    #[serde(default)]
    pub tick: u64,
    pub concepts: Vec<WireConcept>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WireConcept {
    pub term: Term,
    #[serde(default)]
    pub priority: f64,
    #[serde(default)]
    pub activation: f64,
    #[serde(default)]
    pub idle_ticks: u32,
    #[serde(default)]
    pub tasks: Vec<WireSentence>,
    #[serde(default)]
    pub beliefs: Vec<WireSentence>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WireSentence {
    pub term: Term,
    pub punctuation: Punctuation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truth: Option<TruthValue>,
    pub budget: Budget,
    pub stamp: Stamp,
    #[serde(default)]
    pub priority: f64,
}

impl WireSnapshot {
    pub fn into_snapshot(self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            concepts: self
                .concepts
                .into_iter()
                .map(|c| {
                    (
                        c.term,
                        ConceptState {
                            priority: c.priority,
                            activation: c.activation,
                            idle_ticks: c.idle_ticks,
                            tasks: c.tasks.into_iter().map(wire_to_record).collect(),
                            beliefs: c.beliefs.into_iter().map(wire_to_record).collect(),
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        WireSnapshot {
            version: CURRENT_VERSION.to_string(),
            tick: snapshot.tick,
            concepts: snapshot
                .concepts
                .iter()
                .map(|(term, state)| WireConcept {
                    term: term.clone(),
                    priority: state.priority,
                    activation: state.activation,
                    idle_ticks: state.idle_ticks,
                    tasks: state.tasks.iter().map(record_to_wire).collect(),
                    beliefs: state.beliefs.iter().map(record_to_wire).collect(),
                })
                .collect(),
        }
    }
}

fn wire_to_record(wire: WireSentence) -> SentenceRecord {
    SentenceRecord {
        term: wire.term,
        punctuation: wire.punctuation,
        truth: wire.truth,
        budget: wire.budget,
        stamp: wire.stamp,
        priority: wire.priority,
    }
}

fn record_to_wire(record: &SentenceRecord) -> WireSentence {
    WireSentence {
        term: record.term.clone(),
        punctuation: record.punctuation,
        truth: record.truth,
        budget: record.budget,
        stamp: record.stamp.clone(),
        priority: record.priority,
    }
}

/// Deserialize a JSON export into a snapshot.
pub fn import_json(json: &str) -> Result<Snapshot, serde_json::Error> {
    let wire: WireSnapshot = serde_json::from_str(json)?;
    Ok(wire.into_snapshot())
}

/// Serialize a snapshot to the JSON wire format.
pub fn export_json(snapshot: &Snapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&WireSnapshot::from_snapshot(snapshot))
}
