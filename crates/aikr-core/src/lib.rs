//! Non-axiomatic reasoning core under insufficient knowledge and resources.
//!
//! Knowledge lives in concepts indexed by term; every concept holds
//! capacity-bounded bags of tasks and beliefs, and the bag of concepts is
//! itself bounded. Reasoning is a sequence of reflexive cycles that sample
//! by priority, hand premise pairs to a pluggable rule evaluator and feed
//! conclusions back in. Deliberation runs bounded cycles in an isolated
//! workspace; sharding partitions concepts across parallel memories.
//!
//! Zero I/O: persistence and transport live in other crates.

pub mod atom;
pub mod bag;
pub mod budget;
pub mod concept;
pub mod config;
pub mod constants;
pub mod cycle;
pub mod deliberation;
pub mod error;
pub mod event;
pub mod grounding;
pub mod memory;
pub mod parse;
pub mod rules;
pub mod sentence;
pub mod shard;
pub mod snapshot;
pub mod stamp;
pub mod strategy;
pub mod truth;

pub use atom::{Atom, AtomId, AtomStore, COPULAS, INHERITANCE, Term, VarKind};
pub use bag::{Bag, BagItem};
pub use budget::Budget;
pub use concept::{BeliefUpdate, Concept, RevisionFn, TouchReport};
pub use config::MemoryConfig;
pub use cycle::{AbortReason, CycleOutcome, CyclePhase, CycleSummary, ReflexiveCycle};
pub use deliberation::{Deliberation, DeliberationOutcome, RelevanceQuery, TermOverlap};
pub use error::{
    ConfigError, EvidenceOverlap, GroundingFailure, ParseError, RuleEvaluatorFault,
    ValidationError,
};
pub use event::{Event, EventLog, Observer};
pub use grounding::{GroundedResult, GroundingHandle};
pub use memory::{Context, Memory, MemoryStats, Metrics};
pub use parse::{Statement, parse_lines, parse_statement, parse_term};
pub use rules::{Evaluation, InferenceExpression, Rule, RuleEvaluator, RuleRegistry, Syllogism};
pub use sentence::{Punctuation, RawSentence, Sentence, SentenceKey};
pub use shard::{
    FaultKind, Partition, RestartAction, RestartPolicy, RestartRule, ShardHealth, ShardStep,
    ShardedReasoner, Supervisor,
};
pub use snapshot::{
    CURRENT_VERSION, ConceptState, SentenceRecord, Snapshot, export_json, import_json,
};
pub use stamp::Stamp;
pub use strategy::{BudgetingStrategy, DefaultBudgeting, HousekeepingReport};
pub use truth::TruthValue;
