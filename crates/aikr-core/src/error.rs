//! Error taxonomy of the core.
//!
//! Only [`ValidationError`] and [`ConfigError`] ever reach a caller as `Err`.
//! [`EvidenceOverlap`] is expected and skips one candidate pair. Evaluator
//! faults and grounding failures are turned into beliefs by the memory and
//! never leave a cycle.

use thiserror::Error;

/// Malformed input rejected at the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },
    #[error("a belief requires a truth value")]
    MissingTruth,
    #[error("a question carries no truth value")]
    UnexpectedTruth,
    #[error("unknown atom handle {0}")]
    UnknownAtom(u32),
    #[error("workspace memories accept no external input")]
    InputClosed,
}

/// Two stamps share at least one evidence id; the pair must be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("evidence overlap on id {shared}")]
pub struct EvidenceOverlap {
    pub shared: u64,
}

/// Configuration that violates a structural invariant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("sharpness must be a non-negative number, got {0}")]
    Sharpness(f64),
    #[error("{field} must be within [{min}, {max}), got {value}")]
    Range {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Term or statement text that does not parse.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("empty input")]
    Empty,
    #[error("unexpected token '{token}' at position {position}")]
    Unexpected { token: String, position: usize },
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("missing punctuation (one of . ! ? @)")]
    MissingPunctuation,
    #[error("terms nested deeper than {0} levels")]
    TooDeep(usize),
    #[error("malformed truth value '{0}'")]
    Truth(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// A rule evaluator panicked or reported an internal fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rule evaluator fault: {0}")]
pub struct RuleEvaluatorFault(pub String);

/// A grounded (external) computation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("grounding via '{source_name}' failed: {reason}")]
pub struct GroundingFailure {
    pub source_name: String,
    pub reason: String,
}
