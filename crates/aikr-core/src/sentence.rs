use std::fmt;

use serde::{Deserialize, Serialize};

use crate::atom::AtomId;
use crate::bag::BagItem;
use crate::budget::Budget;
use crate::error::ValidationError;
use crate::stamp::Stamp;
use crate::truth::TruthValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Punctuation {
    Belief,
    Goal,
    Question,
    Quest,
}

impl Punctuation {
    pub fn symbol(&self) -> char {
        match self {
            Self::Belief => '.',
            Self::Goal => '!',
            Self::Question => '?',
            Self::Quest => '@',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '.' => Some(Self::Belief),
            '!' => Some(Self::Goal),
            '?' => Some(Self::Question),
            '@' => Some(Self::Quest),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Belief => "belief",
            Self::Goal => "goal",
            Self::Question => "question",
            Self::Quest => "quest",
        }
    }

    /// Belief needs a truth value, Question must not carry one; Goal and
    /// Quest may go either way.
    pub fn check_truth(&self, truth: Option<&TruthValue>) -> Result<(), ValidationError> {
        match (self, truth) {
            (Self::Belief, None) => Err(ValidationError::MissingTruth),
            (Self::Question, Some(_)) => Err(ValidationError::UnexpectedTruth),
            _ => Ok(()),
        }
    }
}

/// Content a rule evaluator or grounded computation produces. The core
/// attaches budget and stamp before dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct RawSentence {
    pub atom: AtomId,
    pub punctuation: Punctuation,
    pub truth: Option<TruthValue>,
}

impl RawSentence {
    pub fn belief(atom: AtomId, truth: TruthValue) -> Self {
        Self {
            atom,
            punctuation: Punctuation::Belief,
            truth: Some(truth),
        }
    }
}

/// Unit of knowledge and of schedulable work.
#[derive(Clone, Debug, PartialEq)]
pub struct Sentence {
    pub atom: AtomId,
    pub punctuation: Punctuation,
    pub truth: Option<TruthValue>,
    pub budget: Budget,
    pub stamp: Stamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SentenceKey {
    pub atom: AtomId,
    pub punctuation: Punctuation,
    pub stamp_id: u64,
}

impl Sentence {
    pub fn from_raw(raw: RawSentence, budget: Budget, stamp: Stamp) -> Self {
        Self {
            atom: raw.atom,
            punctuation: raw.punctuation,
            truth: raw.truth,
            budget,
            stamp,
        }
    }

    pub fn is_belief(&self) -> bool {
        self.punctuation == Punctuation::Belief
    }

    pub fn confidence(&self) -> Option<f64> {
        self.truth.map(|t| t.confidence)
    }
}

impl BagItem for Sentence {
    type Key = SentenceKey;

    fn key(&self) -> SentenceKey {
        SentenceKey {
            atom: self.atom,
            punctuation: self.punctuation,
            stamp_id: self.stamp.id,
        }
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.atom, self.punctuation.symbol())?;
        if let Some(truth) = &self.truth {
            write!(f, " {truth}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_punctuation_symbols() {
        for p in [
            Punctuation::Belief,
            Punctuation::Goal,
            Punctuation::Question,
            Punctuation::Quest,
        ] {
            assert_eq!(Punctuation::from_symbol(p.symbol()), Some(p));
        }
        assert_eq!(Punctuation::from_symbol(';'), None);
    }

    #[test]
    fn test_check_truth() {
        let tv = TruthValue::new(1.0, 0.9);
        assert_eq!(
            Punctuation::Belief.check_truth(None),
            Err(ValidationError::MissingTruth)
        );
        assert_eq!(
            Punctuation::Question.check_truth(Some(&tv)),
            Err(ValidationError::UnexpectedTruth)
        );
        assert!(Punctuation::Goal.check_truth(None).is_ok());
        assert!(Punctuation::Goal.check_truth(Some(&tv)).is_ok());
        assert!(Punctuation::Quest.check_truth(None).is_ok());
    }
}
