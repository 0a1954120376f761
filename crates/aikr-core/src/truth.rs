//! NAL truth values: frequency and confidence, with the revision and
//! first-order syllogistic functions.
//!
//! Confidence and evidence weight are related by the evidential horizon `k`:
//! `w = k·c / (1 − c)` and `c = w / (w + k)`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{EVIDENTIAL_HORIZON, MAX_CONFIDENCE};
use crate::error::ValidationError;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TruthValue {
    pub frequency: f64,
    pub confidence: f64,
}

/// Confidence → evidence weight.
fn c2w(c: f64) -> f64 {
    EVIDENTIAL_HORIZON * c / (1.0 - c)
}

/// Evidence weight → confidence.
fn w2c(w: f64) -> f64 {
    w / (w + EVIDENTIAL_HORIZON)
}

impl TruthValue {
    /// Clamping constructor for values the core computes itself.
    pub fn new(frequency: f64, confidence: f64) -> Self {
        Self {
            frequency: frequency.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, MAX_CONFIDENCE),
        }
    }

    /// Validating constructor for values arriving from outside.
    pub fn try_new(frequency: f64, confidence: f64) -> Result<Self, ValidationError> {
        check_unit("frequency", frequency)?;
        check_unit("confidence", confidence)?;
        Ok(Self::new(frequency, confidence))
    }

    pub fn weight(&self) -> f64 {
        c2w(self.confidence)
    }

    /// `e = c·(f − 0.5) + 0.5`
    pub fn expectation(&self) -> f64 {
        self.confidence * (self.frequency - 0.5) + 0.5
    }

    /// Pool two independent bodies of evidence about the same statement.
    pub fn revision(&self, other: &TruthValue) -> TruthValue {
        let w1 = self.weight();
        let w2 = other.weight();
        let w = w1 + w2;
        if w <= 0.0 {
            return TruthValue::new((self.frequency + other.frequency) / 2.0, 0.0);
        }
        let f = (w1 * self.frequency + w2 * other.frequency) / w;
        TruthValue::new(f, w2c(w))
    }

    /// `S→M, M→P ⊢ S→P`: `f = f1·f2`, `c = f1·f2·c1·c2`.
    pub fn deduction(&self, other: &TruthValue) -> TruthValue {
        let f = self.frequency * other.frequency;
        let c = f * self.confidence * other.confidence;
        TruthValue::new(f, c)
    }

    /// `M→P, M→S ⊢ S→P`: `f = f1`, `w = f2·c1·c2`.
    pub fn induction(&self, other: &TruthValue) -> TruthValue {
        let w = other.frequency * self.confidence * other.confidence;
        TruthValue::new(self.frequency, w2c(w))
    }

    /// `P→M, S→M ⊢ S→P`: `f = f2`, `w = f1·c1·c2`.
    pub fn abduction(&self, other: &TruthValue) -> TruthValue {
        let w = self.frequency * self.confidence * other.confidence;
        TruthValue::new(other.frequency, w2c(w))
    }
}

pub(crate) fn check_unit(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field, value });
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::OutOfRange { field, value });
    }
    Ok(())
}

impl fmt::Display for TruthValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{:.2};{:.2}%", self.frequency, self.confidence)
    }
}
