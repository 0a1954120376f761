//! Attentional value carried by every sentence and concept.
//!
//! All arithmetic here is pure: the same inputs always give the same budget,
//! and every output component lies in `[0, 1]`.

use serde::{Deserialize, Serialize};

use crate::constants::RETENTION_FACTOR;
use crate::error::ValidationError;
use crate::truth::check_unit;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Sampling weight.
    pub priority: f64,
    /// Resistance to decay.
    pub durability: f64,
    /// Recent usefulness of what this item contributed to.
    pub quality: f64,
}

fn unit(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

impl Budget {
    /// Validating constructor for budgets supplied at ingestion.
    pub fn new(priority: f64, durability: f64, quality: f64) -> Result<Self, ValidationError> {
        check_unit("priority", priority)?;
        check_unit("durability", durability)?;
        check_unit("quality", quality)?;
        Ok(Self {
            priority,
            durability,
            quality,
        })
    }

    /// Clamping constructor for budgets computed by the core.
    pub fn clamped(priority: f64, durability: f64, quality: f64) -> Self {
        Self {
            priority: unit(priority),
            durability: unit(durability),
            quality: unit(quality),
        }
    }

    /// Budget of a conclusion drawn from two parents.
    ///
    /// `priority = sqrt(p1·p2)`, `durability = mean(d)·RETENTION_FACTOR`,
    /// `quality` = conclusion confidence, or the retained mean parent quality
    /// when the conclusion carries no truth.
    pub fn derive(a: &Budget, b: &Budget, confidence: Option<f64>) -> Budget {
        let priority = (a.priority * b.priority).sqrt();
        let durability = (a.durability + b.durability) / 2.0 * RETENTION_FACTOR;
        let quality = match confidence {
            Some(c) => c,
            None => (a.quality + b.quality) / 2.0 * RETENTION_FACTOR,
        };
        Budget::clamped(priority, durability, quality)
    }

    /// Generalisation of [`Budget::derive`] to any number of parents.
    pub fn derive_all(parents: &[Budget], confidence: Option<f64>) -> Budget {
        match parents {
            [] => Budget::clamped(0.0, 0.0, confidence.unwrap_or(0.0)),
            [only] => Budget::clamped(
                only.priority,
                only.durability * RETENTION_FACTOR,
                confidence.unwrap_or(only.quality * RETENTION_FACTOR),
            ),
            [a, b] => Budget::derive(a, b, confidence),
            many => {
                let n = many.len() as f64;
                let priority = many
                    .iter()
                    .map(|b| b.priority)
                    .product::<f64>()
                    .powf(1.0 / n);
                let durability =
                    many.iter().map(|b| b.durability).sum::<f64>() / n * RETENTION_FACTOR;
                let quality = confidence.unwrap_or_else(|| {
                    many.iter().map(|b| b.quality).sum::<f64>() / n * RETENTION_FACTOR
                });
                Budget::clamped(priority, durability, quality)
            }
        }
    }

    /// Priority decay over `dt` ticks: `p·(1 − rate·(1 − d))^dt`.
    /// With zero durability this is plain `(1 − rate)^dt`.
    pub fn decay(&self, dt: u32, rate: f64) -> Budget {
        let effective = unit(rate) * (1.0 - self.durability);
        let factor = (1.0 - effective).powf(f64::from(dt));
        Budget::clamped(self.priority * factor, self.durability, self.quality)
    }

    /// Move priority toward 1 in proportion to quality.
    pub fn reinforce(&self, amount: f64) -> Budget {
        let gain = (1.0 - self.priority) * unit(amount) * self.quality;
        Budget::clamped(self.priority + gain, self.durability, self.quality)
    }

    /// Raise priority to at least `floor`.
    pub fn elevate(&self, floor: f64) -> Budget {
        Budget::clamped(self.priority.max(floor), self.durability, self.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn in_unit(b: &Budget) -> bool {
        [b.priority, b.durability, b.quality]
            .iter()
            .all(|x| (0.0..=1.0).contains(x))
    }

    #[test]
    fn test_new_validates() {
        assert!(Budget::new(0.5, 0.5, 0.5).is_ok());
        assert!(matches!(
            Budget::new(0.5, -0.1, 0.5),
            Err(ValidationError::OutOfRange { field: "durability", .. })
        ));
        assert!(matches!(
            Budget::new(f64::INFINITY, 0.5, 0.5),
            Err(ValidationError::NotFinite { field: "priority", .. })
        ));
    }

    #[test]
    fn test_derive_formula() {
        let a = Budget::clamped(0.81, 0.8, 0.5);
        let b = Budget::clamped(0.25, 0.6, 0.7);
        let d = Budget::derive(&a, &b, Some(0.3));
        assert_relative_eq!(d.priority, 0.45, epsilon = 1e-12);
        assert_relative_eq!(d.durability, 0.7 * RETENTION_FACTOR, epsilon = 1e-12);
        assert_relative_eq!(d.quality, 0.3);

        let no_truth = Budget::derive(&a, &b, None);
        assert_relative_eq!(no_truth.quality, 0.6 * RETENTION_FACTOR, epsilon = 1e-12);
    }

    #[test]
    fn test_derive_all_matches_pairwise() {
        let a = Budget::clamped(0.9, 0.5, 0.5);
        let b = Budget::clamped(0.4, 0.3, 0.2);
        assert_eq!(Budget::derive_all(&[a, b], Some(0.5)), Budget::derive(&a, &b, Some(0.5)));
        let three = Budget::derive_all(&[a, b, a], None);
        assert!(in_unit(&three));
    }

    #[test]
    fn test_decay_without_durability() {
        let b = Budget::clamped(0.8, 0.0, 0.5);
        let d = b.decay(3, 0.1);
        assert_relative_eq!(d.priority, 0.8 * 0.9f64.powi(3), epsilon = 1e-12);
    }

    #[test]
    fn test_durability_resists_decay() {
        let fragile = Budget::clamped(0.8, 0.0, 0.5).decay(5, 0.1);
        let durable = Budget::clamped(0.8, 0.9, 0.5).decay(5, 0.1);
        assert!(durable.priority > fragile.priority);
        let eternal = Budget::clamped(0.8, 1.0, 0.5).decay(5, 0.1);
        assert_relative_eq!(eternal.priority, 0.8);
    }

    #[test]
    fn test_decay_is_pure() {
        let b = Budget::clamped(0.7, 0.3, 0.2);
        assert_eq!(b.decay(4, 0.05), b.decay(4, 0.05));
        assert_eq!(b.decay(0, 0.05), b);
    }

    #[test]
    fn test_decay_over_huge_interval_never_raises() {
        let b = Budget::clamped(0.5, 0.0, 0.5);
        let decayed = b.decay(u32::MAX, 0.05);
        assert!(decayed.priority <= b.priority);
        assert_relative_eq!(decayed.priority, 0.0);
        assert_relative_eq!(b.decay(u32::MAX, 0.0).priority, 0.5);
    }

    #[test]
    fn test_reinforce_and_elevate() {
        let b = Budget::clamped(0.5, 0.5, 1.0);
        assert_relative_eq!(b.reinforce(0.2).priority, 0.6);
        assert_relative_eq!(b.elevate(0.9).priority, 0.9);
        assert_relative_eq!(b.elevate(0.1).priority, 0.5);
    }

    proptest! {
        #[test]
        fn prop_derive_and_decay_stay_in_unit(
            p1 in 0.0f64..=1.0, d1 in 0.0f64..=1.0, q1 in 0.0f64..=1.0,
            p2 in 0.0f64..=1.0, d2 in 0.0f64..=1.0, q2 in 0.0f64..=1.0,
            c in proptest::option::of(0.0f64..=1.0),
            dt in prop_oneof![0u32..100, (i32::MAX as u32)..=u32::MAX],
            rate in 0.0f64..=1.0,
        ) {
            let a = Budget::clamped(p1, d1, q1);
            let b = Budget::clamped(p2, d2, q2);
            let derived = Budget::derive(&a, &b, c);
            prop_assert!(in_unit(&derived));
            let decayed = a.decay(dt, rate);
            prop_assert!(in_unit(&decayed));
            prop_assert!(decayed.priority <= a.priority);
            prop_assert!(in_unit(&derived.reinforce(rate)));
        }
    }
}
