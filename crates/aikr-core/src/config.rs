use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;

/// Plain configuration values consumed by a [`crate::Memory`].
///
/// Every field has a default, so a partial TOML file is enough.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Capacity of each concept's task and belief bags.
    pub bag_capacity: usize,
    /// Capacity of the bag of concepts.
    pub concept_capacity: usize,
    pub sharpness: f64,
    pub evidence_cap: usize,
    pub decay_rate: f64,
    pub deliberation_budget: u32,
    pub concept_idle_prune_ticks: u32,
    pub activation_epsilon: f64,
    pub forget_threshold: f64,
    pub seed: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            bag_capacity: DEFAULT_BAG_CAPACITY,
            concept_capacity: DEFAULT_CONCEPT_CAPACITY,
            sharpness: DEFAULT_SHARPNESS,
            evidence_cap: DEFAULT_EVIDENCE_CAP,
            decay_rate: DEFAULT_DECAY_RATE,
            deliberation_budget: DEFAULT_DELIBERATION_BUDGET,
            concept_idle_prune_ticks: DEFAULT_CONCEPT_IDLE_PRUNE_TICKS,
            activation_epsilon: DEFAULT_ACTIVATION_EPSILON,
            forget_threshold: DEFAULT_FORGET_THRESHOLD,
            seed: DEFAULT_SEED,
        }
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value < max {
        Ok(())
    } else {
        Err(ConfigError::Range {
            field,
            value,
            min,
            max,
        })
    }
}

impl MemoryConfig {
    /// Reject values that break a structural invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bag_capacity == 0 {
            return Err(ConfigError::Zero("bag_capacity"));
        }
        if self.concept_capacity == 0 {
            return Err(ConfigError::Zero("concept_capacity"));
        }
        if self.evidence_cap == 0 {
            return Err(ConfigError::Zero("evidence_cap"));
        }
        if self.deliberation_budget == 0 {
            return Err(ConfigError::Zero("deliberation_budget"));
        }
        // Infinite sharpness is allowed: it means max-priority selection.
        if self.sharpness.is_nan() || self.sharpness < 0.0 {
            return Err(ConfigError::Sharpness(self.sharpness));
        }
        check_range("decay_rate", self.decay_rate, 0.0, 1.0)?;
        check_range("activation_epsilon", self.activation_epsilon, 0.0, 1.0)?;
        check_range("forget_threshold", self.forget_threshold, 0.0, 1.0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(MemoryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = MemoryConfig {
            bag_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Zero("bag_capacity")));
    }

    #[test]
    fn test_bad_values_rejected() {
        let negative = MemoryConfig {
            sharpness: -1.0,
            ..Default::default()
        };
        assert!(matches!(negative.validate(), Err(ConfigError::Sharpness(_))));

        let decay = MemoryConfig {
            decay_rate: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            decay.validate(),
            Err(ConfigError::Range { field: "decay_rate", .. })
        ));

        let infinite = MemoryConfig {
            sharpness: f64::INFINITY,
            ..Default::default()
        };
        assert!(infinite.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: MemoryConfig = serde_json::from_str(r#"{"bag_capacity": 7}"#).unwrap();
        assert_eq!(config.bag_capacity, 7);
        assert_eq!(config.evidence_cap, DEFAULT_EVIDENCE_CAP);
    }
}
