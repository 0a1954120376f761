/// Evidential horizon `k` for weight/confidence conversion.
pub const EVIDENTIAL_HORIZON: f64 = 1.0;

/// Confidence never reaches 1.0: there is always room for more evidence.
pub const MAX_CONFIDENCE: f64 = 0.9999;

/// Fraction of the parents' durability a derived item keeps.
pub const RETENTION_FACTOR: f64 = 0.9;

/// Priority floor given to a deliberation solution re-dispatched into the host.
pub const SOLUTION_PRIORITY: f64 = 0.9;

/// Truth attached to the belief recording a failed grounded computation.
pub const GROUNDING_FAILURE_FREQUENCY: f64 = 1.0;
pub const GROUNDING_FAILURE_CONFIDENCE: f64 = 0.2;

/// Truth attached to the belief recording a rule evaluator fault.
pub const EVALUATOR_FAULT_CONFIDENCE: f64 = 0.1;

/// Reinforcement applied to a selected item, scaled by its quality.
pub const ACCESS_REINFORCEMENT: f64 = 0.1;

/// How much of its previous activation a concept keeps when touched.
pub const ACTIVATION_RETENTION: f64 = 0.9;

/// Frequency gap between a belief and incoming evidence that counts as
/// a contradiction.
pub const CONTRADICTION_GAP: f64 = 0.5;

// Configuration defaults.
pub const DEFAULT_BAG_CAPACITY: usize = 100;
pub const DEFAULT_CONCEPT_CAPACITY: usize = 1000;
pub const DEFAULT_SHARPNESS: f64 = 1.0;
pub const DEFAULT_EVIDENCE_CAP: usize = 20;
pub const DEFAULT_DECAY_RATE: f64 = 0.05;
pub const DEFAULT_DELIBERATION_BUDGET: u32 = 100;
pub const DEFAULT_CONCEPT_IDLE_PRUNE_TICKS: u32 = 50;
pub const DEFAULT_ACTIVATION_EPSILON: f64 = 0.01;
pub const DEFAULT_FORGET_THRESHOLD: f64 = 0.005;
pub const DEFAULT_SEED: u64 = 42;
