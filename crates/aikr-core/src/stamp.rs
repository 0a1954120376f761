//! Derivation history. Two sentences may only be combined when their
//! evidence sets are disjoint, which keeps the system from re-deriving a
//! conclusion from its own premises.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::EvidenceOverlap;

/// Process-wide stamp id counter. Ids are unique across every memory,
/// workspace and shard without sharing any knowledge state.
static NEXT_STAMP_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_stamp_id() -> u64 {
    NEXT_STAMP_ID.fetch_add(1, Ordering::Relaxed)
}

/// Make sure future ids are greater than `id` (used after restoring a snapshot).
pub fn advance_past(id: u64) {
    NEXT_STAMP_ID.fetch_max(id.saturating_add(1), Ordering::Relaxed);
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub id: u64,
    /// Evidence ids, ascending. Ids grow monotonically, so the front holds
    /// the oldest evidence.
    pub evidence: Vec<u64>,
    /// Memory tick at which the stamp was made.
    pub created_at: u64,
}

impl Stamp {
    /// Stamp for new input: its only evidence is itself.
    pub fn fresh(now: u64) -> Self {
        let id = next_stamp_id();
        Self {
            id,
            evidence: vec![id],
            created_at: now,
        }
    }

    /// First evidence id shared with `other`, if any.
    pub fn overlap(&self, other: &Stamp) -> Option<u64> {
        // Both sides are sorted: walk them together.
        let (mut i, mut j) = (0, 0);
        while i < self.evidence.len() && j < other.evidence.len() {
            match self.evidence[i].cmp(&other.evidence[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => return Some(self.evidence[i]),
            }
        }
        None
    }

    pub fn same_evidence(&self, other: &Stamp) -> bool {
        self.evidence == other.evidence
    }

    /// Combine parent stamps into a fresh one.
    ///
    /// Fails when any two parents share evidence. The union is truncated to
    /// `cap` ids by dropping the oldest.
    pub fn merge(parents: &[&Stamp], cap: usize, now: u64) -> Result<Stamp, EvidenceOverlap> {
        let mut union = BTreeSet::new();
        for parent in parents {
            for id in &parent.evidence {
                if !union.insert(*id) {
                    return Err(EvidenceOverlap { shared: *id });
                }
            }
        }
        let skip = union.len().saturating_sub(cap);
        Ok(Stamp {
            id: next_stamp_id(),
            evidence: union.into_iter().skip(skip).collect(),
            created_at: now,
        })
    }

    /// Normalise evidence read from outside (sort, dedup, cap).
    pub fn normalized(mut self, cap: usize) -> Stamp {
        self.evidence.sort_unstable();
        self.evidence.dedup();
        let skip = self.evidence.len().saturating_sub(cap);
        self.evidence.drain(..skip);
        self
    }

    pub fn max_id(&self) -> u64 {
        self.evidence.iter().copied().max().unwrap_or(0).max(self.id)
    }
}
